//! Script-based image generator
//!
//! Inference runs in an external script that loads the base diffusion
//! pipeline plus the trained LoRA weights and writes a PNG to the
//! requested output path.

use async_trait::async_trait;
use pixgen_core::{InferenceConfig, PixgenError, PixgenResult, ScriptConfig, BASE_MODEL};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::trainer::tail;
use crate::traits::{GenerateSpec, Generator};

/// Generator that shells out to the inference script
pub struct ScriptGenerator {
    scripts: ScriptConfig,
    config: InferenceConfig,
}

impl ScriptGenerator {
    /// Create a new script generator
    pub fn new(scripts: ScriptConfig, config: InferenceConfig) -> Self {
        Self { scripts, config }
    }

    /// Build the interpreter argument list for a generation run
    fn build_args(&self, spec: &GenerateSpec) -> Vec<String> {
        let c = &self.config;
        vec![
            self.scripts.generate_script.display().to_string(),
            "--base-model".to_string(),
            BASE_MODEL.to_string(),
            "--lora-weights".to_string(),
            spec.lora_weights.display().to_string(),
            "--prompt".to_string(),
            spec.prompt.clone(),
            "--num-inference-steps".to_string(),
            c.num_inference_steps.to_string(),
            "--guidance-scale".to_string(),
            c.guidance_scale.to_string(),
            "--width".to_string(),
            c.width.to_string(),
            "--height".to_string(),
            c.height.to_string(),
            "--seed".to_string(),
            c.seed.to_string(),
            "--output".to_string(),
            spec.output_path.display().to_string(),
        ]
    }

    fn build_command(&self, spec: &GenerateSpec) -> Command {
        let mut cmd = Command::new(&self.scripts.python_path);
        cmd.args(self.build_args(spec));
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Generator for ScriptGenerator {
    async fn generate(&self, spec: &GenerateSpec) -> PixgenResult<Vec<u8>> {
        info!(
            lora_weights = %spec.lora_weights.display(),
            steps = self.config.num_inference_steps,
            "Starting image generation"
        );
        debug!(prompt = %spec.prompt, "Generation prompt");

        let mut cmd = self.build_command(spec);

        let timeout = Duration::from_secs(self.scripts.generate_timeout_secs);
        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(result) => result.map_err(|e| {
                PixgenError::Inference(format!("Failed to launch inference script: {}", e))
            })?,
            Err(_) => {
                return Err(PixgenError::Inference(format!(
                    "Inference timed out after {}s",
                    self.scripts.generate_timeout_secs
                )))
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(stderr = %tail(&stderr, 2000), "Inference script failed");
            return Err(PixgenError::Inference(format!(
                "Inference script failed with exit code {}: {}",
                output.status.code().unwrap_or(-1),
                tail(&stderr, 500)
            )));
        }

        let png = tokio::fs::read(&spec.output_path).await.map_err(|e| {
            PixgenError::Inference(format!(
                "Inference script produced no output at {}: {}",
                spec.output_path.display(),
                e
            ))
        })?;

        info!(size_bytes = png.len(), "Image generated");
        Ok(png)
    }

    fn name(&self) -> &'static str {
        "script"
    }
}
