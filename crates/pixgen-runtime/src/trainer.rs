//! Script-based trainer
//!
//! Fine-tuning is delegated to the DreamBooth LoRA script from the
//! pinned diffusers checkout, launched through `accelerate`. This
//! module only builds the command line, enforces the timeout, and
//! interprets the exit status.

use async_trait::async_trait;
use pixgen_core::{PixgenError, PixgenResult, ScriptConfig, TrainConfig, BASE_MODEL};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::traits::{TrainSpec, Trainer};

/// Trainer that shells out to the diffusers DreamBooth LoRA script
pub struct ScriptTrainer {
    scripts: ScriptConfig,
    config: TrainConfig,
}

impl ScriptTrainer {
    /// Create a new script trainer
    pub fn new(scripts: ScriptConfig, config: TrainConfig) -> Self {
        Self { scripts, config }
    }

    /// Build the `accelerate launch` argument list for a training run
    fn build_args(&self, spec: &TrainSpec) -> Vec<String> {
        let c = &self.config;
        let mut args = vec![
            "launch".to_string(),
            "--mixed_precision".to_string(),
            c.mixed_precision.clone(),
            self.scripts.train_script.display().to_string(),
            "--pretrained_model_name_or_path".to_string(),
            BASE_MODEL.to_string(),
            "--instance_data_dir".to_string(),
            spec.instance_data_dir.display().to_string(),
            "--output_dir".to_string(),
            spec.output_dir.display().to_string(),
            "--instance_prompt".to_string(),
            instance_prompt(&spec.trigger_word),
            "--resolution".to_string(),
            c.resolution.to_string(),
            "--train_batch_size".to_string(),
            c.train_batch_size.to_string(),
            "--gradient_accumulation_steps".to_string(),
            c.gradient_accumulation_steps.to_string(),
            "--learning_rate".to_string(),
            c.learning_rate.to_string(),
            "--lr_scheduler".to_string(),
            c.lr_scheduler.clone(),
            "--max_train_steps".to_string(),
            c.max_train_steps.to_string(),
            "--seed".to_string(),
            c.seed.to_string(),
            "--rank".to_string(),
            c.lora_rank.to_string(),
        ];

        if c.gradient_checkpointing {
            args.push("--gradient_checkpointing".to_string());
        }

        args
    }

    /// Build the command to launch a training run
    fn build_command(&self, spec: &TrainSpec) -> Command {
        let mut cmd = Command::new(&self.scripts.accelerate_path);
        cmd.args(self.build_args(spec));

        if !self.config.gpu_ids.is_empty() {
            let gpu_ids: String = self
                .config
                .gpu_ids
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(",");
            cmd.env("CUDA_VISIBLE_DEVICES", &gpu_ids);
        }

        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        cmd
    }
}

#[async_trait]
impl Trainer for ScriptTrainer {
    async fn train(&self, spec: &TrainSpec) -> PixgenResult<()> {
        info!(
            trigger_word = %spec.trigger_word,
            output_dir = %spec.output_dir.display(),
            steps = self.config.max_train_steps,
            "Starting LoRA fine-tuning"
        );

        let mut cmd = self.build_command(spec);
        debug!(command = ?cmd.as_std(), "Launching training script");

        let timeout = Duration::from_secs(self.scripts.train_timeout_secs);
        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(result) => result.map_err(|e| {
                PixgenError::Training(format!("Failed to launch training script: {}", e))
            })?,
            Err(_) => {
                return Err(PixgenError::Training(format!(
                    "Training timed out after {}s",
                    self.scripts.train_timeout_secs
                )))
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(stderr = %tail(&stderr, 2000), "Training script failed");
            return Err(PixgenError::Training(format!(
                "Training script failed with exit code {}: {}",
                output.status.code().unwrap_or(-1),
                tail(&stderr, 500)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!(stdout = %tail(&stdout, 1000), "Training script output");
        info!("Training completed");

        Ok(())
    }

    fn name(&self) -> &'static str {
        "script"
    }
}

/// Instance prompt the adapter is conditioned on during training
pub fn instance_prompt(trigger_word: &str) -> String {
    format!("a photo of {} person", trigger_word)
}

/// Last `max` characters of a string, respecting char boundaries
pub(crate) fn tail(s: &str, max: usize) -> &str {
    if s.chars().count() <= max {
        return s;
    }
    let skip = s.chars().count() - max;
    let (idx, _) = s.char_indices().nth(skip).unwrap_or((0, ' '));
    &s[idx..]
}
