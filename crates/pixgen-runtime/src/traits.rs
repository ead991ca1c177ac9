//! Runtime trait definitions

use async_trait::async_trait;
use pixgen_core::PixgenResult;
use std::path::PathBuf;

/// Inputs for one fine-tuning run
#[derive(Debug, Clone)]
pub struct TrainSpec {
    /// Directory containing the prepared training images
    pub instance_data_dir: PathBuf,
    /// Directory the script writes the LoRA weights into
    pub output_dir: PathBuf,
    /// Trigger word identifying the subject
    pub trigger_word: String,
}

/// Inputs for one image generation run
#[derive(Debug, Clone)]
pub struct GenerateSpec {
    /// Path to the trained LoRA weights file
    pub lora_weights: PathBuf,
    /// Text prompt
    pub prompt: String,
    /// Path the PNG is written to
    pub output_path: PathBuf,
}

/// Trainer trait for running LoRA fine-tuning
#[async_trait]
pub trait Trainer: Send + Sync {
    /// Run fine-tuning to completion
    async fn train(&self, spec: &TrainSpec) -> PixgenResult<()>;

    /// Get the trainer name
    fn name(&self) -> &'static str;
}

/// Generator trait for rendering images with a trained adapter
#[async_trait]
pub trait Generator: Send + Sync {
    /// Render an image and return the PNG bytes
    async fn generate(&self, spec: &GenerateSpec) -> PixgenResult<Vec<u8>>;

    /// Get the generator name
    fn name(&self) -> &'static str;
}
