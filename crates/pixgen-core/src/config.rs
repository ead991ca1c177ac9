//! Configuration types for the pixgen worker

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Base diffusion model the LoRA adapters are trained against
pub const BASE_MODEL: &str = "black-forest-labs/FLUX.1-dev";

/// Main worker configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WorkerConfig {
    /// API server configuration
    pub api: ApiConfig,
    /// Shared volume paths
    pub volume: VolumeConfig,
    /// External script invocation
    pub scripts: ScriptConfig,
    /// Training hyperparameters
    pub training: TrainConfig,
    /// Inference settings
    pub inference: InferenceConfig,
    /// Object storage settings (non-secret)
    pub object_store: ObjectStoreConfig,
    /// Webhook delivery settings
    pub webhook: WebhookConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl WorkerConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, crate::PixgenError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::PixgenError::Config(format!("Failed to read config file: {}", e))
        })?;
        toml::from_str(&content)
            .map_err(|e| crate::PixgenError::Config(format!("Failed to parse config: {}", e)))
    }
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Address to bind the HTTP server
    pub address: String,
    /// Port for the HTTP server
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// Shared volume paths
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    /// Root of the shared weights volume, one subdirectory per model id
    pub weights_path: PathBuf,
    /// Scratch space for downloaded archives and rendered images
    pub scratch_path: PathBuf,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            weights_path: PathBuf::from("/models"),
            scratch_path: PathBuf::from("/tmp/pixgen"),
        }
    }
}

/// Paths and limits for the external training/inference scripts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Launcher for the training script
    pub accelerate_path: PathBuf,
    /// DreamBooth LoRA training script (from the pinned diffusers checkout)
    pub train_script: PathBuf,
    /// Python interpreter for the inference script
    pub python_path: PathBuf,
    /// Inference script rendering base model + LoRA to a PNG
    pub generate_script: PathBuf,
    /// Training subprocess timeout in seconds
    pub train_timeout_secs: u64,
    /// Inference subprocess timeout in seconds
    pub generate_timeout_secs: u64,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            accelerate_path: PathBuf::from("accelerate"),
            train_script: PathBuf::from(
                "/diffusers/examples/dreambooth/train_dreambooth_lora_flux.py",
            ),
            python_path: PathBuf::from("python3"),
            generate_script: PathBuf::from("/opt/pixgen/generate.py"),
            // Both sit below the platform's 20 minute invocation cap
            train_timeout_secs: 1000,
            generate_timeout_secs: 110,
        }
    }
}

/// Hyperparameters for LoRA fine-tuning on faces
///
/// Tuned for a 24GB L4: batch size 1 at 512px with gradient
/// checkpointing, 500 steps (~8 minutes).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub max_train_steps: u32,
    pub learning_rate: f64,
    pub lora_rank: u32,
    pub resolution: u32,
    pub train_batch_size: u32,
    pub gradient_accumulation_steps: u32,
    pub lr_scheduler: String,
    pub seed: u64,
    /// "fp16" for L4/T4; bf16 needs A100 or newer
    pub mixed_precision: String,
    pub gradient_checkpointing: bool,
    /// Training archive download timeout in seconds
    pub download_timeout_secs: u64,
    /// GPU indices exposed to the training subprocess
    pub gpu_ids: Vec<u32>,
    /// Render a thumbnail after training and upload it
    pub render_thumbnail: bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            max_train_steps: 500,
            learning_rate: 1e-4,
            lora_rank: 8,
            resolution: 512,
            train_batch_size: 1,
            gradient_accumulation_steps: 2,
            lr_scheduler: "constant".to_string(),
            seed: 42,
            mixed_precision: "fp16".to_string(),
            gradient_checkpointing: true,
            download_timeout_secs: 120,
            gpu_ids: Vec::new(),
            render_thumbnail: false,
        }
    }
}

/// Inference settings for image generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub num_inference_steps: u32,
    pub guidance_scale: f64,
    pub width: u32,
    pub height: u32,
    pub seed: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            num_inference_steps: 20,
            guidance_scale: 3.5,
            width: 512,
            height: 512,
            seed: 42,
        }
    }
}

/// Object storage settings (credentials come from the environment)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectStoreConfig {
    /// S3-compatible endpoint URL
    pub endpoint: String,
    /// Bucket for generated images
    pub bucket: String,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9000".to_string(),
            bucket: "pixgen-outputs".to_string(),
        }
    }
}

/// Webhook delivery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Delivery attempts before giving up
    pub max_attempts: u32,
    /// Fixed delay between attempts in seconds
    pub backoff_secs: u64,
    /// Per-attempt request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_secs: 2,
            timeout_secs: 15,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Secrets resolved from the environment at startup
#[derive(Debug, Clone)]
pub struct Secrets {
    /// Object storage access key
    pub s3_access_key: String,
    /// Object storage secret key
    pub s3_secret_key: String,
    /// HMAC key for webhook signatures
    pub webhook_secret: String,
}

impl Secrets {
    /// Read secrets from the environment
    pub fn from_env() -> Result<Self, crate::PixgenError> {
        Ok(Self {
            s3_access_key: require_env("S3_ACCESS_KEY")?,
            s3_secret_key: require_env("S3_SECRET_KEY")?,
            webhook_secret: require_env("PIXGEN_WEBHOOK_SECRET")?,
        })
    }
}

fn require_env(name: &str) -> Result<String, crate::PixgenError> {
    std::env::var(name)
        .map_err(|_| crate::PixgenError::Config(format!("Missing environment variable: {}", name)))
}
