//! pixgen-runtime: Subprocess orchestration
//!
//! This crate runs the external ML work the worker delegates:
//! - Training dataset download and extraction
//! - LoRA fine-tuning via the diffusers DreamBooth script
//! - Image generation via the inference script

pub mod dataset;
pub mod generator;
pub mod trainer;
pub mod traits;

pub use dataset::DatasetFetcher;
pub use generator::ScriptGenerator;
pub use trainer::ScriptTrainer;
pub use traits::{GenerateSpec, Generator, TrainSpec, Trainer};
