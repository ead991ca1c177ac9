//! pixgen-store: Artifact storage
//!
//! This crate provides the two persistence surfaces of the worker:
//! - The shared weights volume (trained LoRA adapters)
//! - The S3-compatible object store (generated images)

pub mod object;
pub mod volume;

pub use object::{output_key, thumbnail_key, ObjectStore};
pub use volume::{WeightsVolume, WEIGHTS_FILE};
