//! pixgen-core: Core types for the pixgen GPU worker
//!
//! This crate provides the fundamental types used throughout the worker:
//! - Task requests and webhook callback payloads
//! - Worker configuration and environment secrets
//! - Error handling

pub mod config;
pub mod error;
pub mod task;

pub use config::*;
pub use error::*;
pub use task::*;
