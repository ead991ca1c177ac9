//! pixgen-tasks: Task orchestration
//!
//! Ties the runtime, storage, and webhook layers together into the two
//! operations the worker exposes: train and generate.

pub mod runner;

pub use runner::TaskRunner;
