//! pixgen-api: HTTP surface of the worker

pub mod rest;

pub use rest::{create_router, AppState};
