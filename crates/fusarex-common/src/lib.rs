//! fusarex-common: shared types and configuration used across all Fusarex crates.

pub mod config;
pub mod models;

// Re-export commonly used types
pub use config::Config;
pub use models::{Document, ExtractionResult};
