// Core modules
pub mod api;
pub mod config;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod models;
pub mod orchestrator;
pub mod risk;
pub mod strategy;

// Re-export commonly used types
pub use api::MarketData;
pub use error::PipelineError;
pub use models::*;
pub use orchestrator::{Pipeline, PipelineReport};

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
