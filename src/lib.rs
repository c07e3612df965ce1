// Library exports shared by the three processing binaries
pub mod cli;
pub mod error;
pub mod image_processing;
pub mod json_output;
pub mod manifest;
pub mod utils;

// Re-export commonly used types
pub use cli::{CommonArgs, SmartArgs};
pub use error::PrepError;
pub use image_processing::{
    BatchSummary, FitStrategy, ProcessingConfig, ProcessingEngine, ProcessingResult,
};
pub use json_output::JsonMessage;
