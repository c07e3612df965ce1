use std::path::PathBuf;
use thiserror::Error;

/// Per-image failure taxonomy for the preparation pipeline.
///
/// Every variant is fatal to a single image only; the batch driver logs the
/// failure and moves on to the next image.
#[derive(Debug, Error)]
pub enum PrepError {
    /// Malformed geometry handed to the planner (zero dimensions,
    /// non-positive target ratio).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The source image could not be decoded.
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The subject detector failed on this image.
    #[error("subject detection failed: {0}")]
    Detection(String),

    /// The output image could not be encoded or written.
    #[error("failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}
