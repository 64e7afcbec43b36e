pub mod prediction;
pub mod preprocess;
pub mod runtime;

use std::path::PathBuf;

pub use prediction::PredictionPipeline;

#[derive(Debug, thiserror::Error)]
pub enum PredictionError {
    #[error("Model artifact not found: {0}")]
    ModelNotFound(PathBuf),
    #[error("Failed to load model: {0}")]
    ModelLoad(String),
    #[error("Input image not found: {0}")]
    ImageNotFound(PathBuf),
    #[error("Failed to decode input image: {0}")]
    ImageDecode(#[from] image::ImageError),
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("No inference backend compiled in (rebuild with --features torch)")]
    BackendUnavailable,
}
