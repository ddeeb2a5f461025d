//! Error types for meadow

use thiserror::Error;

/// Main error type.
///
/// Construction-time variants (`Terrain`, `Scatter`, `Config`) abort scene
/// setup; `Gpu` aborts the frame it was raised in.
#[derive(Debug, Error)]
pub enum Error {
    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("Window error: {0}")]
    Window(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Terrain error: {0}")]
    Terrain(String),

    #[error("Scatter error: {0}")]
    Scatter(String),
}
