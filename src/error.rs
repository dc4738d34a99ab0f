use std::path::PathBuf;
use thiserror::Error;

/// The main error type for anchorkit operations.
#[derive(Debug, Error)]
pub enum AnchorkitError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse VOC XML from {path}: {message}")]
    VocXmlParse { path: PathBuf, message: String },

    #[error("Invalid annotation layout at {path}: {message}")]
    VocLayoutInvalid { path: PathBuf, message: String },

    #[error("No usable bounding boxes found under {path}")]
    EmptyCorpus { path: PathBuf },

    #[error("Degenerate box geometry: {message}")]
    DegenerateBox { message: String },

    #[error("Invalid clustering parameters: {message}")]
    InvalidClusterParams { message: String },

    #[error("Anchor file {path} already exists")]
    AnchorFileExists { path: PathBuf },

    #[error("Failed to parse anchor file {path}: {message}")]
    AnchorFileParse { path: PathBuf, message: String },

    #[error("Failed to write anchor visualization: {0}")]
    DrawFailed(#[from] image::ImageError),

    #[error("Dataset split failed: {message}")]
    SplitFailed { message: String },

    #[error("Failed to serialize report: {0}")]
    ReportJson(#[from] serde_json::Error),

    #[error("Unsupported option value: {0}")]
    UnsupportedOption(String),
}
