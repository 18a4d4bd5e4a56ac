use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnnotateError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("File contains format errors")]
    FormatError,

    #[error("Signal index {0} out of range")]
    InvalidSignalIndex(usize),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Invalid header size")]
    InvalidHeader,

    #[error("Invalid number of signals: {0}")]
    InvalidSignalCount(i32),

    #[error("Physical min equals physical max")]
    PhysicalMinEqualsMax,

    #[error("Digital min equals digital max")]
    DigitalMinEqualsMax,

    #[error("Signals have mixed sample rates: {0:?}")]
    MixedSampleRates(Vec<i32>),

    #[error("Summary {}: {}", .path.display(), .reason)]
    Summary { path: PathBuf, reason: String },

    #[error("Interval {0} lies outside its recording")]
    IntervalOutOfRecording(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Manifest error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Worker pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl AnnotateError {
    pub(crate) fn summary(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        AnnotateError::Summary { path: path.into(), reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, AnnotateError>;
