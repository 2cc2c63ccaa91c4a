use std::path::PathBuf;
use thiserror::Error;

/// Initialization failures. Per-sample outcomes never use this type.
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Dataset {path} is malformed: {reason}")]
    DatasetFormat { path: PathBuf, reason: String },

    #[error("No valid {0} records in dataset")]
    EmptyDataset(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown road: {0}")]
    UnknownRoad(String),
}

pub type TrackerResult<T> = Result<T, TrackerError>;
