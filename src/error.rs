//! Error types for ade20k-masks

use std::path::PathBuf;
use thiserror::Error;

use crate::mat::MatError;

pub type Result<T, E = Ade20kError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Ade20kError {
    #[error("Unknown subset: {0} (expected \"train\" or \"val\")")]
    UnknownSubset(String),

    #[error("Unknown class id {class_id}: index has {num_classes} classes")]
    UnknownClass { class_id: usize, num_classes: usize },

    #[error("Unknown image id {0}")]
    UnknownImage(usize),

    #[error("No image size entry for {0}")]
    MissingImageSize(String),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("MAT file error: {0}")]
    Mat(#[from] MatError),

    #[error("Image size table error: {0}")]
    SizeTable(String),

    #[error("Failed to decode image {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Settings error: {0}")]
    Settings(String),
}

impl Ade20kError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Ade20kError::Io { path: path.into(), source }
    }
}

/// Structural problems in the dataset index
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' has unexpected type: expected {expected}")]
    FieldType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("malformed index: {0}")]
    Malformed(String),

    #[error("invalid JSON index: {0}")]
    Json(#[from] serde_json::Error),
}
