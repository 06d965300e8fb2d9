use std::path::PathBuf;

use thiserror::Error;

use crate::ocr::OcrError;

#[derive(Error, Debug)]
pub enum ReconstructError {
    #[error("Failed to open {}: {reason}", path.display())]
    Open { path: PathBuf, reason: String },

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Rasterization failed: {0}")]
    Raster(String),

    #[error("OCR failed: {0}")]
    Ocr(#[from] OcrError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("No text could be extracted from any of the {pages} page(s)")]
    NothingExtracted { pages: u32 },

    #[error("Failed to save {}: {reason}", path.display())]
    Save { path: PathBuf, reason: String },
}

impl ReconstructError {
    pub(crate) fn open(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        ReconstructError::Open {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
