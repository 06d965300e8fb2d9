//! OCR engine boundary
//!
//! The pipeline only needs one operation from an engine: turn a raster
//! image into word tokens with pixel boxes and confidences.

pub mod tesseract;

pub use tesseract::TesseractEngine;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::model::OcrToken;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("OCR engine not available: {0}")]
    EngineUnavailable(String),

    #[error("OCR failed: {0}")]
    Failed(String),

    #[error("Unreadable image {}: {reason}", path.display())]
    Image { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Word-level recognizer
pub trait OcrEngine {
    fn name(&self) -> &str;

    /// Recognize `image` with the given language specifier (e.g. `kor+eng`)
    ///
    /// Fails when the language pack is unavailable or the image unreadable.
    fn recognize(&self, image: &Path, language: &str) -> Result<Vec<OcrToken>, OcrError>;
}
