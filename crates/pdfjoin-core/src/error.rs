use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfJoinError {
    #[error("Input dir not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("No PDFs found in {}", .0.display())]
    NoInputs(PathBuf),

    #[error("Nothing was merged")]
    NothingMerged,

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
