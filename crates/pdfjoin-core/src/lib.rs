//! Directory merge for PDFs
//!
//! Merges every PDF in a directory, in natural file-name order, into one
//! document with an outline entry per source file. Built on lopdf.

pub mod error;
pub mod listing;
pub mod merge;

pub use error::PdfJoinError;
pub use listing::{list_pdfs, natural_key};
pub use merge::{
    merge_directory, merge_documents, MergeOptions, MergeReport, MergedFile, Merger, SkippedFile,
};
