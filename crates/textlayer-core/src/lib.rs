//! Text-layer reconstruction for PDFs
//!
//! Each source page is rebuilt as a text-only page of the same size. Text
//! comes from the first stage of the fallback chain that yields any:
//! - structured spans with their baseline origins and font sizes
//! - word bounding boxes
//! - OCR of a rendered image, placed as an invisible text layer
//!
//! Pages none of the stages could fill are listed in an empty-page report.

pub mod config;
pub mod coords;
pub mod error;
pub mod fonts;
pub mod model;
pub mod ocr;
pub mod pipeline;
pub mod raster;
pub mod reader;
pub mod strategy;
pub mod writer;

pub use config::{OcrFailurePolicy, RebuildConfig};
pub use error::ReconstructError;
pub use fonts::{classify_font, StandardFont};
pub use model::{Placement, Visibility};
pub use ocr::{OcrEngine, OcrError, TesseractEngine};
pub use pipeline::{EmptyPageReport, PageOutcome, Rebuilder, RebuildReport, Reconstruction};
pub use raster::{PdftoppmRasterizer, RasterImage, RasterSet, Rasterizer};
pub use reader::{LopdfReader, SourceDocument, SourcePage};
pub use strategy::Stage;
pub use writer::{OutputDocument, SaveOptions};

/// Rebuild `input` into `output` with the given configuration
pub fn rebuild(
    input: &std::path::Path,
    output: &std::path::Path,
    config: RebuildConfig,
) -> Result<RebuildReport, ReconstructError> {
    Rebuilder::new(config).rebuild_file(input, output)
}
