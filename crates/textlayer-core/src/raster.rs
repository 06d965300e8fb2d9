//! Page rasterization for the OCR stage
//!
//! The whole document is rendered once, on first demand, into a temporary
//! directory that lives as long as the returned [`RasterSet`].

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;
use tracing::{debug, info};

use crate::error::ReconstructError;

/// One rendered page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

impl RasterImage {
    /// Read the pixel size from the PNG header
    pub fn from_png(path: impl Into<PathBuf>) -> Result<Self, ReconstructError> {
        let path = path.into();
        let (width, height) = png_dimensions(&path)?;
        Ok(Self {
            path,
            width,
            height,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Rendered pages keyed by 1-based page number
#[derive(Debug)]
pub struct RasterSet {
    pages: BTreeMap<u32, RasterImage>,
    _dir: Option<TempDir>,
}

impl RasterSet {
    pub fn new(pages: BTreeMap<u32, RasterImage>) -> Self {
        Self { pages, _dir: None }
    }

    /// Images living in `dir`, which is removed when the set is dropped
    pub fn in_temp_dir(dir: TempDir, pages: BTreeMap<u32, RasterImage>) -> Self {
        Self {
            pages,
            _dir: Some(dir),
        }
    }

    pub fn page(&self, number: u32) -> Option<&RasterImage> {
        self.pages.get(&number)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

pub trait Rasterizer {
    /// Render pages `1..=page_count` of `source` at `dpi`
    fn rasterize(
        &self,
        source: &Path,
        page_count: u32,
        dpi: u32,
    ) -> Result<RasterSet, ReconstructError>;
}

/// Renders with poppler's `pdftoppm`
pub struct PdftoppmRasterizer {
    binary: String,
}

impl PdftoppmRasterizer {
    pub fn new() -> Self {
        Self {
            binary: "pdftoppm".to_string(),
        }
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Arguments rendering every page to `<prefix>-N.png`
    ///
    /// Pages are cropped to their CropBox so the images cover the same area
    /// as the page geometry the reader reports.
    pub fn arguments(source: &Path, prefix: &Path, dpi: u32) -> Vec<OsString> {
        vec![
            "-png".into(),
            "-cropbox".into(),
            "-r".into(),
            dpi.to_string().into(),
            source.into(),
            prefix.into(),
        ]
    }
}

impl Default for PdftoppmRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Rasterizer for PdftoppmRasterizer {
    fn rasterize(
        &self,
        source: &Path,
        page_count: u32,
        dpi: u32,
    ) -> Result<RasterSet, ReconstructError> {
        let dir = TempDir::new()?;
        let prefix = dir.path().join("page");

        info!(source = %source.display(), dpi, "rasterizing document for OCR");
        let output = Command::new(&self.binary)
            .args(Self::arguments(source, &prefix, dpi))
            .output();

        match output {
            Ok(output) if output.status.success() => {}
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(ReconstructError::Raster(format!(
                    "pdftoppm failed: {}",
                    stderr.trim()
                )));
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ReconstructError::Raster(
                    "pdftoppm not found (install poppler-utils)".to_string(),
                ));
            }
            Err(e) => return Err(ReconstructError::Io(e)),
        }

        let mut pages = BTreeMap::new();
        for number in 1..=page_count {
            match find_page_image(dir.path(), number) {
                Some(path) => {
                    pages.insert(number, RasterImage::from_png(path)?);
                }
                None => debug!(page = number, "pdftoppm produced no image"),
            }
        }
        Ok(RasterSet::in_temp_dir(dir, pages))
    }
}

/// pdftoppm pads page numbers to the width of the largest one
/// (`page-1.png`, `page-01.png`, `page-001.png`, ...)
pub fn find_page_image(dir: &Path, number: u32) -> Option<PathBuf> {
    (1..=6)
        .map(|digits| dir.join(format!("page-{:0width$}.png", number, width = digits)))
        .find(|path| path.exists())
}

pub fn png_dimensions(path: &Path) -> Result<(u32, u32), ReconstructError> {
    let file = File::open(path)?;
    let reader = png::Decoder::new(BufReader::new(file))
        .read_info()
        .map_err(|e| ReconstructError::Raster(format!("{}: {}", path.display(), e)))?;
    let info = reader.info();
    Ok((info.width, info.height))
}
