//! Page data shared by the reader, the extraction strategies and the writer
//!
//! All geometry is in page space: PDF points, origin at the top-left corner
//! of the page as displayed, y growing downward.

use serde::{Deserialize, Serialize};

use crate::fonts::StandardFont;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Axis-aligned rectangle, `(x0, y0)` top-left and `(x1, y1)` bottom-right
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }
}

/// Displayed size of a page: its effective box (CropBox, else MediaBox)
/// with `/Rotate` already applied
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width: f64,
    pub height: f64,
}

impl PageGeometry {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    Text,
    Image,
}

/// One block of a page's structured text (blocks → lines → spans)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub kind: BlockKind,
    pub lines: Vec<Line>,
}

impl Block {
    pub fn text(lines: Vec<Line>) -> Self {
        Self {
            kind: BlockKind::Text,
            lines,
        }
    }

    pub fn image() -> Self {
        Self {
            kind: BlockKind::Image,
            lines: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub spans: Vec<Span>,
}

/// A run of characters sharing one style
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub text: String,
    /// Baseline origin; `None` when the source could not report one
    pub origin: Option<Point>,
    /// Nominal font size; absent or zero means "unknown"
    pub size: Option<f64>,
    /// Raw font name as found in the source document
    pub font: String,
}

/// A flat word token with its bounding box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub bbox: Rect,
    pub text: String,
    pub block_no: u32,
    pub line_no: u32,
    pub word_no: u32,
}

/// Word box in raster pixel space (top-left origin)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// OCR engine's confidence, kept as reported
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confidence(pub String);

impl Confidence {
    /// Integer score, `None` when the engine reported something non-numeric
    ///
    /// Decimal scores are truncated and kept rather than discarded as
    /// non-integers: tesseract 4 and later write them (e.g. `96.537`) for
    /// every word, so discarding would drop all of its output.
    pub fn score(&self) -> Option<i32> {
        let raw = self.0.trim();
        if let Ok(value) = raw.parse::<i32>() {
            return Some(value);
        }
        match raw.parse::<f64>() {
            Ok(value) if value.is_finite() => Some(value.trunc() as i32),
            _ => None,
        }
    }
}

impl From<&str> for Confidence {
    fn from(raw: &str) -> Self {
        Confidence(raw.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrToken {
    pub bbox: PixelBox,
    pub text: String,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    /// Painted glyphs
    Visible,
    /// Present in the content stream (selectable, searchable) but not painted
    Invisible,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Anchor {
    /// Left end of the baseline
    Baseline(Point),
    /// Left-aligned inside the box, first line only
    Boxed(Rect),
}

/// One text drawing instruction for a destination page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub text: String,
    pub anchor: Anchor,
    pub font: StandardFont,
    pub size: f64,
    pub visibility: Visibility,
}

impl Placement {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

pub fn char_total(placements: &[Placement]) -> usize {
    placements.iter().map(Placement::char_count).sum()
}
