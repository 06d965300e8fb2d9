//! Extraction strategies, tried in order until one places text
//!
//! Each strategy is a pure function from page data to placements. The
//! orchestrator in [`crate::pipeline`] owns the ordering and the data
//! fetching, so a strategy never sees more than it needs.

pub mod hidden_text;
pub mod structured;
pub mod words;

use serde::{Deserialize, Serialize};
use std::fmt;

/// One link of the per-page fallback chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Structured spans redrawn at their origins
    Structured,
    /// Flat word boxes
    Words,
    /// Invisible OCR text over a rasterized page
    Ocr,
}

impl Stage {
    /// Fallback chain for a pipeline with or without OCR
    pub fn chain(ocr_enabled: bool) -> &'static [Stage] {
        if ocr_enabled {
            &[Stage::Structured, Stage::Words, Stage::Ocr]
        } else {
            &[Stage::Structured, Stage::Words]
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Structured => "structured",
            Stage::Words => "words",
            Stage::Ocr => "ocr",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub(crate) fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}
