//! Rebuild configuration
//!
//! TOML-based; every field has a default, so an empty file (or no file at
//! all) yields the stock pipeline without OCR.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ReconstructError;

pub const DEFAULT_SPAN_SIZE: f64 = 10.0;
pub const WORD_SIZE_FACTOR: f64 = 0.8;
pub const OCR_SIZE_FACTOR: f64 = 0.9;
pub const MIN_FONT_SIZE: f64 = 6.0;
pub const MAX_FONT_SIZE: f64 = 48.0;
pub const MIN_OCR_CONFIDENCE: i32 = 40;
pub const DEFAULT_OCR_LANGUAGE: &str = "kor+eng";
pub const DEFAULT_OCR_DPI: u32 = 300;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RebuildConfig {
    pub fonts: FontSizing,
    pub ocr: OcrSettings,
    pub output: OutputSettings,
}

impl RebuildConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ReconstructError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ReconstructError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_str(&content).map_err(|e| match e {
            ReconstructError::Config(reason) => {
                ReconstructError::Config(format!("{}: {}", path.display(), reason))
            }
            other => other,
        })
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, ReconstructError> {
        let config: Self =
            toml::from_str(s).map_err(|e| ReconstructError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_ocr(mut self, enabled: bool) -> Self {
        self.ocr.enabled = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), ReconstructError> {
        let fonts = &self.fonts;
        if !(fonts.min_size > 0.0 && fonts.min_size <= fonts.max_size) {
            return Err(ReconstructError::Config(format!(
                "font size range {}..{} is invalid",
                fonts.min_size, fonts.max_size
            )));
        }
        for (name, value) in [
            ("default_span_size", fonts.default_span_size),
            ("word_size_factor", fonts.word_size_factor),
            ("ocr_size_factor", fonts.ocr_size_factor),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ReconstructError::Config(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )));
            }
        }
        if self.ocr.dpi == 0 {
            return Err(ReconstructError::Config("ocr.dpi must be > 0".into()));
        }
        if !(0..=100).contains(&self.ocr.min_confidence) {
            return Err(ReconstructError::Config(format!(
                "ocr.min_confidence must be within 0..=100, got {}",
                self.ocr.min_confidence
            )));
        }
        if self.ocr.language.trim().is_empty() {
            return Err(ReconstructError::Config("ocr.language is empty".into()));
        }
        Ok(())
    }
}

/// Font size heuristics shared by the extraction strategies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontSizing {
    /// Size used for spans that report none
    pub default_span_size: f64,
    /// Word box height → font size
    pub word_size_factor: f64,
    /// OCR box height (after scaling) → font size
    pub ocr_size_factor: f64,
    pub min_size: f64,
    pub max_size: f64,
}

impl Default for FontSizing {
    fn default() -> Self {
        Self {
            default_span_size: DEFAULT_SPAN_SIZE,
            word_size_factor: WORD_SIZE_FACTOR,
            ocr_size_factor: OCR_SIZE_FACTOR,
            min_size: MIN_FONT_SIZE,
            max_size: MAX_FONT_SIZE,
        }
    }
}

impl FontSizing {
    /// Bound `size` to `min_size..=max_size`; total even for an inverted
    /// range, where `max_size` wins
    pub fn clamp(&self, size: f64) -> f64 {
        size.max(self.min_size).min(self.max_size)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrFailurePolicy {
    /// Log and leave the page in the empty-page report
    #[default]
    Skip,
    /// Fail the whole run
    Abort,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    pub enabled: bool,
    /// Tesseract language specifier, e.g. `kor+eng`
    pub language: String,
    /// Rasterization resolution
    pub dpi: u32,
    /// Tokens below this confidence are dropped
    pub min_confidence: i32,
    pub on_failure: OcrFailurePolicy,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            language: DEFAULT_OCR_LANGUAGE.to_string(),
            dpi: DEFAULT_OCR_DPI,
            min_confidence: MIN_OCR_CONFIDENCE,
            on_failure: OcrFailurePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Flate-compress content streams
    pub compress: bool,
    /// Drop unreferenced objects and renumber before writing
    pub clean: bool,
    /// Write the output even when no page produced text
    pub allow_empty: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            compress: true,
            clean: true,
            allow_empty: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_toml_is_default() {
        let config = RebuildConfig::from_str("").unwrap();
        assert_eq!(config, RebuildConfig::default());
        assert!(!config.ocr.enabled);
        assert_eq!(config.ocr.min_confidence, 40);
        assert_eq!(config.fonts.max_size, 48.0);
    }

    #[test]
    fn test_partial_sections() {
        let toml = r#"
            [ocr]
            enabled = true
            language = "eng"
            on_failure = "abort"

            [fonts]
            word_size_factor = 0.75
        "#;
        let config = RebuildConfig::from_str(toml).unwrap();
        assert!(config.ocr.enabled);
        assert_eq!(config.ocr.language, "eng");
        assert_eq!(config.ocr.dpi, 300);
        assert_eq!(config.ocr.on_failure, OcrFailurePolicy::Abort);
        assert_eq!(config.fonts.word_size_factor, 0.75);
        assert_eq!(config.fonts.ocr_size_factor, 0.9);
        assert!(config.output.compress);
    }

    #[test]
    fn test_inverted_size_range_rejected() {
        let toml = r#"
            [fonts]
            min_size = 50.0
            max_size = 10.0
        "#;
        let err = RebuildConfig::from_str(toml).unwrap_err();
        assert!(err.to_string().contains("font size range"));
    }

    #[test]
    fn test_confidence_out_of_range_rejected() {
        let toml = r#"
            [ocr]
            min_confidence = 140
        "#;
        assert!(RebuildConfig::from_str(toml).is_err());
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let toml = r#"
            [ocr]
            on_failure = "retry"
        "#;
        assert!(matches!(
            RebuildConfig::from_str(toml),
            Err(ReconstructError::Config(_))
        ));
    }

    #[test]
    fn test_from_file_reports_path() {
        let err = RebuildConfig::from_file("/nonexistent/textlayer.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/textlayer.toml"));
    }

    #[test]
    fn test_clamp() {
        let sizing = FontSizing::default();
        assert_eq!(sizing.clamp(100.0 * 0.8), 48.0);
        assert_eq!(sizing.clamp(2.0 * 0.8), 6.0);
        assert_eq!(sizing.clamp(10.0 * 0.8), 8.0);
    }

    #[test]
    fn test_clamp_with_inverted_range() {
        let sizing = FontSizing {
            min_size: 50.0,
            max_size: 10.0,
            ..FontSizing::default()
        };
        assert_eq!(sizing.clamp(30.0), 10.0);
        assert_eq!(sizing.clamp(5.0), 10.0);
        assert!(RebuildConfig {
            fonts: sizing,
            ..RebuildConfig::default()
        }
        .validate()
        .is_err());
    }
}
