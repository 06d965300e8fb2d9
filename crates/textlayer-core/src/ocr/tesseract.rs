//! Tesseract OCR via the command line, word-level TSV output

use std::io::ErrorKind;
use std::path::Path;
use std::process::Command;

use tracing::debug;

use super::{OcrEngine, OcrError};
use crate::model::{Confidence, OcrToken, PixelBox};

/// TSV row level for single words
const WORD_LEVEL: &str = "5";
const TSV_COLUMNS: usize = 12;

pub struct TesseractEngine {
    binary: String,
}

impl TesseractEngine {
    pub fn new() -> Self {
        Self {
            binary: "tesseract".to_string(),
        }
    }

    /// Use a tesseract binary other than the one on `PATH`
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn run_tsv(&self, image: &Path, language: &str) -> Result<String, OcrError> {
        let output = Command::new(&self.binary)
            .arg(image)
            .arg("stdout")
            .args(["-l", language])
            .arg("tsv")
            .output();

        match output {
            Ok(output) if output.status.success() => {
                Ok(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(OcrError::Failed(format!("tesseract failed: {}", stderr.trim())))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(OcrError::EngineUnavailable(
                "tesseract not found (install tesseract-ocr)".to_string(),
            )),
            Err(e) => Err(OcrError::Io(e)),
        }
    }
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&self, image: &Path, language: &str) -> Result<Vec<OcrToken>, OcrError> {
        if !image.is_file() {
            return Err(OcrError::Image {
                path: image.to_path_buf(),
                reason: "file does not exist".to_string(),
            });
        }
        let tsv = self.run_tsv(image, language)?;
        let tokens = parse_tsv(&tsv);
        debug!(image = %image.display(), tokens = tokens.len(), "tesseract finished");
        Ok(tokens)
    }
}

/// Word rows of tesseract's TSV output
///
/// Columns: level, page, block, par, line, word, left, top, width, height,
/// conf, text. The header row and rows of any other level are ignored; the
/// confidence is kept verbatim for the placement filter.
pub fn parse_tsv(tsv: &str) -> Vec<OcrToken> {
    tsv.lines()
        .skip(1)
        .filter_map(|row| {
            let cols: Vec<&str> = row.splitn(TSV_COLUMNS, '\t').collect();
            if cols.len() < TSV_COLUMNS || cols[0] != WORD_LEVEL {
                return None;
            }
            let number = |i: usize| cols[i].trim().parse::<f64>().ok();
            Some(OcrToken {
                bbox: PixelBox {
                    left: number(6)?,
                    top: number(7)?,
                    width: number(8)?,
                    height: number(9)?,
                },
                confidence: Confidence::from(cols[10].trim()),
                text: cols[11].to_string(),
            })
        })
        .collect()
}
