//! Page orchestrator: runs the fallback chain over every page
//!
//! Per page the state advances `NotStarted → TriedStructured → TriedWords →
//! TriedOcr → Done`, moving on only while the stages tried so far placed no
//! characters. Rasterization for OCR happens at most once per document, on
//! the first page that needs it.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{OcrFailurePolicy, RebuildConfig};
use crate::error::ReconstructError;
use crate::model::{char_total, Placement};
use crate::ocr::{OcrEngine, TesseractEngine};
use crate::raster::{PdftoppmRasterizer, RasterSet, Rasterizer};
use crate::reader::{LopdfReader, SourceDocument, SourcePage};
use crate::strategy::{hidden_text, structured, words, Stage};
use crate::writer::{OutputDocument, OutputPage, SaveOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    NotStarted,
    TriedStructured,
    TriedWords,
    TriedOcr,
    Done,
}

/// What happened to one page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageOutcome {
    /// 1-based
    pub number: u32,
    pub stages_tried: Vec<Stage>,
    /// Stage whose placements ended up on the page
    pub stage_used: Option<Stage>,
    pub chars: usize,
    /// OCR failure isolated to this page
    pub ocr_error: Option<String>,
}

impl PageOutcome {
    pub fn is_empty(&self) -> bool {
        self.chars == 0
    }
}

/// Pages (1-based, ascending) on which no stage placed any text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmptyPageReport {
    pages: Vec<u32>,
}

impl EmptyPageReport {
    pub fn from_outcomes(outcomes: &[PageOutcome]) -> Self {
        let mut pages: Vec<u32> = outcomes
            .iter()
            .filter(|o| o.is_empty())
            .map(|o| o.number)
            .collect();
        pages.sort_unstable();
        Self { pages }
    }

    pub fn pages(&self) -> &[u32] {
        &self.pages
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }
}

impl fmt::Display for EmptyPageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listed: Vec<String> = self.pages.iter().map(u32::to_string).collect();
        f.write_str(&listed.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    pub pages: Vec<PageOutcome>,
    pub empty_pages: EmptyPageReport,
    pub total_chars: usize,
    /// Set once the output has been written
    pub output: Option<PathBuf>,
}

impl RebuildReport {
    fn from_outcomes(pages: Vec<PageOutcome>) -> Self {
        Self {
            empty_pages: EmptyPageReport::from_outcomes(&pages),
            total_chars: pages.iter().map(|p| p.chars).sum(),
            pages,
            output: None,
        }
    }
}

/// Rebuilt pages together with the report describing them
#[derive(Debug)]
pub struct Reconstruction {
    pub document: OutputDocument,
    pub report: RebuildReport,
}

enum RasterState {
    Pending,
    Ready(RasterSet),
    Failed(String),
}

pub struct Rebuilder<'a> {
    config: RebuildConfig,
    rasterizer: Box<dyn Rasterizer + 'a>,
    ocr: Box<dyn OcrEngine + 'a>,
}

impl<'a> Rebuilder<'a> {
    /// Pipeline with `pdftoppm` and `tesseract` as collaborators
    pub fn new(config: RebuildConfig) -> Self {
        Self {
            config,
            rasterizer: Box::new(PdftoppmRasterizer::new()),
            ocr: Box::new(TesseractEngine::new()),
        }
    }

    pub fn with_rasterizer(mut self, rasterizer: impl Rasterizer + 'a) -> Self {
        self.rasterizer = Box::new(rasterizer);
        self
    }

    pub fn with_ocr_engine(mut self, engine: impl OcrEngine + 'a) -> Self {
        self.ocr = Box::new(engine);
        self
    }

    pub fn config(&self) -> &RebuildConfig {
        &self.config
    }

    /// Open `input`, rebuild it and write the result to `output`
    pub fn rebuild_file(&self, input: &Path, output: &Path) -> Result<RebuildReport, ReconstructError> {
        let source = LopdfReader::open(input)?;
        self.rebuild(&source, output)
    }

    /// Rebuild `source` and write it to `output`
    ///
    /// Nothing is written when no page produced text, unless
    /// `output.allow_empty` is set.
    pub fn rebuild(
        &self,
        source: &dyn SourceDocument,
        output: &Path,
    ) -> Result<RebuildReport, ReconstructError> {
        let Reconstruction {
            document,
            mut report,
        } = self.reconstruct(source)?;

        if report.total_chars == 0 && !self.config.output.allow_empty {
            return Err(ReconstructError::NothingExtracted {
                pages: source.page_count(),
            });
        }

        document.save(output, SaveOptions::from(&self.config.output))?;
        info!(
            output = %output.display(),
            pages = document.page_count(),
            chars = report.total_chars,
            "rebuilt document"
        );
        report.output = Some(output.to_path_buf());
        Ok(report)
    }

    /// Run every page through the fallback chain, in source order
    ///
    /// The configuration is validated first; an invalid one fails before
    /// any page is read.
    pub fn reconstruct(&self, source: &dyn SourceDocument) -> Result<Reconstruction, ReconstructError> {
        self.config.validate()?;
        let mut document = OutputDocument::new();
        let mut outcomes = Vec::with_capacity(source.page_count() as usize);
        let mut raster = RasterState::Pending;

        for number in 1..=source.page_count() {
            let page = source.page(number)?;
            let (output_page, outcome) = self.rebuild_page(source, page.as_ref(), &mut raster)?;
            info!(
                page = number,
                stage = outcome.stage_used.map(Stage::name).unwrap_or("none"),
                chars = outcome.chars,
                "page done"
            );
            document.push_page(output_page);
            outcomes.push(outcome);
        }

        let report = RebuildReport::from_outcomes(outcomes);
        if !report.empty_pages.is_empty() {
            warn!(pages = %report.empty_pages, "pages without extractable text");
        }
        Ok(Reconstruction { document, report })
    }

    fn rebuild_page(
        &self,
        source: &dyn SourceDocument,
        page: &dyn SourcePage,
        raster: &mut RasterState,
    ) -> Result<(OutputPage, PageOutcome), ReconstructError> {
        let chain = Stage::chain(self.config.ocr.enabled);
        let sizing = &self.config.fonts;
        let mut outcome = PageOutcome {
            number: page.number(),
            stages_tried: Vec::new(),
            stage_used: None,
            chars: 0,
            ocr_error: None,
        };
        let mut placements: Vec<Placement> = Vec::new();
        let mut state = PageState::NotStarted;

        while state != PageState::Done {
            let (stage, next) = match state {
                PageState::NotStarted => (Stage::Structured, PageState::TriedStructured),
                PageState::TriedStructured => (Stage::Words, PageState::TriedWords),
                PageState::TriedWords if chain.contains(&Stage::Ocr) => {
                    (Stage::Ocr, PageState::TriedOcr)
                }
                PageState::TriedWords | PageState::TriedOcr | PageState::Done => {
                    state = PageState::Done;
                    continue;
                }
            };

            outcome.stages_tried.push(stage);
            placements = match stage {
                Stage::Structured => structured::extract(&page.blocks()?, sizing),
                Stage::Words => words::extract(page.words()?, sizing),
                Stage::Ocr => match self.ocr_page(source, page, raster) {
                    Ok(placed) => placed,
                    Err(e) => match self.config.ocr.on_failure {
                        OcrFailurePolicy::Abort => return Err(e),
                        OcrFailurePolicy::Skip => {
                            warn!(page = page.number(), error = %e, "OCR failed, leaving page empty");
                            outcome.ocr_error = Some(e.to_string());
                            Vec::new()
                        }
                    },
                },
            };

            let chars = char_total(&placements);
            debug!(page = page.number(), %stage, chars, "stage finished");
            if chars > 0 {
                outcome.stage_used = Some(stage);
                outcome.chars = chars;
                state = PageState::Done;
            } else {
                state = next;
            }
        }

        let mut output_page = OutputPage::new(page.geometry());
        output_page.extend(placements);
        Ok((output_page, outcome))
    }

    fn ocr_page(
        &self,
        source: &dyn SourceDocument,
        page: &dyn SourcePage,
        raster: &mut RasterState,
    ) -> Result<Vec<Placement>, ReconstructError> {
        let settings = &self.config.ocr;
        if matches!(raster, RasterState::Pending) {
            *raster = match self
                .rasterizer
                .rasterize(source.path(), source.page_count(), settings.dpi)
            {
                Ok(set) => {
                    debug!(images = set.len(), "raster set ready");
                    RasterState::Ready(set)
                }
                Err(ReconstructError::Raster(reason)) => RasterState::Failed(reason),
                Err(e) => RasterState::Failed(e.to_string()),
            };
        }

        let set = match raster {
            RasterState::Ready(set) => set,
            RasterState::Failed(reason) => return Err(ReconstructError::Raster(reason.clone())),
            RasterState::Pending => {
                return Err(ReconstructError::Raster("rasterization did not run".into()))
            }
        };

        let number = page.number();
        let image = set
            .page(number)
            .ok_or_else(|| ReconstructError::Raster(format!("no raster image for page {}", number)))?;
        let tokens = self.ocr.recognize(&image.path, &settings.language)?;
        Ok(hidden_text::extract(
            tokens,
            &page.geometry(),
            image.size(),
            settings.min_confidence,
            &self.config.fonts,
        ))
    }
}
