//! Shared fixtures: lopdf-built sources plus fake raster and OCR backends

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream, StringFormat};
use md5::{Digest, Md5};
use tempfile::TempDir;

use textlayer_core::model::{
    Block, Confidence, Line, OcrToken, PageGeometry, PixelBox, Point, Rect, Span, Word,
};
use textlayer_core::{
    OcrEngine, OcrError, RasterImage, RasterSet, Rasterizer, ReconstructError, SourceDocument,
    SourcePage,
};

pub enum SourcePageSpec {
    /// `(x, y, size, text)` runs in user space, shown with Helvetica
    Text(Vec<(i64, i64, i64, &'static str)>),
    /// A single image XObject covering the page
    ImageOnly,
    Blank,
}

pub fn text_page(x: i64, y: i64, size: i64, text: &'static str) -> SourcePageSpec {
    SourcePageSpec::Text(vec![(x, y, size, text)])
}

/// Letter-sized document; returns the encoded bytes
pub fn build_pdf(pages: &[SourcePageSpec]) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 1,
            "Height" => 1,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        vec![128],
    ));

    let mut kids = Vec::new();
    for spec in pages {
        let operations = match spec {
            SourcePageSpec::Text(runs) => {
                let mut ops = Vec::new();
                for (x, y, size, text) in runs {
                    ops.push(Operation::new("BT", vec![]));
                    ops.push(Operation::new(
                        "Tf",
                        vec![Object::Name(b"F1".to_vec()), (*size).into()],
                    ));
                    ops.push(Operation::new("Td", vec![(*x).into(), (*y).into()]));
                    ops.push(Operation::new(
                        "Tj",
                        vec![Object::String(text.as_bytes().to_vec(), StringFormat::Literal)],
                    ));
                    ops.push(Operation::new("ET", vec![]));
                }
                ops
            }
            SourcePageSpec::ImageOnly => vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![612.into(), 0.into(), 0.into(), 792.into(), 0.into(), 0.into()],
                ),
                Operation::new("Do", vec![Object::Name(b"Im1".to_vec())]),
                Operation::new("Q", vec![]),
            ],
            SourcePageSpec::Blank => Vec::new(),
        };
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
                "XObject" => dictionary! { "Im1" => image_id },
            },
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// Write `pages` to `dir/name` and return the path
pub fn write_pdf(dir: &Path, name: &str, pages: &[SourcePageSpec]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, build_pdf(pages)).unwrap();
    path
}

/// Password padding string of the standard security handler
const PASSWORD_PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

fn rc4(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut s: Vec<u8> = (0..=255).collect();
    let mut j = 0u8;
    for i in 0..256 {
        j = j.wrapping_add(s[i]).wrapping_add(key[i % key.len()]);
        s.swap(i, j as usize);
    }
    let (mut i, mut j) = (0u8, 0u8);
    data.iter()
        .map(|byte| {
            i = i.wrapping_add(1);
            j = j.wrapping_add(s[i as usize]);
            s.swap(i as usize, j as usize);
            byte ^ s[s[i as usize].wrapping_add(s[j as usize]) as usize]
        })
        .collect()
}

/// RC4 40-bit (R2) encrypted copy of `bytes` that opens with the empty
/// user password; the fixtures only carry strings inside streams
pub fn encrypt_with_empty_password(bytes: &[u8]) -> Vec<u8> {
    let mut doc = Document::load_mem(bytes).unwrap();
    let owner = [0x5Au8; 32];
    let permissions: i32 = -4;
    let file_id = vec![0x33u8; 16];

    let mut hasher = Md5::new();
    hasher.update(PASSWORD_PADDING);
    hasher.update(owner);
    hasher.update(permissions.to_le_bytes());
    hasher.update(&file_id);
    let key = hasher.finalize()[..5].to_vec();

    for (&(number, generation), object) in doc.objects.iter_mut() {
        if let Object::Stream(stream) = object {
            let mut hasher = Md5::new();
            hasher.update(&key);
            hasher.update(&number.to_le_bytes()[..3]);
            hasher.update(generation.to_le_bytes());
            let digest = hasher.finalize();
            let encrypted = rc4(&digest[..10], &stream.content);
            stream.set_content(encrypted);
        }
    }

    let encrypt_id = doc.add_object(dictionary! {
        "Filter" => "Standard",
        "V" => 1,
        "R" => 2,
        "Length" => 40,
        "P" => permissions as i64,
        "O" => Object::string_literal(owner.to_vec()),
        "U" => Object::string_literal(rc4(&key, &PASSWORD_PADDING)),
    });
    doc.trailer.set("Encrypt", encrypt_id);
    doc.trailer.set(
        "ID",
        vec![
            Object::string_literal(file_id.clone()),
            Object::string_literal(file_id),
        ],
    );
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// What a [`MemoryDocument`] page reports
#[derive(Debug, Clone)]
pub enum MemoryContent {
    /// One Courier span at (10, 20), size 9
    Spans(String),
    /// No spans; one word box at (10, 10) sized 50 x 12
    WordsOnly(String),
    Nothing,
}

pub struct MemoryPage {
    number: u32,
    geometry: PageGeometry,
    content: MemoryContent,
}

impl SourcePage for MemoryPage {
    fn number(&self) -> u32 {
        self.number
    }

    fn geometry(&self) -> PageGeometry {
        self.geometry
    }

    fn blocks(&self) -> Result<Vec<Block>, ReconstructError> {
        let MemoryContent::Spans(text) = &self.content else {
            return Ok(Vec::new());
        };
        Ok(vec![Block::text(vec![Line {
            spans: vec![Span {
                text: text.clone(),
                origin: Some(Point::new(10.0, 20.0)),
                size: Some(9.0),
                font: "Courier".into(),
            }],
        }])])
    }

    fn words(&self) -> Result<Vec<Word>, ReconstructError> {
        let MemoryContent::WordsOnly(text) = &self.content else {
            return Ok(Vec::new());
        };
        Ok(vec![Word {
            bbox: Rect::from_xywh(10.0, 10.0, 50.0, 12.0),
            text: text.clone(),
            block_no: 0,
            line_no: 0,
            word_no: 0,
        }])
    }
}

/// In-memory source; pages are served straight from `pages`
pub struct MemoryDocument {
    pub pages: Vec<(PageGeometry, MemoryContent)>,
}

impl SourceDocument for MemoryDocument {
    fn path(&self) -> &Path {
        Path::new("memory.pdf")
    }

    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page(&self, number: u32) -> Result<Box<dyn SourcePage + '_>, ReconstructError> {
        let (geometry, content) = number
            .checked_sub(1)
            .and_then(|i| self.pages.get(i as usize))
            .cloned()
            .ok_or_else(|| ReconstructError::Config(format!("no page {}", number)))?;
        Ok(Box::new(MemoryPage {
            number,
            geometry,
            content,
        }))
    }
}

/// Renders every page as a white PNG, one pixel per point
pub struct FakeRasterizer {
    pub calls: Cell<u32>,
    pub fail: bool,
}

impl FakeRasterizer {
    pub fn new() -> Self {
        Self {
            calls: Cell::new(0),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            calls: Cell::new(0),
            fail: true,
        }
    }
}

impl Rasterizer for &FakeRasterizer {
    fn rasterize(
        &self,
        _source: &Path,
        page_count: u32,
        _dpi: u32,
    ) -> Result<RasterSet, ReconstructError> {
        self.calls.set(self.calls.get() + 1);
        if self.fail {
            return Err(ReconstructError::Raster("renderer crashed".into()));
        }
        let dir = TempDir::new()?;
        let mut pages = BTreeMap::new();
        for number in 1..=page_count {
            let path = dir.path().join(format!("page-{}.png", number));
            write_png(&path, 612, 792);
            pages.insert(number, RasterImage::from_png(path)?);
        }
        Ok(RasterSet::in_temp_dir(dir, pages))
    }
}

fn write_png(path: &Path, width: u32, height: u32) {
    let file = File::create(path).unwrap();
    let mut encoder = png::Encoder::new(BufWriter::new(file), width, height);
    encoder.set_color(png::ColorType::Grayscale);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header().unwrap();
    writer
        .write_image_data(&vec![255u8; (width * height) as usize])
        .unwrap();
}

/// Returns canned tokens per image file name and records every request
#[derive(Default)]
pub struct FakeOcr {
    pub tokens: HashMap<String, Vec<OcrToken>>,
    pub requests: RefCell<Vec<(String, String)>>,
    pub fail: bool,
}

impl FakeOcr {
    pub fn with_page(mut self, number: u32, tokens: Vec<OcrToken>) -> Self {
        self.tokens.insert(format!("page-{}.png", number), tokens);
        self
    }
}

impl OcrEngine for &FakeOcr {
    fn name(&self) -> &str {
        "fake"
    }

    fn recognize(&self, image: &Path, language: &str) -> Result<Vec<OcrToken>, OcrError> {
        let file = image
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.requests
            .borrow_mut()
            .push((file.clone(), language.to_string()));
        if self.fail {
            return Err(OcrError::Failed("language pack missing".into()));
        }
        Ok(self.tokens.get(&file).cloned().unwrap_or_default())
    }
}

pub fn token(left: f64, top: f64, width: f64, height: f64, text: &str, conf: &str) -> OcrToken {
    OcrToken {
        bbox: PixelBox {
            left,
            top,
            width,
            height,
        },
        text: text.to_string(),
        confidence: Confidence::from(conf),
    }
}
