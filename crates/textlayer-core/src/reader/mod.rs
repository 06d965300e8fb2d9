//! Source document access
//!
//! The pipeline reads pages through [`SourceDocument`] and [`SourcePage`].
//! [`LopdfReader`] is the lopdf-backed implementation: it interprets each
//! page's content stream once and serves both the structured blocks and the
//! flat words from that single pass.

pub mod cmap;
pub mod font;
mod interpreter;
mod layout;

use std::cell::OnceCell;
use std::path::{Path, PathBuf};

use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, info};

use crate::coords::PageTransform;
use crate::error::ReconstructError;
use crate::model::{Block, PageGeometry, Word};
use interpreter::Interpreter;
use layout::PageLayout;

/// US Letter, used when a page has no usable MediaBox
const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

pub trait SourcePage {
    /// 1-based page number
    fn number(&self) -> u32;

    fn geometry(&self) -> PageGeometry;

    /// Structured text (blocks → lines → spans) in page space
    fn blocks(&self) -> Result<Vec<Block>, ReconstructError>;

    /// Flat word boxes in page space
    fn words(&self) -> Result<Vec<Word>, ReconstructError>;
}

pub trait SourceDocument {
    /// File the document was read from; the rasterizer renders this file
    fn path(&self) -> &Path;

    fn page_count(&self) -> u32;

    /// Page by 1-based number
    fn page(&self, number: u32) -> Result<Box<dyn SourcePage + '_>, ReconstructError>;
}

pub struct LopdfReader {
    path: PathBuf,
    doc: Document,
    pages: Vec<ObjectId>,
}

impl LopdfReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ReconstructError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ReconstructError::open(path, "file not found"));
        }
        let doc = Document::load(path).map_err(|e| ReconstructError::open(path, e))?;
        Self::from_document(path, doc)
    }

    /// Read from memory; `path` is what [`SourceDocument::path`] reports
    pub fn from_bytes(path: impl Into<PathBuf>, bytes: &[u8]) -> Result<Self, ReconstructError> {
        let path = path.into();
        let doc = Document::load_mem(bytes).map_err(|e| ReconstructError::open(&path, e))?;
        Self::from_document(&path, doc)
    }

    fn from_document(path: &Path, mut doc: Document) -> Result<Self, ReconstructError> {
        if doc.is_encrypted() {
            doc.decrypt("").map_err(|e| {
                ReconstructError::open(path, format!("encrypted and no empty password: {}", e))
            })?;
        }
        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        info!(path = %path.display(), pages = pages.len(), "opened source document");
        Ok(Self {
            path: path.to_path_buf(),
            doc,
            pages,
        })
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }
}

impl SourceDocument for LopdfReader {
    fn path(&self) -> &Path {
        &self.path
    }

    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page(&self, number: u32) -> Result<Box<dyn SourcePage + '_>, ReconstructError> {
        let id = number
            .checked_sub(1)
            .and_then(|i| self.pages.get(i as usize))
            .copied()
            .ok_or_else(|| {
                ReconstructError::open(&self.path, format!("page {} does not exist", number))
            })?;
        Ok(Box::new(LopdfPage::new(&self.doc, id, number)))
    }
}

pub struct LopdfPage<'a> {
    doc: &'a Document,
    id: ObjectId,
    number: u32,
    transform: PageTransform,
    layout: OnceCell<PageLayout>,
}

impl<'a> LopdfPage<'a> {
    fn new(doc: &'a Document, id: ObjectId, number: u32) -> Self {
        let media_box = inherited(doc, id, b"MediaBox")
            .and_then(|o| rectangle(doc, o))
            .unwrap_or(DEFAULT_MEDIA_BOX);
        let effective = inherited(doc, id, b"CropBox")
            .and_then(|o| rectangle(doc, o))
            .unwrap_or(media_box);
        let rotation = inherited(doc, id, b"Rotate")
            .and_then(|o| resolve(doc, o).as_i64().ok())
            .unwrap_or(0);

        Self {
            doc,
            id,
            number,
            transform: PageTransform::new(effective, rotation),
            layout: OnceCell::new(),
        }
    }

    fn layout(&self) -> &PageLayout {
        self.layout.get_or_init(|| {
            let content = match self.doc.get_page_content(self.id) {
                Ok(content) => content,
                Err(e) => {
                    debug!(page = self.number, error = %e, "page content unreadable");
                    return PageLayout::default();
                }
            };
            let resources = inherited(self.doc, self.id, b"Resources")
                .and_then(|o| resolve_dict(self.doc, o));
            let events = Interpreter::new(self.doc, self.transform).run(&content, resources);
            PageLayout::from_events(events)
        })
    }
}

impl SourcePage for LopdfPage<'_> {
    fn number(&self) -> u32 {
        self.number
    }

    fn geometry(&self) -> PageGeometry {
        self.transform.geometry()
    }

    fn blocks(&self) -> Result<Vec<Block>, ReconstructError> {
        Ok(self.layout().blocks())
    }

    fn words(&self) -> Result<Vec<Word>, ReconstructError> {
        Ok(self.layout().words())
    }
}

/// Follow indirect references to the object they point at
pub(crate) fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    let mut current = object;
    // Bounded so reference cycles terminate
    for _ in 0..16 {
        match current {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(target) => current = target,
                Err(_) => return current,
            },
            _ => return current,
        }
    }
    current
}

pub(crate) fn resolve_dict<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    resolve(doc, object).as_dict().ok()
}

pub(crate) fn number(doc: &Document, object: &Object) -> Option<f64> {
    match resolve(doc, object) {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

/// Look up a page attribute, walking up the page tree through `/Parent`
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    for _ in 0..64 {
        if let Ok(value) = current.get(key) {
            return Some(value);
        }
        let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn rectangle(doc: &Document, object: &Object) -> Option<[f64; 4]> {
    let values = resolve(doc, object).as_array().ok()?;
    if values.len() != 4 {
        return None;
    }
    let mut rect = [0.0; 4];
    for (slot, value) in rect.iter_mut().zip(values) {
        *slot = number(doc, value)?;
    }
    let [x0, y0, x1, y1] = rect;
    ((x1 - x0).abs() > 0.0 && (y1 - y0).abs() > 0.0).then_some(rect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Stream, StringFormat};
    use pretty_assertions::assert_eq;

    fn text_ops(font: &str, size: i64, x: i64, y: i64, text: &str) -> Vec<Operation> {
        vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(font.as_bytes().to_vec()), size.into()]),
            Operation::new("Td", vec![x.into(), y.into()]),
            Operation::new(
                "Tj",
                vec![Object::String(text.as_bytes().to_vec(), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
        ]
    }

    /// One page per entry, each with its own operations, Helvetica as F1
    fn build_pdf(pages: Vec<(Vec<Operation>, Dictionary)>) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
        });

        let mut kids = Vec::new();
        for (operations, extra) in pages {
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
            let mut page = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            };
            for (key, value) in extra.iter() {
                page.set(key.clone(), value.clone());
            }
            kids.push(Object::Reference(doc.add_object(page)));
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

    #[test]
    fn test_open_missing_file() {
        let err = LopdfReader::open("/nonexistent/input.pdf").err().unwrap();
        assert!(matches!(err, ReconstructError::Open { .. }));
        assert!(err.to_string().contains("/nonexistent/input.pdf"));
    }

    #[test]
    fn test_open_garbage_bytes() {
        let result = LopdfReader::from_bytes("junk.pdf", b"definitely not a pdf");
        assert!(matches!(result, Err(ReconstructError::Open { .. })));
    }

    #[test]
    fn test_inherited_media_box() {
        let pdf = build_pdf(vec![(Vec::new(), Dictionary::new())]);
        let reader = LopdfReader::from_bytes("in.pdf", &pdf).unwrap();
        assert_eq!(reader.page_count(), 1);
        let page = reader.page(1).unwrap();
        assert_eq!(page.geometry(), PageGeometry::new(612.0, 792.0));
        assert!(page.blocks().unwrap().is_empty());
    }

    #[test]
    fn test_crop_box_and_rotation() {
        let extra = dictionary! {
            "CropBox" => vec![0.into(), 0.into(), 300.into(), 500.into()],
            "Rotate" => 90,
        };
        let pdf = build_pdf(vec![(Vec::new(), extra)]);
        let reader = LopdfReader::from_bytes("in.pdf", &pdf).unwrap();
        assert_eq!(reader.page(1).unwrap().geometry(), PageGeometry::new(500.0, 300.0));
    }

    #[test]
    fn test_span_origin_in_page_space() {
        let pdf = build_pdf(vec![(text_ops("F1", 12, 72, 700, "Hello"), Dictionary::new())]);
        let reader = LopdfReader::from_bytes("in.pdf", &pdf).unwrap();
        let blocks = reader.page(1).unwrap().blocks().unwrap();

        assert_eq!(blocks.len(), 1);
        let span = &blocks[0].lines[0].spans[0];
        assert_eq!(span.text, "Hello");
        assert_eq!(span.font, "Helvetica-Bold");
        assert_eq!(span.size, Some(12.0));
        let origin = span.origin.unwrap();
        assert_eq!((origin.x, origin.y), (72.0, 92.0));
    }

    #[test]
    fn test_words_from_same_pass() {
        let pdf = build_pdf(vec![(text_ops("F1", 10, 50, 742, "two words"), Dictionary::new())]);
        let reader = LopdfReader::from_bytes("in.pdf", &pdf).unwrap();
        let words = reader.page(1).unwrap().words().unwrap();
        let texts: Vec<&str> = words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["two", "words"]);
        assert_eq!(words[0].bbox.x0, 50.0);
        assert_eq!(words[0].bbox.y0, 42.0);
        assert_eq!(words[0].bbox.y1, 52.0);
    }

    #[test]
    fn test_page_out_of_range() {
        let pdf = build_pdf(vec![(Vec::new(), Dictionary::new())]);
        let reader = LopdfReader::from_bytes("in.pdf", &pdf).unwrap();
        assert!(reader.page(0).is_err());
        assert!(reader.page(2).is_err());
    }

    #[test]
    fn test_image_xobject_is_image_block() {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 1,
                "Height" => 1,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            vec![0],
        ));
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![100.into(), 0.into(), 0.into(), 100.into(), 0.into(), 0.into()],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 200.into(), 200.into()],
            "Contents" => content_id,
            "Resources" => dictionary! { "XObject" => dictionary! { "Im0" => image_id } },
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();

        let reader = LopdfReader::from_bytes("scan.pdf", &bytes).unwrap();
        let page = reader.page(1).unwrap();
        let blocks = page.blocks().unwrap();
        assert_eq!(blocks, vec![Block::image()]);
        assert!(page.words().unwrap().is_empty());
    }
}
