//! PDF Merge algorithm
//!
//! Source documents are appended one after another into a fresh document.
//! Each source's objects are shifted past the destination's highest object
//! id, its pages are re-parented under the merged page tree, and attributes
//! the pages inherited from their old tree are copied onto the pages first.

use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, StringFormat};
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::error::PdfJoinError;
use crate::listing::list_pdfs;

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];
const MAX_TREE_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOptions {
    /// Include PDFs in subdirectories
    pub recursive: bool,
    /// One outline entry per source file, titled with its file stem
    pub bookmarks: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            recursive: false,
            bookmarks: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedFile {
    pub stem: String,
    pub pages: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    pub output: PathBuf,
    pub added: Vec<MergedFile>,
    pub skipped: Vec<SkippedFile>,
}

impl MergeReport {
    pub fn total_pages(&self) -> usize {
        self.added.iter().map(|f| f.pages).sum()
    }
}

/// Incrementally built merged document
pub struct Merger {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
    outline: Vec<(String, ObjectId)>,
}

impl Default for Merger {
    fn default() -> Self {
        Self::new()
    }
}

impl Merger {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
            outline: Vec::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Append every page of `source`, returning how many were added
    ///
    /// With a `title`, an outline entry pointing at the first appended page
    /// is recorded. A source without pages adds nothing.
    pub fn append(&mut self, mut source: Document, title: Option<&str>) -> usize {
        let page_ids: Vec<ObjectId> = source.get_pages().into_values().collect();
        let Some(&first) = page_ids.first() else {
            return 0;
        };
        for &page_id in &page_ids {
            push_down_inherited(&mut source, page_id);
        }

        let offset = self.doc.max_id;
        for (id, object) in std::mem::take(&mut source.objects) {
            self.doc.objects.insert(shift(id, offset), remap_object_refs(object, offset));
        }
        self.doc.max_id = self.doc.max_id.max(source.max_id + offset);

        for page_id in &page_ids {
            let page_id = shift(*page_id, offset);
            if let Ok(page) = self.doc.get_dictionary_mut(page_id) {
                page.set("Parent", self.pages_id);
            }
            self.kids.push(page_id);
        }
        if let Some(title) = title {
            self.outline.push((title.to_string(), shift(first, offset)));
        }
        page_ids.len()
    }

    /// Close the page tree, attach the outline and compact the result
    pub fn finish(mut self) -> Result<Document, PdfJoinError> {
        if self.kids.is_empty() {
            return Err(PdfJoinError::NothingMerged);
        }

        let kids: Vec<Object> = self.kids.iter().map(|&id| Object::Reference(id)).collect();
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => self.kids.len() as i64,
            }),
        );

        let mut catalog = dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        };
        if !self.outline.is_empty() {
            let outlines_id = build_outline(&mut self.doc, &self.outline);
            catalog.set("Outlines", outlines_id);
            catalog.set("PageMode", "UseOutlines");
        }
        let catalog_id = self.doc.add_object(catalog);
        self.doc.trailer = Dictionary::new();
        self.doc.trailer.set("Root", catalog_id);

        self.doc.prune_objects();
        self.doc.renumber_objects();
        self.doc.compress();
        Ok(self.doc)
    }
}

/// Merge PDFs held in memory, in order
pub fn merge_documents(documents: Vec<Vec<u8>>) -> Result<Vec<u8>, PdfJoinError> {
    let mut merger = Merger::new();
    for bytes in &documents {
        let mut doc = Document::load_mem(bytes)?;
        if doc.is_encrypted() {
            doc.decrypt("")?;
        }
        merger.append(doc, None);
    }
    let mut merged = merger.finish()?;

    let mut buffer = Vec::new();
    merged.save_to(&mut buffer)?;
    Ok(buffer)
}

/// Merge every PDF in `dir` into `output`
///
/// Encrypted files that do not open with the empty password, unreadable
/// files and files without pages are skipped and listed in the report.
pub fn merge_directory(
    dir: &Path,
    output: &Path,
    options: &MergeOptions,
) -> Result<MergeReport, PdfJoinError> {
    if !dir.is_dir() {
        return Err(PdfJoinError::InputNotFound(dir.to_path_buf()));
    }

    let output_abs = fs::canonicalize(output).ok();
    let files: Vec<PathBuf> = list_pdfs(dir, options.recursive)?
        .into_iter()
        .filter(|path| output_abs.is_none() || fs::canonicalize(path).ok() != output_abs)
        .collect();
    if files.is_empty() {
        return Err(PdfJoinError::NoInputs(dir.to_path_buf()));
    }

    let mut merger = Merger::new();
    let mut added = Vec::new();
    let mut skipped = Vec::new();

    for path in files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.clone());

        let doc = match load_source(&path) {
            Ok(doc) => doc,
            Err(reason) => {
                warn!(file = %name, %reason, "skipping");
                skipped.push(SkippedFile { name, reason });
                continue;
            }
        };

        let title = options.bookmarks.then_some(stem.as_str());
        match merger.append(doc, title) {
            0 => {
                warn!(file = %name, "skipping document without pages");
                skipped.push(SkippedFile {
                    name,
                    reason: "no pages".into(),
                });
            }
            pages => {
                info!(file = %stem, pages, "added");
                added.push(MergedFile { stem, pages });
            }
        }
    }

    let merged = merger.finish()?;
    save_atomic(merged, output)?;

    let report = MergeReport {
        output: output.to_path_buf(),
        added,
        skipped,
    };
    info!(
        output = %output.display(),
        files = report.added.len(),
        pages = report.total_pages(),
        "merged"
    );
    Ok(report)
}

/// Write `doc` next to `output` and move it into place once complete
fn save_atomic(mut doc: Document, output: &Path) -> Result<(), PdfJoinError> {
    let parent = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut writer = BufWriter::new(NamedTempFile::new_in(parent)?);
    doc.save_to(&mut writer)?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.persist(output).map_err(|e| e.error)?;
    Ok(())
}

fn load_source(path: &Path) -> Result<Document, String> {
    let mut doc = Document::load(path).map_err(|e| e.to_string())?;
    if doc.is_encrypted() {
        doc.decrypt("")
            .map_err(|_| "Encrypted (no empty password)".to_string())?;
    }
    Ok(doc)
}

fn shift(id: ObjectId, offset: u32) -> ObjectId {
    (id.0 + offset, id.1)
}

/// Recursively remap object references in an object
fn remap_object_refs(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference(shift(id, offset)),
        Object::Array(arr) => Object::Array(
            arr.into_iter()
                .map(|o| remap_object_refs(o, offset))
                .collect(),
        ),
        Object::Dictionary(dict) => Object::Dictionary(remap_dict(dict, offset)),
        Object::Stream(mut stream) => {
            stream.dict = remap_dict(stream.dict, offset);
            Object::Stream(stream)
        }
        other => other,
    }
}

fn remap_dict(mut dict: Dictionary, offset: u32) -> Dictionary {
    for (_, value) in dict.iter_mut() {
        let original = std::mem::replace(value, Object::Null);
        *value = remap_object_refs(original, offset);
    }
    dict
}

/// Copy inherited attributes onto the page so it survives re-parenting
fn push_down_inherited(doc: &mut Document, page_id: ObjectId) {
    for key in INHERITABLE {
        let present = doc
            .get_dictionary(page_id)
            .map(|page| page.has(key))
            .unwrap_or(true);
        if present {
            continue;
        }
        if let Some(value) = inherited(doc, page_id, key) {
            if let Ok(page) = doc.get_dictionary_mut(page_id) {
                page.set(key, value);
            }
        }
    }
}

fn inherited(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        node = doc.get_dictionary(parent).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
    }
    None
}

/// Flat outline, one item per entry, in order
fn build_outline(doc: &mut Document, entries: &[(String, ObjectId)]) -> ObjectId {
    let outlines_id = doc.new_object_id();
    let item_ids: Vec<ObjectId> = entries.iter().map(|_| doc.new_object_id()).collect();

    for (i, ((title, page_id), item_id)) in entries.iter().zip(&item_ids).enumerate() {
        let mut item = dictionary! {
            "Title" => outline_title(title),
            "Parent" => outlines_id,
            "Dest" => vec![Object::Reference(*page_id), "Fit".into()],
        };
        if let Some(prev) = i.checked_sub(1).map(|p| item_ids[p]) {
            item.set("Prev", prev);
        }
        if let Some(&next) = item_ids.get(i + 1) {
            item.set("Next", next);
        }
        doc.objects.insert(*item_id, Object::Dictionary(item));
    }

    let mut outlines = dictionary! {
        "Type" => "Outlines",
        "Count" => item_ids.len() as i64,
    };
    if let (Some(&first), Some(&last)) = (item_ids.first(), item_ids.last()) {
        outlines.set("First", first);
        outlines.set("Last", last);
    }
    doc.objects.insert(outlines_id, Object::Dictionary(outlines));
    outlines_id
}

/// Text string for an outline title: literal when ASCII, UTF-16BE otherwise
pub fn outline_title(title: &str) -> Object {
    if title.is_ascii() {
        return Object::String(title.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in title.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}
