//! Reconstructed document: placements per destination page, saved with lopdf
//!
//! Pages only carry text drawn with base-14 fonts. Text that WinAnsi cannot
//! encode is drawn with a non-embedded Type0 font over the same face, whose
//! two-byte codes map back to Unicode through a shared ToUnicode CMap.
//! Invisible placements use text render mode 3 so they remain selectable and
//! searchable.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::config::OutputSettings;
use crate::coords::page_to_user_y;
use crate::error::ReconstructError;
use crate::fonts::StandardFont;
use crate::model::{char_total, Anchor, PageGeometry, Placement, Point, Rect, Visibility};

/// Baseline offset below a box's top edge, as a fraction of the font size
pub const BOX_ASCENT: f64 = 0.8;

/// Render mode 3: neither fill nor stroke
const RENDER_INVISIBLE: i64 = 3;
const RENDER_FILL: i64 = 0;

/// `bfchar` entries per CMap section
const CMAP_SECTION_LEN: usize = 100;
/// Uniform advance of the Type0 fonts, in glyph units
const UNICODE_ADVANCE: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    pub compress: bool,
    pub clean: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            compress: true,
            clean: true,
        }
    }
}

impl From<&OutputSettings> for SaveOptions {
    fn from(settings: &OutputSettings) -> Self {
        Self {
            compress: settings.compress,
            clean: settings.clean,
        }
    }
}

/// Destination page: source geometry plus the text drawn on it
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPage {
    geometry: PageGeometry,
    placements: Vec<Placement>,
}

impl OutputPage {
    pub fn new(geometry: PageGeometry) -> Self {
        Self {
            geometry,
            placements: Vec::new(),
        }
    }

    pub fn geometry(&self) -> PageGeometry {
        self.geometry
    }

    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    pub fn char_count(&self) -> usize {
        char_total(&self.placements)
    }

    pub fn draw_text_at(
        &mut self,
        origin: Point,
        text: &str,
        font: StandardFont,
        size: f64,
        visibility: Visibility,
    ) {
        self.place(Placement {
            text: text.to_string(),
            anchor: Anchor::Baseline(origin),
            font,
            size,
            visibility,
        });
    }

    /// Single line, left-aligned inside `rect`; never wrapped or dropped
    pub fn draw_text_in_box(
        &mut self,
        rect: Rect,
        text: &str,
        font: StandardFont,
        size: f64,
        visibility: Visibility,
    ) {
        self.place(Placement {
            text: text.to_string(),
            anchor: Anchor::Boxed(rect),
            font,
            size,
            visibility,
        });
    }

    pub fn place(&mut self, placement: Placement) {
        self.placements.push(placement);
    }

    pub fn extend(&mut self, placements: impl IntoIterator<Item = Placement>) {
        self.placements.extend(placements);
    }

    fn fonts_used(&self) -> BTreeSet<FontResource> {
        self.placements.iter().map(FontResource::for_placement).collect()
    }

    fn content(&self, codes: &UnicodeCodes) -> Content {
        let mut operations = Vec::with_capacity(self.placements.len() * 7);
        for placement in &self.placements {
            let font = FontResource::for_placement(placement);
            let shown = match font {
                FontResource::Simple(_) => {
                    Object::String(encode_win_ansi(&placement.text), StringFormat::Literal)
                }
                FontResource::Unicode(_) => {
                    Object::String(codes.encode(&placement.text), StringFormat::Hexadecimal)
                }
            };
            let (x, y) = baseline(placement);
            let render = match placement.visibility {
                Visibility::Visible => RENDER_FILL,
                Visibility::Invisible => RENDER_INVISIBLE,
            };
            operations.extend([
                Operation::new("BT", vec![]),
                Operation::new(
                    "Tf",
                    vec![
                        Object::Name(font.name().into_bytes()),
                        Object::Real(placement.size as f32),
                    ],
                ),
                Operation::new("g", vec![Object::Integer(0)]),
                Operation::new("Tr", vec![Object::Integer(render)]),
                Operation::new(
                    "Tm",
                    vec![
                        Object::Integer(1),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(1),
                        Object::Real(x as f32),
                        Object::Real(page_to_user_y(y, self.geometry.height) as f32),
                    ],
                ),
                Operation::new("Tj", vec![shown]),
                Operation::new("ET", vec![]),
            ]);
        }
        Content { operations }
    }
}

/// Left end of the baseline in page space
fn baseline(placement: &Placement) -> (f64, f64) {
    match placement.anchor {
        Anchor::Baseline(origin) => (origin.x, origin.y),
        Anchor::Boxed(rect) => (rect.x0, rect.y0 + placement.size * BOX_ASCENT),
    }
}

/// Reconstructed document, one [`OutputPage`] per source page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputDocument {
    pages: Vec<OutputPage>,
}

impl OutputDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_page(&mut self, geometry: PageGeometry) -> &mut OutputPage {
        self.pages.push(OutputPage::new(geometry));
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    pub fn push_page(&mut self, page: OutputPage) {
        self.pages.push(page);
    }

    pub fn pages(&self) -> &[OutputPage] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn char_count(&self) -> usize {
        self.pages.iter().map(OutputPage::char_count).sum()
    }

    /// Build the lopdf document
    pub fn to_lopdf(&self) -> Result<Document, ReconstructError> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();

        let codes = UnicodeCodes::collect(
            self.pages
                .iter()
                .flat_map(|p| &p.placements)
                .filter(|p| !is_win_ansi(&p.text))
                .map(|p| p.text.as_str()),
        );
        let to_unicode_id = (!codes.is_empty())
            .then(|| doc.add_object(Stream::new(Dictionary::new(), codes.to_unicode_cmap())));

        let used: BTreeSet<FontResource> = self.pages.iter().flat_map(|p| p.fonts_used()).collect();
        let mut font_ids: BTreeMap<FontResource, ObjectId> = BTreeMap::new();
        for font in used {
            let dict = match font {
                FontResource::Simple(face) => font_dictionary(face),
                FontResource::Unicode(face) => unicode_font_dictionary(&mut doc, face, to_unicode_id),
            };
            font_ids.insert(font, doc.add_object(dict));
        }

        let mut kids = Vec::with_capacity(self.pages.len());
        for page in &self.pages {
            let mut fonts = Dictionary::new();
            for font in page.fonts_used() {
                if let Some(id) = font_ids.get(&font) {
                    fonts.set(font.name(), Object::Reference(*id));
                }
            }
            let content = page.content(&codes).encode()?;
            let content_id = doc.add_object(Stream::new(Dictionary::new(), content));
            let geometry = page.geometry();
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![
                    0.into(),
                    0.into(),
                    Object::Real(geometry.width as f32),
                    Object::Real(geometry.height as f32),
                ],
                "Contents" => content_id,
                "Resources" => dictionary! { "Font" => fonts },
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
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));
        Ok(doc)
    }

    pub fn to_bytes(&self, options: SaveOptions) -> Result<Vec<u8>, ReconstructError> {
        let mut doc = self.finish(options)?;
        let mut buffer = Vec::new();
        doc.save_to(&mut buffer)?;
        Ok(buffer)
    }

    /// Write to `path`; the file only appears once it is complete
    pub fn save(&self, path: &Path, options: SaveOptions) -> Result<(), ReconstructError> {
        let save_error = |reason: String| ReconstructError::Save {
            path: path.to_path_buf(),
            reason,
        };

        let mut doc = self.finish(options)?;
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(|e| save_error(e.to_string()))?;

        let mut file = NamedTempFile::new_in(parent).map_err(|e| save_error(e.to_string()))?;
        doc.save_to(&mut file).map_err(|e| save_error(e.to_string()))?;
        file.persist(path).map_err(|e| save_error(e.error.to_string()))?;

        debug!(path = %path.display(), pages = self.pages.len(), "saved document");
        Ok(())
    }

    fn finish(&self, options: SaveOptions) -> Result<Document, ReconstructError> {
        let mut doc = self.to_lopdf()?;
        if options.clean {
            doc.prune_objects();
            doc.renumber_objects();
        }
        if options.compress {
            doc.compress();
        }
        Ok(doc)
    }
}

fn font_dictionary(font: StandardFont) -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => font.base_font(),
        "Encoding" => "WinAnsiEncoding",
    }
}

/// Type0 font over `face`: Identity-H codes, no embedded program
fn unicode_font_dictionary(
    doc: &mut Document,
    face: StandardFont,
    to_unicode: Option<ObjectId>,
) -> Dictionary {
    let italic_angle = match face {
        StandardFont::Italic
        | StandardFont::BoldItalic
        | StandardFont::MonoItalic
        | StandardFont::MonoBoldItalic => -12,
        _ => 0,
    };
    let descriptor_id = doc.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => face.base_font(),
        "Flags" => 32,
        "FontBBox" => vec![(-166).into(), (-225).into(), 1000.into(), 931.into()],
        "ItalicAngle" => italic_angle,
        "Ascent" => 718,
        "Descent" => -207,
        "CapHeight" => 718,
        "StemV" => 88,
    });
    let cid_font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "CIDFontType2",
        "BaseFont" => face.base_font(),
        "CIDSystemInfo" => dictionary! {
            "Registry" => Object::string_literal("Adobe"),
            "Ordering" => Object::string_literal("Identity"),
            "Supplement" => 0,
        },
        "FontDescriptor" => descriptor_id,
        "DW" => UNICODE_ADVANCE,
        "CIDToGIDMap" => "Identity",
    });
    let mut font = dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => face.base_font(),
        "Encoding" => "Identity-H",
        "DescendantFonts" => vec![Object::Reference(cid_font_id)],
    };
    if let Some(id) = to_unicode {
        font.set("ToUnicode", id);
    }
    font
}

/// Font resource a placement is drawn with
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum FontResource {
    /// Base-14 font, WinAnsi single-byte codes
    Simple(StandardFont),
    /// Type0 font over the same face, two-byte codes from [`UnicodeCodes`]
    Unicode(StandardFont),
}

impl FontResource {
    fn for_placement(placement: &Placement) -> Self {
        if is_win_ansi(&placement.text) {
            FontResource::Simple(placement.font)
        } else {
            FontResource::Unicode(placement.font)
        }
    }

    fn name(self) -> String {
        match self {
            FontResource::Simple(face) => face.resource_name(),
            FontResource::Unicode(face) => format!("{}U", face.resource_name()),
        }
    }
}

/// Two-byte codes shared by every Type0 font of a document
///
/// Codes are handed out from 1 in order of first appearance. Code 0 has no
/// mapping and stands in for characters past the 16-bit code space.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct UnicodeCodes {
    codes: BTreeMap<char, u16>,
}

impl UnicodeCodes {
    fn collect<'a>(texts: impl IntoIterator<Item = &'a str>) -> Self {
        let mut codes = BTreeMap::new();
        for c in texts.into_iter().flat_map(str::chars).map(flatten_control) {
            if codes.contains_key(&c) {
                continue;
            }
            let Ok(code) = u16::try_from(codes.len() + 1) else {
                break;
            };
            codes.insert(c, code);
        }
        Self { codes }
    }

    fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    fn encode(&self, text: &str) -> Vec<u8> {
        text.chars()
            .map(flatten_control)
            .flat_map(|c| self.codes.get(&c).copied().unwrap_or(0).to_be_bytes())
            .collect()
    }

    fn to_unicode_cmap(&self) -> Vec<u8> {
        let mut entries: Vec<(u16, char)> = self.codes.iter().map(|(&c, &code)| (code, c)).collect();
        entries.sort_unstable();

        let mut cmap = String::from(
            "/CIDInit /ProcSet findresource begin\n\
             12 dict begin\n\
             begincmap\n\
             /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
             /CMapName /Adobe-Identity-UCS def\n\
             /CMapType 2 def\n\
             1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
        );
        for section in entries.chunks(CMAP_SECTION_LEN) {
            cmap.push_str(&format!("{} beginbfchar\n", section.len()));
            for (code, c) in section {
                let mut units = [0u16; 2];
                let target: String = c
                    .encode_utf16(&mut units)
                    .iter()
                    .map(|unit| format!("{:04X}", unit))
                    .collect();
                cmap.push_str(&format!("<{:04X}> <{}>\n", code, target));
            }
            cmap.push_str("endbfchar\n");
        }
        cmap.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
        cmap.into_bytes()
    }
}

fn flatten_control(c: char) -> char {
    match c {
        '\t' | '\n' | '\r' => ' ',
        other => other,
    }
}

/// Whether every character of `text` has a WinAnsi code
pub fn is_win_ansi(text: &str) -> bool {
    text.chars().all(|c| win_ansi_byte(c).is_some())
}

/// WinAnsi bytes for `text`; unmappable characters become `?`
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars().map(|c| win_ansi_byte(c).unwrap_or(b'?')).collect()
}

fn win_ansi_byte(c: char) -> Option<u8> {
    let byte = match c {
        '\t' | '\n' | '\r' => b' ',
        ' '..='~' => c as u8,
        '\u{a0}'..='\u{ff}' => c as u32 as u8,
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8a,
        '‹' => 0x8b,
        'Œ' => 0x8c,
        'Ž' => 0x8e,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201c}' => 0x93,
        '\u{201d}' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9a,
        '›' => 0x9b,
        'œ' => 0x9c,
        'ž' => 0x9e,
        'Ÿ' => 0x9f,
        _ => return None,
    };
    Some(byte)
}
