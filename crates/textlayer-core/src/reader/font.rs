//! Font resources: glyph decoding, advances and vertical metrics

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object};

use super::cmap::ToUnicode;
use super::{number, resolve, resolve_dict};

const DEFAULT_SIMPLE_WIDTH: f64 = 500.0;
const DEFAULT_CID_WIDTH: f64 = 1000.0;
const DEFAULT_ASCENT: f64 = 0.8;
const DEFAULT_DESCENT: f64 = -0.2;

/// One decoded character code
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedChar {
    pub code: u32,
    /// Unicode text; empty when the code has no known mapping
    pub text: String,
    /// Single-byte code 32, which receives word spacing
    pub is_space_code: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FontInfo {
    /// BaseFont without any subset prefix
    pub name: String,
    /// Ascent and descent in text space units (1/1000 em scaled down)
    pub ascent: f64,
    pub descent: f64,
    two_byte: bool,
    first_char: u32,
    widths: Vec<f64>,
    cid_widths: HashMap<u32, f64>,
    default_width: f64,
    to_unicode: Option<ToUnicode>,
}

impl FontInfo {
    /// Stand-in for a font key with no resource behind it
    pub fn unknown() -> Self {
        Self {
            name: String::new(),
            ascent: DEFAULT_ASCENT,
            descent: DEFAULT_DESCENT,
            two_byte: false,
            first_char: 0,
            widths: Vec::new(),
            cid_widths: HashMap::new(),
            default_width: DEFAULT_SIMPLE_WIDTH,
            to_unicode: None,
        }
    }

    pub fn from_dict(doc: &Document, dict: &Dictionary) -> Self {
        let mut font = Self::unknown();
        font.name = dict
            .get(b"BaseFont")
            .ok()
            .and_then(|o| resolve(doc, o).as_name().ok())
            .map(|name| strip_subset_prefix(&String::from_utf8_lossy(name)).to_string())
            .unwrap_or_default();

        font.to_unicode = dict
            .get(b"ToUnicode")
            .ok()
            .and_then(|o| resolve(doc, o).as_stream().ok())
            .map(|stream| {
                let data = stream
                    .decompressed_content()
                    .unwrap_or_else(|_| stream.content.clone());
                ToUnicode::parse(&data)
            })
            .filter(|cmap| !cmap.is_empty());

        let subtype = dict
            .get(b"Subtype")
            .ok()
            .and_then(|o| o.as_name().ok())
            .unwrap_or_default();

        let descriptor_owner = if subtype == b"Type0" {
            font.two_byte = true;
            font.default_width = DEFAULT_CID_WIDTH;
            let descendant = dict
                .get(b"DescendantFonts")
                .ok()
                .and_then(|o| resolve(doc, o).as_array().ok())
                .and_then(|fonts| fonts.first())
                .and_then(|o| resolve(doc, o).as_dict().ok());
            if let Some(descendant) = descendant {
                if let Some(dw) = descendant.get(b"DW").ok().and_then(|o| number(doc, o)) {
                    font.default_width = dw;
                }
                if let Some(w) = descendant.get(b"W").ok().and_then(|o| resolve(doc, o).as_array().ok()) {
                    font.cid_widths = parse_cid_widths(doc, w);
                }
            }
            descendant
        } else {
            font.first_char = dict
                .get(b"FirstChar")
                .ok()
                .and_then(|o| number(doc, o))
                .map(|n| n.max(0.0) as u32)
                .unwrap_or(0);
            font.widths = dict
                .get(b"Widths")
                .ok()
                .and_then(|o| resolve(doc, o).as_array().ok())
                .map(|widths| {
                    widths
                        .iter()
                        .map(|w| number(doc, w).unwrap_or(DEFAULT_SIMPLE_WIDTH))
                        .collect()
                })
                .unwrap_or_default();
            Some(dict)
        };

        if let Some(descriptor) = descriptor_owner
            .and_then(|owner| owner.get(b"FontDescriptor").ok())
            .and_then(|o| resolve_dict(doc, o))
        {
            let metric = |key: &[u8]| descriptor.get(key).ok().and_then(|o| number(doc, o));
            if let Some(ascent) = metric(b"Ascent").filter(|a| *a > 0.0) {
                font.ascent = ascent / 1000.0;
            }
            if let Some(descent) = metric(b"Descent").filter(|d| *d < 0.0) {
                font.descent = descent / 1000.0;
            }
        }
        font
    }

    pub fn is_two_byte(&self) -> bool {
        self.two_byte
    }

    /// Split a shown string into character codes with their text
    ///
    /// Two-byte codes without a ToUnicode entry decode to empty text, since
    /// CIDs carry no meaning on their own. Single-byte codes fall back to
    /// Latin-1.
    pub fn decode(&self, bytes: &[u8]) -> Vec<DecodedChar> {
        if self.two_byte {
            bytes
                .chunks(2)
                .map(|pair| {
                    let code = pair.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b));
                    DecodedChar {
                        code,
                        text: self.mapped(code).unwrap_or_default(),
                        is_space_code: false,
                    }
                })
                .collect()
        } else {
            bytes
                .iter()
                .map(|&b| {
                    let code = u32::from(b);
                    DecodedChar {
                        code,
                        text: self
                            .mapped(code)
                            .unwrap_or_else(|| (b as char).to_string()),
                        is_space_code: b == b' ',
                    }
                })
                .collect()
        }
    }

    fn mapped(&self, code: u32) -> Option<String> {
        self.to_unicode
            .as_ref()
            .and_then(|cmap| cmap.get(code))
            .map(str::to_string)
    }

    /// Horizontal advance of `code` in em
    pub fn width(&self, code: u32) -> f64 {
        let glyph_units = if self.two_byte {
            self.cid_widths.get(&code).copied()
        } else {
            code.checked_sub(self.first_char)
                .and_then(|i| self.widths.get(i as usize).copied())
        };
        glyph_units.unwrap_or(self.default_width) / 1000.0
    }
}

/// `/W` array: `c [w1 w2 ...]` or `c_first c_last w`
fn parse_cid_widths(doc: &Document, w: &[Object]) -> HashMap<u32, f64> {
    let mut widths = HashMap::new();
    let mut i = 0;
    while i < w.len() {
        let Some(first) = number(doc, &w[i]).map(|n| n as u32) else {
            break;
        };
        match w.get(i + 1).map(|o| resolve(doc, o)) {
            Some(Object::Array(list)) => {
                for (offset, value) in list.iter().enumerate() {
                    if let Some(width) = number(doc, value) {
                        widths.insert(first + offset as u32, width);
                    }
                }
                i += 2;
            }
            Some(last) => {
                let last = number(doc, last).map(|n| n as u32);
                let width = w.get(i + 2).and_then(|o| number(doc, o));
                match (last, width) {
                    (Some(last), Some(width)) if last >= first && last - first <= 0xFFFF => {
                        for code in first..=last {
                            widths.insert(code, width);
                        }
                    }
                    _ => break,
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}

/// `ABCDEF+Arial-BoldMT` → `Arial-BoldMT`
pub fn strip_subset_prefix(name: &str) -> &str {
    match name.split_once('+') {
        Some((tag, rest)) if tag.len() == 6 && tag.bytes().all(|b| b.is_ascii_uppercase()) => rest,
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_strip_subset_prefix() {
        assert_eq!(strip_subset_prefix("ABCDEF+Arial-BoldMT"), "Arial-BoldMT");
        assert_eq!(strip_subset_prefix("Arial+Thing"), "Arial+Thing");
        assert_eq!(strip_subset_prefix("Courier"), "Courier");
    }

    #[test]
    fn test_simple_font_widths_and_latin1() {
        let doc = Document::with_version("1.7");
        let dict = dictionary! {
            "Type" => "Font",
            "Subtype" => "TrueType",
            "BaseFont" => "QWERTY+Georgia-Italic",
            "FirstChar" => 65,
            "Widths" => vec![600.into(), 700.into()],
        };
        let font = FontInfo::from_dict(&doc, &dict);
        assert_eq!(font.name, "Georgia-Italic");
        assert_eq!(font.width(65), 0.6);
        assert_eq!(font.width(66), 0.7);
        assert_eq!(font.width(67), 0.5);

        let decoded = font.decode(b"A \xe9");
        let text: String = decoded.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(text, "A é");
        assert!(decoded[1].is_space_code);
    }

    #[test]
    fn test_type0_without_cmap_decodes_empty() {
        let doc = Document::with_version("1.7");
        let dict = dictionary! {
            "Subtype" => "Type0",
            "BaseFont" => "Malgun",
            "DescendantFonts" => vec![Object::Dictionary(dictionary! {
                "Subtype" => "CIDFontType2",
                "DW" => 900,
                "W" => vec![
                    3.into(), Object::Array(vec![250.into(), 260.into()]),
                    10.into(), 12.into(), 400.into(),
                ],
            })],
        };
        let font = FontInfo::from_dict(&doc, &dict);
        assert!(font.is_two_byte());
        let decoded = font.decode(&[0x00, 0x03, 0x00, 0x0b]);
        assert_eq!(decoded.len(), 2);
        assert!(decoded.iter().all(|c| c.text.is_empty()));
        assert_eq!(font.width(3), 0.25);
        assert_eq!(font.width(4), 0.26);
        assert_eq!(font.width(11), 0.4);
        assert_eq!(font.width(99), 0.9);
    }

    #[test]
    fn test_to_unicode_and_descriptor() {
        let mut doc = Document::with_version("1.7");
        let cmap_id = doc.add_object(Stream::new(
            Dictionary::new(),
            b"beginbfchar <0001> <D55C> endbfchar".to_vec(),
        ));
        let descriptor_id = doc.add_object(dictionary! {
            "Type" => "FontDescriptor",
            "Ascent" => 900,
            "Descent" => -300,
        });
        let dict = dictionary! {
            "Subtype" => "Type0",
            "BaseFont" => "Batang",
            "ToUnicode" => cmap_id,
            "DescendantFonts" => vec![Object::Dictionary(dictionary! {
                "FontDescriptor" => descriptor_id,
            })],
        };
        let font = FontInfo::from_dict(&doc, &dict);
        assert_eq!(font.decode(&[0x00, 0x01])[0].text, "한");
        assert_eq!(font.ascent, 0.9);
        assert_eq!(font.descent, -0.3);
    }

    #[test]
    fn test_unknown_font_defaults() {
        let font = FontInfo::unknown();
        assert_eq!(font.ascent, 0.8);
        assert_eq!(font.descent, -0.2);
        assert_eq!(font.width(32), 0.5);
    }
}
