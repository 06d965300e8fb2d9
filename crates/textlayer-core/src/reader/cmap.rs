//! ToUnicode CMap parsing (`bfchar` and `bfrange` sections)

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

/// Largest `bfrange` expanded; wider ranges are malformed
const MAX_RANGE: u32 = 0xFFFF;

lazy_static! {
    static ref BFCHAR_SECTION: Regex = Regex::new(r"(?s)beginbfchar(.*?)endbfchar").unwrap();
    static ref BFRANGE_SECTION: Regex = Regex::new(r"(?s)beginbfrange(.*?)endbfrange").unwrap();
    static ref BFCHAR_ENTRY: Regex =
        Regex::new(r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]*)>").unwrap();
    static ref BFRANGE_ENTRY: Regex = Regex::new(
        r"(?s)<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]+)>\s*(?:<([0-9A-Fa-f]*)>|\[(.*?)\])"
    )
    .unwrap();
    static ref HEX_STRING: Regex = Regex::new(r"<([0-9A-Fa-f]*)>").unwrap();
}

/// Character code → Unicode text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToUnicode {
    map: HashMap<u32, String>,
}

impl ToUnicode {
    pub fn parse(data: &[u8]) -> Self {
        let source = String::from_utf8_lossy(data);
        let mut map = HashMap::new();

        for section in BFCHAR_SECTION.captures_iter(&source) {
            for entry in BFCHAR_ENTRY.captures_iter(&section[1]) {
                if let Some(code) = parse_code(&entry[1]) {
                    map.insert(code, utf16_hex(&entry[2]));
                }
            }
        }

        for section in BFRANGE_SECTION.captures_iter(&source) {
            for entry in BFRANGE_ENTRY.captures_iter(&section[1]) {
                let (Some(lo), Some(hi)) = (parse_code(&entry[1]), parse_code(&entry[2])) else {
                    continue;
                };
                if hi < lo || hi - lo > MAX_RANGE {
                    continue;
                }
                if let Some(start) = entry.get(3) {
                    let units = hex_units(start.as_str());
                    for (offset, code) in (lo..=hi).enumerate() {
                        map.insert(code, increment_last(&units, offset as u32));
                    }
                } else if let Some(list) = entry.get(4) {
                    let targets = HEX_STRING
                        .captures_iter(list.as_str())
                        .map(|c| utf16_hex(&c[1]));
                    for (code, text) in (lo..=hi).zip(targets) {
                        map.insert(code, text);
                    }
                }
            }
        }

        Self { map }
    }

    pub fn get(&self, code: u32) -> Option<&str> {
        self.map.get(&code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

fn parse_code(hex: &str) -> Option<u32> {
    if hex.len() > 8 {
        return None;
    }
    u32::from_str_radix(hex, 16).ok()
}

fn hex_units(hex: &str) -> Vec<u16> {
    hex.as_bytes()
        .chunks(4)
        .filter(|chunk| chunk.len() == 4)
        .filter_map(|chunk| std::str::from_utf8(chunk).ok())
        .filter_map(|chunk| u16::from_str_radix(chunk, 16).ok())
        .collect()
}

fn utf16_hex(hex: &str) -> String {
    String::from_utf16_lossy(&hex_units(hex))
}

fn increment_last(units: &[u16], offset: u32) -> String {
    let mut units = units.to_vec();
    if let Some(last) = units.last_mut() {
        *last = (u32::from(*last) + offset).min(u32::from(u16::MAX)) as u16;
    }
    String::from_utf16_lossy(&units)
}
