//! Input discovery and ordering

use std::cmp::Ordering;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// One run of a file name: digits compare by value, everything else
/// case-insensitively
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPart {
    Text(String),
    Number(String),
}

impl KeyPart {
    fn number(digits: &str) -> Self {
        let trimmed = digits.trim_start_matches('0');
        KeyPart::Number(trimmed.to_string())
    }
}

impl Ord for KeyPart {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (KeyPart::Text(a), KeyPart::Text(b)) => a.cmp(b),
            // arbitrary-length digit runs: shorter (after stripping zeros) is smaller
            (KeyPart::Number(a), KeyPart::Number(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (KeyPart::Number(_), KeyPart::Text(_)) => Ordering::Less,
            (KeyPart::Text(_), KeyPart::Number(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for KeyPart {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Sort key for "natural" ordering: `ch2.pdf` before `ch10.pdf`
///
/// The key always starts with a text run (possibly empty) and alternates,
/// so two keys compare run by run of the same kind.
pub fn natural_key(name: &str) -> Vec<KeyPart> {
    let mut key = Vec::new();
    let mut text = String::new();
    let mut digits = String::new();

    for c in name.chars() {
        if c.is_ascii_digit() {
            if digits.is_empty() {
                key.push(KeyPart::Text(std::mem::take(&mut text)));
            }
            digits.push(c);
        } else {
            if !digits.is_empty() {
                key.push(KeyPart::number(&digits));
                digits.clear();
            }
            text.extend(c.to_lowercase());
        }
    }
    if digits.is_empty() {
        key.push(KeyPart::Text(text));
    } else {
        key.push(KeyPart::number(&digits));
        key.push(KeyPart::Text(String::new()));
    }
    key
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// PDF files in `dir` (and below, when `recursive`), in natural file-name order
pub fn list_pdfs(dir: &Path, recursive: bool) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect(dir, recursive, &mut files)?;
    files.sort_by_cached_key(|path| natural_key(&file_name(path)));
    Ok(files)
}

fn collect(dir: &Path, recursive: bool, files: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            if recursive {
                collect(&path, recursive, files)?;
            }
        } else if path.is_file() && is_pdf(&path) {
            files.push(path);
        }
    }
    Ok(())
}
