//! Source font name → standard font classification
//!
//! Rebuilt pages only use PDF base-14 faces. The proportional family maps to
//! the Helvetica faces and the monospace family to the Courier faces.

use serde::{Deserialize, Serialize};

const BOLD_KEYWORDS: [&str; 3] = ["bold", "black", "heavy"];
const ITALIC_KEYWORDS: [&str; 3] = ["italic", "oblique", "it"];
const MONO_KEYWORDS: [&str; 3] = ["mono", "courier", "code"];

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum StandardFont {
    #[default]
    Regular,
    Bold,
    Italic,
    BoldItalic,
    Mono,
    MonoBold,
    MonoItalic,
    MonoBoldItalic,
}

impl StandardFont {
    pub const ALL: [StandardFont; 8] = [
        StandardFont::Regular,
        StandardFont::Bold,
        StandardFont::Italic,
        StandardFont::BoldItalic,
        StandardFont::Mono,
        StandardFont::MonoBold,
        StandardFont::MonoItalic,
        StandardFont::MonoBoldItalic,
    ];

    /// PDF BaseFont name of the base-14 face
    pub fn base_font(self) -> &'static str {
        match self {
            StandardFont::Regular => "Helvetica",
            StandardFont::Bold => "Helvetica-Bold",
            StandardFont::Italic => "Helvetica-Oblique",
            StandardFont::BoldItalic => "Helvetica-BoldOblique",
            StandardFont::Mono => "Courier",
            StandardFont::MonoBold => "Courier-Bold",
            StandardFont::MonoItalic => "Courier-Oblique",
            StandardFont::MonoBoldItalic => "Courier-BoldOblique",
        }
    }

    /// Resource key used in page `/Font` dictionaries (`F1`..`F8`)
    pub fn resource_name(self) -> String {
        let index = Self::ALL
            .iter()
            .position(|font| *font == self)
            .unwrap_or_default();
        format!("F{}", index + 1)
    }

    pub fn is_mono(self) -> bool {
        matches!(
            self,
            StandardFont::Mono
                | StandardFont::MonoBold
                | StandardFont::MonoItalic
                | StandardFont::MonoBoldItalic
        )
    }
}

/// Classify a raw source font name into one of the eight standard fonts
///
/// Keyword matching is substring based and case-insensitive, so subset
/// prefixes (`ABCDEF+`) and foundry suffixes (`MT`, `PS`) need no stripping.
pub fn classify_font(raw_name: &str) -> StandardFont {
    let name = raw_name.to_lowercase();
    let has_any = |keywords: &[&str]| keywords.iter().any(|k| name.contains(k));

    let is_bold = has_any(&BOLD_KEYWORDS);
    let is_italic = has_any(&ITALIC_KEYWORDS);
    let is_mono = has_any(&MONO_KEYWORDS);

    match (is_mono, is_bold, is_italic) {
        (true, true, true) => StandardFont::MonoBoldItalic,
        (true, true, false) => StandardFont::MonoBold,
        (true, false, true) => StandardFont::MonoItalic,
        (true, false, false) => StandardFont::Mono,
        (false, true, true) => StandardFont::BoldItalic,
        (false, true, false) => StandardFont::Bold,
        (false, false, true) => StandardFont::Italic,
        (false, false, false) => StandardFont::Regular,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_name_is_regular() {
        assert_eq!(classify_font(""), StandardFont::Regular);
    }

    #[test]
    fn test_unknown_name_is_regular() {
        assert_eq!(classify_font("g_d0_f1"), StandardFont::Regular);
        assert_eq!(classify_font("Helvetica"), StandardFont::Regular);
    }

    #[test]
    fn test_bold_keywords() {
        assert_eq!(classify_font("Arial-BoldMT"), StandardFont::Bold);
        assert_eq!(classify_font("SourceSans-Black"), StandardFont::Bold);
        assert_eq!(classify_font("Futura-Heavy"), StandardFont::Bold);
    }

    #[test]
    fn test_italic_keywords() {
        assert_eq!(classify_font("Times-Italic"), StandardFont::Italic);
        assert_eq!(classify_font("Helvetica-Oblique"), StandardFont::Italic);
        assert_eq!(classify_font("MinionPro-It"), StandardFont::Italic);
    }

    #[test]
    fn test_mono_variants() {
        assert_eq!(classify_font("CourierNewPSMT"), StandardFont::Mono);
        assert_eq!(classify_font("DejaVuSansMono-Bold"), StandardFont::MonoBold);
        assert_eq!(classify_font("SourceCodePro-It"), StandardFont::MonoItalic);
        assert_eq!(
            classify_font("Courier-BoldOblique"),
            StandardFont::MonoBoldItalic
        );
    }

    #[test]
    fn test_bold_italic_combination() {
        assert_eq!(
            classify_font("BCDEEE+Arial-BoldItalicMT"),
            StandardFont::BoldItalic
        );
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(classify_font("ARIAL-BOLD"), StandardFont::Bold);
        assert_eq!(classify_font("courier"), StandardFont::Mono);
    }

    #[test]
    fn test_it_substring_matches_inside_words() {
        // "it" is a plain substring test, so "Title" and "Digital" read as italic
        assert_eq!(classify_font("TitleFace"), StandardFont::Italic);
    }

    #[test]
    fn test_resource_names_are_distinct() {
        let names: std::collections::BTreeSet<String> =
            StandardFont::ALL.iter().map(|f| f.resource_name()).collect();
        assert_eq!(names.len(), 8);
        assert_eq!(StandardFont::Regular.resource_name(), "F1");
        assert_eq!(StandardFont::MonoBoldItalic.resource_name(), "F8");
    }

    #[test]
    fn test_base_fonts() {
        assert_eq!(StandardFont::Regular.base_font(), "Helvetica");
        assert_eq!(StandardFont::BoldItalic.base_font(), "Helvetica-BoldOblique");
        assert_eq!(StandardFont::Mono.base_font(), "Courier");
        assert!(StandardFont::MonoItalic.is_mono());
        assert!(!StandardFont::Bold.is_mono());
    }
}
