//! OCR tokens → invisible placements over a rasterized page
//!
//! The raster is assumed axis-aligned with the displayed page, so pixel
//! boxes map to page space through one scale factor per axis.

use tracing::debug;

use super::is_blank;
use crate::config::FontSizing;
use crate::coords::PixelScale;
use crate::fonts::StandardFont;
use crate::model::{Anchor, OcrToken, PageGeometry, Placement, Visibility};

/// Place confident OCR tokens as invisible, selectable text
///
/// Tokens are dropped when their text is blank, their confidence is not a
/// number or falls below `min_confidence`, or their scaled box is empty.
pub fn extract(
    tokens: Vec<OcrToken>,
    page: &PageGeometry,
    image_size: (u32, u32),
    min_confidence: i32,
    sizing: &FontSizing,
) -> Vec<Placement> {
    let Some(scale) = PixelScale::new(page, image_size.0, image_size.1) else {
        debug!(?image_size, "raster has a zero dimension, nothing to place");
        return Vec::new();
    };

    tokens
        .into_iter()
        .filter_map(|token| {
            if is_blank(&token.text) {
                return None;
            }
            match token.confidence.score() {
                Some(score) if score >= min_confidence => {}
                _ => return None,
            }
            let rect = scale.map(&token.bbox);
            if !(rect.width() > 0.0 && rect.height() > 0.0) {
                return None;
            }
            Some(Placement {
                size: sizing.clamp(rect.height() * sizing.ocr_size_factor),
                text: token.text,
                anchor: Anchor::Boxed(rect),
                font: StandardFont::Regular,
                visibility: Visibility::Invisible,
            })
        })
        .collect()
}
