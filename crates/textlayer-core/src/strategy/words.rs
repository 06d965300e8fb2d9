//! Word boxes → boxed placements

use tracing::debug;

use super::is_blank;
use crate::config::FontSizing;
use crate::fonts::StandardFont;
use crate::model::{Anchor, Placement, Visibility, Word};

/// Floor applied to box heights before deriving a size
const MIN_BOX_HEIGHT: f64 = 1.0;

/// Place every non-blank word left-aligned inside its box
///
/// Words are first put in reading order (top, then left) so the output does
/// not depend on the order the source reported them in.
pub fn extract(mut words: Vec<Word>, sizing: &FontSizing) -> Vec<Placement> {
    sort_reading_order(&mut words);

    words
        .into_iter()
        .filter_map(|word| {
            if is_blank(&word.text) {
                return None;
            }
            let raw_height = word.bbox.height();
            if !(raw_height.is_finite() && raw_height > 0.0) {
                debug!(text = %word.text, height = raw_height, "skipping degenerate word box");
                return None;
            }
            let height = raw_height.max(MIN_BOX_HEIGHT);
            Some(Placement {
                size: sizing.clamp(height * sizing.word_size_factor),
                text: word.text,
                anchor: Anchor::Boxed(word.bbox),
                font: StandardFont::Regular,
                visibility: Visibility::Visible,
            })
        })
        .collect()
}

/// Stable sort by top edge rounded to one decimal, then left edge
pub fn sort_reading_order(words: &mut [Word]) {
    words.sort_by(|a, b| {
        round_tenth(a.bbox.y0)
            .total_cmp(&round_tenth(b.bbox.y0))
            .then_with(|| a.bbox.x0.total_cmp(&b.bbox.x0))
    });
}

/// One decimal place, rounded on the exact binary value with ties to even
///
/// `0.25` is a true tie and goes to `0.2`; `0.35` is stored just below the
/// tie and goes to `0.3`.
fn round_tenth(value: f64) -> f64 {
    let floor = (value * 10.0).floor();
    // Single rounding, so the sign of the distance to the midpoint is exact
    let offset = value.mul_add(10.0, -(floor + 0.5));
    let tenths = if offset > 0.0 || (offset == 0.0 && floor % 2.0 != 0.0) {
        floor + 1.0
    } else {
        floor
    };
    tenths / 10.0
}
