//! Structured spans → baseline-anchored placements

use tracing::debug;

use super::is_blank;
use crate::config::FontSizing;
use crate::fonts::classify_font;
use crate::model::{Anchor, Block, BlockKind, Placement, Point, Span, Visibility};

/// Redraw every usable span of the page at its original origin
///
/// Non-text blocks are ignored; spans with blank text or without a usable
/// origin are skipped. Order follows the source's block/line/span order.
pub fn extract(blocks: &[Block], sizing: &FontSizing) -> Vec<Placement> {
    blocks
        .iter()
        .filter(|block| block.kind == BlockKind::Text)
        .flat_map(|block| block.lines.iter())
        .flat_map(|line| line.spans.iter())
        .filter_map(|span| place_span(span, sizing))
        .collect()
}

fn place_span(span: &Span, sizing: &FontSizing) -> Option<Placement> {
    if is_blank(&span.text) {
        return None;
    }
    let origin = match usable_origin(span.origin) {
        Some(origin) => origin,
        None => {
            debug!(text = %span.text, "skipping span without a usable origin");
            return None;
        }
    };

    Some(Placement {
        text: span.text.clone(),
        anchor: Anchor::Baseline(origin),
        font: classify_font(&span.font),
        size: span_size(span.size, sizing),
        visibility: Visibility::Visible,
    })
}

fn usable_origin(origin: Option<Point>) -> Option<Point> {
    origin.filter(Point::is_finite)
}

/// Reported size, or the default when it is missing, zero or not a number
fn span_size(size: Option<f64>, sizing: &FontSizing) -> f64 {
    match size {
        Some(size) if size.is_finite() && size != 0.0 => size,
        _ => sizing.default_span_size,
    }
}
