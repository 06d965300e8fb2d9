//! Glyphs → blocks, lines, spans and words
//!
//! Grouping is geometric: glyphs sharing a baseline form a line, lines
//! close together form a block, and an image closes the current block.

use super::interpreter::{Event, Glyph};
use crate::model::{Block, Line, Point, Rect, Span, Word};

/// Baseline drift tolerated within one line, as a fraction of the size
const SAME_LINE: f64 = 0.5;
/// Vertical distance between baselines that starts a new block
const BLOCK_GAP: f64 = 2.0;
/// Horizontal gap that splits a span
const SPAN_GAP: f64 = 0.3;
/// Horizontal gap that splits a word
const WORD_GAP: f64 = 0.25;

#[derive(Debug, Default)]
struct TextLine {
    glyphs: Vec<Glyph>,
}

impl TextLine {
    fn baseline(&self) -> f64 {
        self.glyphs.first().map(|g| g.origin.y).unwrap_or_default()
    }

    fn size(&self) -> f64 {
        self.glyphs.iter().map(|g| g.size).fold(0.0, f64::max).max(1.0)
    }

    fn accepts(&self, glyph: &Glyph) -> bool {
        let Some(last) = self.glyphs.last() else {
            return true;
        };
        let tolerance = SAME_LINE * self.size().max(glyph.size);
        (glyph.origin.y - self.baseline()).abs() <= tolerance
            && glyph.origin.x >= last.end.x - self.size()
    }
}

#[derive(Debug)]
enum Region {
    Text(Vec<TextLine>),
    Image,
}

/// Page layout derived from one interpretation of the content stream
#[derive(Debug, Default)]
pub(crate) struct PageLayout {
    regions: Vec<Region>,
}

impl PageLayout {
    pub fn from_events(events: Vec<Event>) -> Self {
        let mut regions: Vec<Region> = Vec::new();
        let mut lines: Vec<TextLine> = Vec::new();
        let mut current = TextLine::default();

        for event in events {
            match event {
                Event::Image => {
                    flush_line(&mut current, &mut lines);
                    if !lines.is_empty() {
                        regions.push(Region::Text(std::mem::take(&mut lines)));
                    }
                    regions.push(Region::Image);
                }
                Event::Glyph(glyph) => {
                    if current.accepts(&glyph) {
                        current.glyphs.push(glyph);
                        continue;
                    }
                    flush_line(&mut current, &mut lines);
                    let starts_block = lines.last().is_some_and(|previous| {
                        let gap = (glyph.origin.y - previous.baseline()).abs();
                        gap > BLOCK_GAP * previous.size().max(glyph.size)
                    });
                    if starts_block {
                        regions.push(Region::Text(std::mem::take(&mut lines)));
                    }
                    current.glyphs.push(glyph);
                }
            }
        }
        flush_line(&mut current, &mut lines);
        if !lines.is_empty() {
            regions.push(Region::Text(lines));
        }

        Self { regions }
    }

    pub fn blocks(&self) -> Vec<Block> {
        self.regions
            .iter()
            .map(|region| match region {
                Region::Text(lines) => Block::text(
                    lines
                        .iter()
                        .map(|line| Line {
                            spans: spans(&line.glyphs),
                        })
                        .collect(),
                ),
                Region::Image => Block::image(),
            })
            .collect()
    }

    pub fn words(&self) -> Vec<Word> {
        let mut words = Vec::new();
        let text_regions = self.regions.iter().filter_map(|region| match region {
            Region::Text(lines) => Some(lines),
            _ => None,
        });
        for (block_no, lines) in text_regions.enumerate() {
            for (line_no, line) in lines.iter().enumerate() {
                for (word_no, glyphs) in split_words(&line.glyphs).into_iter().enumerate() {
                    words.push(Word {
                        bbox: bounding_box(glyphs),
                        text: glyphs.iter().map(|g| g.text.as_str()).collect(),
                        block_no: block_no as u32,
                        line_no: line_no as u32,
                        word_no: word_no as u32,
                    });
                }
            }
        }
        words
    }
}

fn flush_line(current: &mut TextLine, lines: &mut Vec<TextLine>) {
    if !current.glyphs.is_empty() {
        lines.push(std::mem::take(current));
    }
}

fn same_style(a: &Glyph, b: &Glyph) -> bool {
    a.font.name == b.font.name && (a.size - b.size).abs() < 0.01
}

fn gap(previous: &Glyph, next: &Glyph) -> f64 {
    next.origin.x - previous.end.x
}

fn spans(glyphs: &[Glyph]) -> Vec<Span> {
    let mut spans: Vec<Span> = Vec::new();
    let mut previous: Option<&Glyph> = None;

    for glyph in glyphs {
        let continues = previous.is_some_and(|p| {
            same_style(p, glyph) && gap(p, glyph).abs() <= SPAN_GAP * glyph.size.max(1.0)
        });
        match spans.last_mut() {
            Some(span) if continues => span.text.push_str(&glyph.text),
            _ => spans.push(Span {
                text: glyph.text.clone(),
                origin: Some(Point::new(glyph.origin.x, glyph.origin.y)),
                size: Some(glyph.size),
                font: glyph.font.name.clone(),
            }),
        }
        previous = Some(glyph);
    }
    spans
}

fn split_words(glyphs: &[Glyph]) -> Vec<&[Glyph]> {
    let mut words = Vec::new();
    let mut start: Option<usize> = None;

    for (i, glyph) in glyphs.iter().enumerate() {
        if glyph.is_whitespace() {
            if let Some(s) = start.take() {
                words.push(&glyphs[s..i]);
            }
            continue;
        }
        match start {
            None => start = Some(i),
            Some(s) if gap(&glyphs[i - 1], glyph) > WORD_GAP * glyph.size.max(1.0) => {
                words.push(&glyphs[s..i]);
                start = Some(i);
            }
            Some(_) => {}
        }
    }
    if let Some(s) = start {
        words.push(&glyphs[s..]);
    }
    words
}

fn bounding_box(glyphs: &[Glyph]) -> Rect {
    let mut rect = Rect::new(f64::MAX, f64::MAX, f64::MIN, f64::MIN);
    for glyph in glyphs {
        rect.x0 = rect.x0.min(glyph.origin.x.min(glyph.end.x));
        rect.x1 = rect.x1.max(glyph.origin.x.max(glyph.end.x));
        rect.y0 = rect.y0.min(glyph.top());
        rect.y1 = rect.y1.max(glyph.bottom());
    }
    rect
}
