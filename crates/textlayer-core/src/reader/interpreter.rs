//! Content stream interpreter producing positioned glyphs
//!
//! Only the state that affects where text lands is tracked: the CTM stack,
//! the text state and the text matrices. Painting operators are ignored.

use std::collections::HashMap;
use std::rc::Rc;

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::debug;

use super::font::FontInfo;
use super::resolve_dict;
use crate::coords::PageTransform;
use crate::model::Point;

/// Nesting limit for form XObjects
const MAX_FORM_DEPTH: usize = 8;

/// TJ adjustment (thousandths of an em) treated as a word gap
const TJ_SPACE_THRESHOLD: f64 = -100.0;

/// Affine matrix `[a b c d e f]`, PDF row-vector convention
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Matrix([f64; 6]);

impl Matrix {
    pub const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Matrix([a, b, c, d, e, f])
    }

    pub fn translate(tx: f64, ty: f64) -> Self {
        Matrix([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    /// `self × other`: apply `self` first, then `other`
    pub fn then(&self, other: &Matrix) -> Matrix {
        let [a, b, c, d, e, f] = self.0;
        let [a2, b2, c2, d2, e2, f2] = other.0;
        Matrix([
            a * a2 + b * c2,
            a * b2 + b * d2,
            c * a2 + d * c2,
            c * b2 + d * d2,
            e * a2 + f * c2 + e2,
            e * b2 + f * d2 + f2,
        ])
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let [a, b, c, d, e, f] = self.0;
        (a * x + c * y + e, b * x + d * y + f)
    }

    /// Length of the transformed unit y vector
    pub fn vertical_scale(&self) -> f64 {
        let [_, _, c, d, _, _] = self.0;
        (c * c + d * d).sqrt()
    }

    fn from_operands(operands: &[Object]) -> Option<Matrix> {
        if operands.len() < 6 {
            return None;
        }
        let mut values = [0.0; 6];
        for (slot, operand) in values.iter_mut().zip(operands) {
            *slot = operand_f64(operand)?;
        }
        Some(Matrix(values))
    }
}

/// One shown character in page space
#[derive(Debug, Clone)]
pub(crate) struct Glyph {
    pub text: String,
    /// Baseline origin
    pub origin: Point,
    /// Baseline point after the advance
    pub end: Point,
    /// Rendered font size in points
    pub size: f64,
    pub font: Rc<FontInfo>,
}

impl Glyph {
    pub fn is_whitespace(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn top(&self) -> f64 {
        self.origin.y - self.font.ascent * self.size
    }

    pub fn bottom(&self) -> f64 {
        self.origin.y - self.font.descent * self.size
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Event {
    Glyph(Glyph),
    Image,
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    font: Rc<FontInfo>,
    size: f64,
    char_spacing: f64,
    word_spacing: f64,
    h_scale: f64,
    leading: f64,
    rise: f64,
}

impl GraphicsState {
    fn new(ctm: Matrix) -> Self {
        Self {
            ctm,
            font: Rc::new(FontInfo::unknown()),
            size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

pub(crate) struct Interpreter<'a> {
    doc: &'a Document,
    transform: PageTransform,
    fonts: HashMap<ObjectId, Rc<FontInfo>>,
    events: Vec<Event>,
}

impl<'a> Interpreter<'a> {
    pub fn new(doc: &'a Document, transform: PageTransform) -> Self {
        Self {
            doc,
            transform,
            fonts: HashMap::new(),
            events: Vec::new(),
        }
    }

    /// Interpret a page's content; undecodable content yields no events
    pub fn run(mut self, content: &[u8], resources: Option<&Dictionary>) -> Vec<Event> {
        self.execute(content, resources, GraphicsState::new(Matrix::IDENTITY), 0);
        self.events
    }

    fn execute(
        &mut self,
        content: &[u8],
        resources: Option<&Dictionary>,
        initial: GraphicsState,
        depth: usize,
    ) {
        let content = match Content::decode(content) {
            Ok(content) => content,
            Err(e) => {
                debug!(error = %e, "content stream could not be decoded");
                return;
            }
        };

        let mut state = initial;
        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut tm = Matrix::IDENTITY;
        let mut tlm = Matrix::IDENTITY;

        for op in &content.operations {
            let operands = op.operands.as_slice();
            match op.operator.as_str() {
                "q" => stack.push(state.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        state = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        state.ctm = m.then(&state.ctm);
                    }
                }
                "BT" => {
                    tm = Matrix::IDENTITY;
                    tlm = Matrix::IDENTITY;
                }
                "Tf" => {
                    if let (Some(name), Some(size)) = (
                        operands.first().and_then(|o| o.as_name().ok()),
                        operands.get(1).and_then(operand_f64),
                    ) {
                        state.font = self.font(resources, name);
                        state.size = size;
                    }
                }
                "Tc" => set_number(&mut state.char_spacing, operands),
                "Tw" => set_number(&mut state.word_spacing, operands),
                "TL" => set_number(&mut state.leading, operands),
                "Ts" => set_number(&mut state.rise, operands),
                "Tz" => {
                    if let Some(scale) = operands.first().and_then(operand_f64) {
                        state.h_scale = scale / 100.0;
                    }
                }
                "Td" | "TD" => {
                    if let (Some(tx), Some(ty)) = (
                        operands.first().and_then(operand_f64),
                        operands.get(1).and_then(operand_f64),
                    ) {
                        if op.operator == "TD" {
                            state.leading = -ty;
                        }
                        tlm = Matrix::translate(tx, ty).then(&tlm);
                        tm = tlm;
                    }
                }
                "Tm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        tlm = m;
                        tm = m;
                    }
                }
                "T*" => {
                    tlm = Matrix::translate(0.0, -state.leading).then(&tlm);
                    tm = tlm;
                }
                "Tj" => {
                    if let Some(bytes) = operands.first().and_then(string_bytes) {
                        self.show(bytes, &state, &mut tm);
                    }
                }
                "'" => {
                    tlm = Matrix::translate(0.0, -state.leading).then(&tlm);
                    tm = tlm;
                    if let Some(bytes) = operands.first().and_then(string_bytes) {
                        self.show(bytes, &state, &mut tm);
                    }
                }
                "\"" => {
                    if let (Some(aw), Some(ac)) = (
                        operands.first().and_then(operand_f64),
                        operands.get(1).and_then(operand_f64),
                    ) {
                        state.word_spacing = aw;
                        state.char_spacing = ac;
                    }
                    tlm = Matrix::translate(0.0, -state.leading).then(&tlm);
                    tm = tlm;
                    if let Some(bytes) = operands.get(2).and_then(string_bytes) {
                        self.show(bytes, &state, &mut tm);
                    }
                }
                "TJ" => {
                    if let Some(items) = operands.first().and_then(|o| o.as_array().ok()) {
                        for item in items {
                            if let Some(bytes) = string_bytes(item) {
                                self.show(bytes, &state, &mut tm);
                            } else if let Some(adjust) = operand_f64(item) {
                                if adjust < TJ_SPACE_THRESHOLD {
                                    self.push_gap(&state, &tm);
                                }
                                let tx = -adjust / 1000.0 * state.size * state.h_scale;
                                tm = Matrix::translate(tx, 0.0).then(&tm);
                            }
                        }
                    }
                }
                "Do" => {
                    if let Some(name) = operands.first().and_then(|o| o.as_name().ok()) {
                        self.draw_xobject(resources, name, &state, depth);
                    }
                }
                "BI" => self.events.push(Event::Image),
                _ => {}
            }
        }
    }

    fn font(&mut self, resources: Option<&Dictionary>, key: &[u8]) -> Rc<FontInfo> {
        let entry = resources
            .and_then(|r| r.get(b"Font").ok())
            .and_then(|fonts| resolve_dict(self.doc, fonts))
            .and_then(|fonts| fonts.get(key).ok());

        match entry {
            Some(Object::Reference(id)) => {
                if let Some(font) = self.fonts.get(id) {
                    return Rc::clone(font);
                }
                let font = Rc::new(
                    self.doc
                        .get_dictionary(*id)
                        .map(|dict| FontInfo::from_dict(self.doc, dict))
                        .unwrap_or_else(|_| FontInfo::unknown()),
                );
                self.fonts.insert(*id, Rc::clone(&font));
                font
            }
            Some(Object::Dictionary(dict)) => Rc::new(FontInfo::from_dict(self.doc, dict)),
            _ => {
                debug!(font = %String::from_utf8_lossy(key), "font resource not found");
                Rc::new(FontInfo::unknown())
            }
        }
    }

    fn show(&mut self, bytes: &[u8], state: &GraphicsState, tm: &mut Matrix) {
        for ch in state.font.decode(bytes) {
            let word_spacing = if ch.is_space_code {
                state.word_spacing
            } else {
                0.0
            };
            let advance = (state.font.width(ch.code) * state.size + state.char_spacing + word_spacing)
                * state.h_scale;

            if !ch.text.is_empty() {
                let rendering = tm.then(&state.ctm);
                let glyph = Glyph {
                    text: ch.text,
                    origin: self.page_point(&rendering, 0.0, state.rise),
                    end: self.page_point(&rendering, advance, state.rise),
                    size: state.size.abs() * rendering.vertical_scale(),
                    font: Rc::clone(&state.font),
                };
                self.events.push(Event::Glyph(glyph));
            }
            *tm = Matrix::translate(advance, 0.0).then(tm);
        }
    }

    /// Synthetic space for a wide TJ adjustment
    fn push_gap(&mut self, state: &GraphicsState, tm: &Matrix) {
        let rendering = tm.then(&state.ctm);
        let origin = self.page_point(&rendering, 0.0, state.rise);
        self.events.push(Event::Glyph(Glyph {
            text: " ".to_string(),
            origin,
            end: origin,
            size: state.size.abs() * rendering.vertical_scale(),
            font: Rc::clone(&state.font),
        }));
    }

    fn page_point(&self, rendering: &Matrix, x: f64, y: f64) -> Point {
        let (ux, uy) = rendering.apply(x, y);
        self.transform.to_page(ux, uy)
    }

    fn draw_xobject(
        &mut self,
        resources: Option<&Dictionary>,
        name: &[u8],
        state: &GraphicsState,
        depth: usize,
    ) {
        let stream = resources
            .and_then(|r| r.get(b"XObject").ok())
            .and_then(|x| resolve_dict(self.doc, x))
            .and_then(|x| x.get(name).ok())
            .and_then(|o| match o {
                Object::Reference(id) => self.doc.get_object(*id).ok(),
                other => Some(other),
            })
            .and_then(|o| o.as_stream().ok());
        let Some(stream) = stream else {
            debug!(xobject = %String::from_utf8_lossy(name), "xobject not found");
            return;
        };

        let subtype = stream
            .dict
            .get(b"Subtype")
            .and_then(|o| o.as_name())
            .unwrap_or_default();
        match subtype {
            b"Image" => self.events.push(Event::Image),
            b"Form" if depth < MAX_FORM_DEPTH => {
                let content = stream
                    .decompressed_content()
                    .unwrap_or_else(|_| stream.content.clone());
                let matrix = stream
                    .dict
                    .get(b"Matrix")
                    .ok()
                    .and_then(|o| o.as_array().ok())
                    .and_then(|m| Matrix::from_operands(m))
                    .unwrap_or(Matrix::IDENTITY);
                let form_resources = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|o| resolve_dict(self.doc, o))
                    .or(resources);

                let mut form_state = state.clone();
                form_state.ctm = matrix.then(&state.ctm);
                self.execute(&content, form_resources, form_state, depth + 1);
            }
            b"Form" => debug!(depth, "form xobjects nested too deeply"),
            _ => {}
        }
    }
}

fn operand_f64(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

fn string_bytes(object: &Object) -> Option<&[u8]> {
    match object {
        Object::String(bytes, _) => Some(bytes),
        _ => None,
    }
}

fn set_number(slot: &mut f64, operands: &[Object]) {
    if let Some(value) = operands.first().and_then(operand_f64) {
        *slot = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_matrix_then_applies_left_first() {
        let scale = Matrix::new(2.0, 0.0, 0.0, 2.0, 0.0, 0.0);
        let shift = Matrix::translate(10.0, 5.0);
        assert_eq!(scale.then(&shift).apply(1.0, 1.0), (12.0, 7.0));
        assert_eq!(shift.then(&scale).apply(1.0, 1.0), (22.0, 12.0));
    }

    #[test]
    fn test_vertical_scale() {
        assert_eq!(Matrix::new(3.0, 0.0, 0.0, 4.0, 0.0, 0.0).vertical_scale(), 4.0);
        assert_eq!(Matrix::new(0.0, 1.0, -1.0, 0.0, 0.0, 0.0).vertical_scale(), 1.0);
    }

    #[test]
    fn test_matrix_from_short_operands() {
        assert!(Matrix::from_operands(&[Object::Integer(1)]).is_none());
    }
}
