//! Word-level span extraction from a page's embedded text layer.
//!
//! Walks the content stream with a simplified text-rendering state machine,
//! tracks the current transformation matrix through `q`/`Q`/`cm` and Form
//! XObjects, and groups shown glyphs into words. A word ends at whitespace or
//! wherever the pen jumps away from where the previous glyph left it (a
//! kerning gap, a new `Td`, another text object elsewhere on the page).
//!
//! Glyph widths are approximated from the font size; drawings mostly carry
//! short labels and dimensions, and only the word center matters downstream.

use balloon_core::span::{PageSpans, SpanOrigin, TextSpan};

use super::backend::{
    decode_text_simple, get_number_from_value, LopdfBackend, PageBox, PageId, PdfBackend,
    PdfValue,
};
use crate::PdfError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Approximate character width as a fraction of font size when no better
/// metric is available.
const APPROX_CHAR_WIDTH_RATIO: f32 = 0.5;

/// Glyph extent above the baseline, as a fraction of font size.
const ASCENT_RATIO: f32 = 0.8;

/// Glyph extent below the baseline, as a fraction of font size.
const DESCENT_RATIO: f32 = 0.2;

/// A pen jump larger than this fraction of the font size starts a new word.
const WORD_GAP_RATIO: f32 = 0.15;

/// Nested Form XObjects deeper than this are ignored.
const MAX_FORM_DEPTH: usize = 8;

/// The identity 2x3 matrix: [a, b, c, d, e, f].
const IDENTITY_MATRIX: [f32; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

// ---------------------------------------------------------------------------
// Matrix helpers
// ---------------------------------------------------------------------------

/// `m1 x m2`: apply `m1` first, then `m2`.
fn multiply(m1: &[f32; 6], m2: &[f32; 6]) -> [f32; 6] {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}

fn transform(m: &[f32; 6], x: f32, y: f32) -> (f32, f32) {
    (m[0] * x + m[2] * y + m[4], m[1] * x + m[3] * y + m[5])
}

fn matrix_from_operands(operands: &[PdfValue]) -> Option<[f32; 6]> {
    if operands.len() < 6 {
        return None;
    }
    let vals: Vec<f32> = operands
        .iter()
        .take(6)
        .filter_map(get_number_from_value)
        .collect();
    (vals.len() == 6).then(|| [vals[0], vals[1], vals[2], vals[3], vals[4], vals[5]])
}

// ---------------------------------------------------------------------------
// Internal: PDF text-state machine
// ---------------------------------------------------------------------------

/// Mutable state tracked while walking a page's content stream.
#[derive(Debug, Clone)]
struct TextState {
    /// Current font resource name (the `/F1`-style key).
    font_key: Vec<u8>,
    font_size: f32,
    /// Elements [a, b, c, d, tx, ty] of the current text matrix.
    text_matrix: [f32; 6],
    /// Text line matrix, set by BT and updated by Td/TD/T*/Tm.
    line_matrix: [f32; 6],
    /// Horizontal scaling factor (percent / 100).
    horiz_scale: f32,
    char_spacing: f32,
    word_spacing: f32,
    text_rise: f32,
    leading: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font_key: Vec::new(),
            font_size: 0.0,
            text_matrix: IDENTITY_MATRIX,
            line_matrix: IDENTITY_MATRIX,
            horiz_scale: 1.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            text_rise: 0.0,
            leading: 0.0,
        }
    }
}

impl TextState {
    /// Advance the text matrix horizontally by `dx` text-space units.
    fn advance_x(&mut self, dx: f32) {
        self.text_matrix[4] += dx * self.text_matrix[0];
        self.text_matrix[5] += dx * self.text_matrix[1];
    }

    /// Multiply the text line matrix by a translation (used by Td / TD).
    fn translate_line(&mut self, tx: f32, ty: f32) {
        let new_tx = self.line_matrix[0] * tx + self.line_matrix[2] * ty + self.line_matrix[4];
        let new_ty = self.line_matrix[1] * tx + self.line_matrix[3] * ty + self.line_matrix[5];
        self.line_matrix[4] = new_tx;
        self.line_matrix[5] = new_ty;
        self.text_matrix = self.line_matrix;
    }

    fn glyph_width(&self) -> f32 {
        self.font_size * APPROX_CHAR_WIDTH_RATIO * self.horiz_scale
    }
}

/// A word being assembled, with its bounding box in user space.
#[derive(Debug, Default)]
struct WordBuilder {
    text: String,
    min_x: f32,
    min_y: f32,
    max_x: f32,
    max_y: f32,
    /// Where the next glyph of this word is expected to start.
    pen: Option<(f32, f32)>,
}

impl WordBuilder {
    fn push_glyph(&mut self, ch: char, corners: &[(f32, f32); 4], pen_after: (f32, f32)) {
        if self.text.is_empty() {
            self.min_x = f32::INFINITY;
            self.min_y = f32::INFINITY;
            self.max_x = f32::NEG_INFINITY;
            self.max_y = f32::NEG_INFINITY;
        }
        for &(x, y) in corners {
            self.min_x = self.min_x.min(x);
            self.min_y = self.min_y.min(y);
            self.max_x = self.max_x.max(x);
            self.max_y = self.max_y.max(y);
        }
        self.text.push(ch);
        self.pen = Some(pen_after);
    }

    /// Emit the pending word, if any, as a top-left-origin span.
    fn flush(&mut self, page_box: &PageBox, spans: &mut Vec<TextSpan>) {
        let text = std::mem::take(&mut self.text);
        self.pen = None;
        if text.is_empty() {
            return;
        }

        let (x0, y0) = page_box.to_top_left(self.min_x, self.max_y);
        let (x1, y1) = page_box.to_top_left(self.max_x, self.min_y);
        let finite = [x0, y0, x1, y1].iter().all(|v| v.is_finite());
        if !finite || x1 <= x0 || y1 <= y0 {
            log::debug!("skipping degenerate word {:?} at ({}, {})", text, x0, y0);
            return;
        }

        if let Some(span) = TextSpan::new(x0, y0, x1, y1, text) {
            spans.push(span);
        }
    }
}

/// Everything needed while walking one page, including nested forms.
struct PageWalker<'a> {
    backend: &'a dyn PdfBackend,
    page_id: PageId,
    page_box: PageBox,
    ctm: [f32; 6],
    ctm_stack: Vec<[f32; 6]>,
    state: TextState,
    word: WordBuilder,
    spans: Vec<TextSpan>,
}

impl<'a> PageWalker<'a> {
    fn new(backend: &'a dyn PdfBackend, page_id: PageId, page_box: PageBox) -> Self {
        Self {
            backend,
            page_id,
            page_box,
            ctm: IDENTITY_MATRIX,
            ctm_stack: Vec::new(),
            state: TextState::default(),
            word: WordBuilder::default(),
            spans: Vec::new(),
        }
    }

    fn flush_word(&mut self) {
        self.word.flush(&self.page_box, &mut self.spans);
    }

    /// Decode a string operand with the backend's font-aware decoder.
    fn decode_string(&self, val: &PdfValue) -> String {
        match val {
            PdfValue::Str(bytes) => {
                let decoded = self
                    .backend
                    .decode_text(self.page_id, &self.state.font_key, bytes);
                if decoded.is_empty() {
                    decode_text_simple(bytes)
                } else {
                    decoded
                }
            }
            _ => String::new(),
        }
    }

    /// Render the glyphs of `text` at the current pen position.
    fn show_text(&mut self, text: &str) {
        for ch in text.chars() {
            let glyph_w = self.state.glyph_width();
            let mut dx = glyph_w + self.state.char_spacing * self.state.horiz_scale;
            if ch == ' ' {
                dx += self.state.word_spacing * self.state.horiz_scale;
            }

            if ch.is_whitespace() || ch.is_control() {
                self.flush_word();
            } else {
                let render = multiply(&self.state.text_matrix, &self.ctm);
                let fs = self.state.font_size;
                let rise = self.state.text_rise;
                let bottom = rise - fs * DESCENT_RATIO;
                let top = rise + fs * ASCENT_RATIO;
                let corners = [
                    transform(&render, 0.0, bottom),
                    transform(&render, glyph_w, bottom),
                    transform(&render, glyph_w, top),
                    transform(&render, 0.0, top),
                ];
                let origin = transform(&render, 0.0, 0.0);

                if let Some((px, py)) = self.word.pen {
                    let size = (fs * (render[2].powi(2) + render[3].powi(2)).sqrt()).abs();
                    let jump = ((origin.0 - px).powi(2) + (origin.1 - py).powi(2)).sqrt();
                    if jump > size * WORD_GAP_RATIO {
                        self.flush_word();
                    }
                }

                let pen_after = transform(&render, dx, 0.0);
                self.word.push_glyph(ch, &corners, pen_after);
            }

            self.state.advance_x(dx);
        }
    }

    /// Process a `TJ` array: strings to render or numeric kerning
    /// adjustments in thousandths of a text-space unit.
    fn show_tj_array(&mut self, arr: &[PdfValue]) {
        for elem in arr {
            match elem {
                PdfValue::Str(_) => {
                    let fragment = self.decode_string(elem);
                    self.show_text(&fragment);
                }
                val => {
                    if let Some(adj) = get_number_from_value(val) {
                        let dx = -adj / 1000.0 * self.state.font_size * self.state.horiz_scale;
                        self.state.advance_x(dx);
                    }
                }
            }
        }
    }

    fn number(operands: &[PdfValue], index: usize) -> Option<f32> {
        operands.get(index).and_then(get_number_from_value)
    }

    /// Walk a decoded content stream. `depth` counts Form XObject nesting.
    fn walk(&mut self, content: &[u8], depth: usize) -> Result<(), PdfError> {
        let ops = self.backend.decode_content(content)?;

        for op in &ops {
            match op.operator.as_str() {
                // -- Graphics state ---------------------------------------
                "q" => self.ctm_stack.push(self.ctm),
                "Q" => {
                    if let Some(ctm) = self.ctm_stack.pop() {
                        self.ctm = ctm;
                    }
                }
                "cm" => {
                    if let Some(m) = matrix_from_operands(&op.operands) {
                        self.ctm = multiply(&m, &self.ctm);
                    }
                }
                "Do" => {
                    if let Some(PdfValue::Name(name)) = op.operands.first() {
                        self.draw_form(name, depth)?;
                    }
                }

                // -- Text object delimiters -------------------------------
                "BT" => {
                    self.state.text_matrix = IDENTITY_MATRIX;
                    self.state.line_matrix = IDENTITY_MATRIX;
                }
                "ET" => {}

                // -- Font -------------------------------------------------
                "Tf" => {
                    if let Some(PdfValue::Name(key)) = op.operands.first() {
                        self.state.font_key = key.clone();
                    }
                    if let Some(size) = Self::number(&op.operands, 1) {
                        self.state.font_size = size;
                    }
                }

                // -- Text matrix / position -------------------------------
                "Tm" => {
                    if let Some(m) = matrix_from_operands(&op.operands) {
                        self.state.text_matrix = m;
                        self.state.line_matrix = m;
                    }
                }
                "Td" => {
                    if op.operands.len() >= 2 {
                        let tx = Self::number(&op.operands, 0).unwrap_or(0.0);
                        let ty = Self::number(&op.operands, 1).unwrap_or(0.0);
                        self.state.translate_line(tx, ty);
                    }
                }
                "TD" => {
                    // TD is equivalent to: -ty TL ; tx ty Td
                    if op.operands.len() >= 2 {
                        let tx = Self::number(&op.operands, 0).unwrap_or(0.0);
                        let ty = Self::number(&op.operands, 1).unwrap_or(0.0);
                        self.state.leading = -ty;
                        self.state.translate_line(tx, ty);
                    }
                }
                "T*" => self.state.translate_line(0.0, -self.state.leading),
                "TL" => {
                    if let Some(v) = Self::number(&op.operands, 0) {
                        self.state.leading = v;
                    }
                }

                // -- Spacing / scaling ------------------------------------
                "Tc" => {
                    if let Some(v) = Self::number(&op.operands, 0) {
                        self.state.char_spacing = v;
                    }
                }
                "Tw" => {
                    if let Some(v) = Self::number(&op.operands, 0) {
                        self.state.word_spacing = v;
                    }
                }
                "Tz" => {
                    if let Some(v) = Self::number(&op.operands, 0) {
                        self.state.horiz_scale = v / 100.0;
                    }
                }
                "Ts" => {
                    if let Some(v) = Self::number(&op.operands, 0) {
                        self.state.text_rise = v;
                    }
                }

                // -- Show text --------------------------------------------
                "Tj" => {
                    if let Some(first) = op.operands.first() {
                        let text = self.decode_string(first);
                        self.show_text(&text);
                    }
                }
                "TJ" => {
                    if let Some(PdfValue::Array(arr)) = op.operands.first() {
                        self.show_tj_array(arr);
                    }
                }
                "'" => {
                    self.state.translate_line(0.0, -self.state.leading);
                    if let Some(first) = op.operands.first() {
                        let text = self.decode_string(first);
                        self.show_text(&text);
                    }
                }
                "\"" => {
                    // " aw ac string  =>  set Tw, Tc, T*, Tj
                    if op.operands.len() >= 3 {
                        if let Some(aw) = Self::number(&op.operands, 0) {
                            self.state.word_spacing = aw;
                        }
                        if let Some(ac) = Self::number(&op.operands, 1) {
                            self.state.char_spacing = ac;
                        }
                        self.state.translate_line(0.0, -self.state.leading);
                        let text = self.decode_string(&op.operands[2]);
                        self.show_text(&text);
                    }
                }

                _ => {}
            }
        }

        Ok(())
    }

    fn draw_form(&mut self, name: &[u8], depth: usize) -> Result<(), PdfError> {
        if depth >= MAX_FORM_DEPTH {
            log::debug!(
                "form XObject {} nested too deeply, skipping",
                String::from_utf8_lossy(name)
            );
            return Ok(());
        }
        let Some(form) = self.backend.form_xobject(self.page_id, name) else {
            return Ok(());
        };

        self.flush_word();
        let saved_ctm = self.ctm;
        let saved_stack = self.ctm_stack.len();
        self.ctm = multiply(&form.matrix, &self.ctm);

        let result = self.walk(&form.content, depth + 1);

        self.flush_word();
        self.ctm_stack.truncate(saved_stack);
        self.ctm = saved_ctm;
        result
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Extract word spans for a zero-based page index.
pub fn extract_page_words(backend: &dyn PdfBackend, page: usize) -> Result<PageSpans, PdfError> {
    let page_id = backend.page_id(page)?;
    let page_box = backend.page_box(page_id).map_err(|e| e.on_page(page))?;
    let content = backend
        .page_content(page_id)
        .map_err(|e| e.on_page(page))?;

    let mut walker = PageWalker::new(backend, page_id, page_box);
    walker.walk(&content, 0).map_err(|e| e.on_page(page))?;
    walker.flush_word();

    log::debug!("page {}: {} words from text layer", page, walker.spans.len());

    Ok(PageSpans {
        page_width: page_box.width(),
        page_height: page_box.height(),
        origin: SpanOrigin::TextLayer,
        spans: walker.spans,
    })
}

/// Reads word spans from the embedded text layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpanExtractor;

impl SpanExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Parse `bytes` and extract the spans of one zero-based page.
    ///
    /// The parsed document is dropped before returning, on success and on
    /// failure alike.
    pub fn page_spans(&self, bytes: &[u8], page: usize) -> Result<PageSpans, PdfError> {
        let backend = LopdfBackend::load_bytes(bytes)?;
        extract_page_words(&backend, page)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
