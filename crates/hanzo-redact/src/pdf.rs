//! PDF canvas
//!
//! Text runs are recovered by interpreting each page's content stream
//! (text and graphics matrices, font size, spacing). Glyph widths are
//! approximated as half the font size since no font metrics are loaded.
//!
//! On finish, every page that received a fill gets one new content stream:
//! the original operators (with text runs under a redaction box removed),
//! wrapped in `q`/`Q`, followed by the filled rectangles.

use crate::config::RenderConfig;
use crate::error::Result;
use crate::locate::{RedactionCanvas, TextFragment};
use hanzo_pii::{BoundingBox, DocumentField};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashMap;
use std::fmt::Write as _;

/// Average glyph advance as a fraction of the font size
const GLYPH_WIDTH: f32 = 0.5;
const ASCENT: f32 = 0.8;
const DESCENT: f32 = 0.2;

/// TJ adjustment (thousandths of an em) treated as a word gap
const WORD_GAP: f32 = 200.0;

/// US Letter, used when no MediaBox can be found
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// A PDF opened for redaction
pub struct PdfCanvas {
    doc: Document,
    pages: Vec<PdfPage>,
    fill_color: [u8; 3],
    strip_text: bool,
}

struct PdfPage {
    id: ObjectId,
    geometry: PageGeometry,
    content: Vec<u8>,
    operations: Option<Vec<Operation>>,
    runs: Vec<TextRun>,
    fields: Vec<TextFragment>,
    regions: Vec<BoundingBox>,
}

#[derive(Debug, Clone)]
struct TextRun {
    op_index: usize,
    fragment: TextFragment,
    /// Advance in thousandths of text space units, for position-preserving removal
    advance: i64,
}

impl PdfCanvas {
    /// Parse a PDF and recover its text runs
    pub fn open(bytes: &[u8], config: &RenderConfig) -> Result<Self> {
        let doc = Document::load_mem(bytes)?;
        let mut pages = Vec::new();

        for (page_number, page_id) in doc.get_pages() {
            let geometry = PageGeometry::of(&doc, page_id);
            let content = doc.get_page_content(page_id).unwrap_or_else(|err| {
                tracing::warn!(page_number, error = %err, "unreadable page content");
                Vec::new()
            });
            let operations = match Content::decode(&content) {
                Ok(decoded) => Some(decoded.operations),
                Err(err) => {
                    tracing::warn!(page_number, error = %err, "content stream not decodable, text will not be stripped");
                    None
                }
            };
            let runs = operations
                .as_deref()
                .map(|ops| text_runs(ops, &geometry))
                .unwrap_or_default();

            pages.push(PdfPage {
                id: page_id,
                geometry,
                content,
                operations,
                runs,
                fields: Vec::new(),
                regions: Vec::new(),
            });
        }

        tracing::debug!(pages = pages.len(), "pdf opened");
        Ok(Self {
            doc,
            pages,
            fill_color: config.fill_color,
            strip_text: config.strip_text,
        })
    }

    /// Add OCR fields as extra searchable fragments
    pub fn with_fields(mut self, fields: &[DocumentField]) -> Self {
        for field in fields {
            match self.pages.get_mut(field.page_index) {
                Some(page) => page.fields.push(TextFragment::new(field.text.clone(), field.bbox)),
                None => tracing::debug!(page_index = field.page_index, "field beyond last page"),
            }
        }
        self
    }

    /// Native text runs as fields, for documents without OCR output
    pub fn document_fields(&self) -> Vec<DocumentField> {
        self.pages
            .iter()
            .enumerate()
            .flat_map(|(page_index, page)| {
                page.runs.iter().map(move |run| {
                    DocumentField::new(page_index, run.fragment.text.clone(), run.fragment.bbox)
                })
            })
            .collect()
    }

    /// Page size in points
    pub fn page_size(&self, page_index: usize) -> Option<(f32, f32)> {
        self.pages
            .get(page_index)
            .map(|page| (page.geometry.width(), page.geometry.height()))
    }

    /// Write the redacted document
    ///
    /// Replaced content streams are dropped from the output along with any
    /// other object no longer reachable from the trailer.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        let mut replaced = 0;
        for page in &self.pages {
            if page.regions.is_empty() {
                continue;
            }
            let content = page.redacted_content(self.strip_text, self.fill_color)?;
            let stream_id = self.doc.add_object(Stream::new(Dictionary::new(), content));
            let page_dict = self.doc.get_object_mut(page.id)?.as_dict_mut()?;
            page_dict.set("Contents", stream_id);
            replaced += 1;
        }

        if replaced > 0 {
            let pruned = self.doc.prune_objects();
            tracing::debug!(pages = replaced, pruned = pruned.len(), "unreferenced objects removed");
        }

        let mut bytes = Vec::new();
        self.doc.save_to(&mut bytes)?;
        Ok(bytes)
    }
}

impl RedactionCanvas for PdfCanvas {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// OCR fields in input order, then native runs
    ///
    /// Fields come first so occurrence ordinals counted over the field
    /// layout select the same hit here.
    fn fragments(&self, page_index: usize) -> Vec<TextFragment> {
        self.pages
            .get(page_index)
            .map(|page| {
                page.fields
                    .iter()
                    .cloned()
                    .chain(page.runs.iter().map(|run| run.fragment.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn fill(&mut self, page_index: usize, region: BoundingBox) {
        if let Some(page) = self.pages.get_mut(page_index) {
            page.regions.push(region);
        }
    }
}

impl PdfPage {
    fn redacted_content(&self, strip_text: bool, fill_color: [u8; 3]) -> Result<Vec<u8>> {
        let body = match (&self.operations, strip_text) {
            (Some(operations), true) => {
                let covered: HashMap<usize, &TextRun> = self
                    .runs
                    .iter()
                    .filter(|run| self.regions.iter().any(|r| r.intersects(&run.fragment.bbox)))
                    .map(|run| (run.op_index, run))
                    .collect();

                let mut kept = Vec::with_capacity(operations.len());
                for (i, op) in operations.iter().enumerate() {
                    match covered.get(&i) {
                        Some(run) => kept.extend(blank_run(op, run.advance)),
                        None => kept.push(op.clone()),
                    }
                }
                tracing::debug!(removed = covered.len(), "text runs stripped");
                Content { operations: kept }.encode()?
            }
            _ => self.content.clone(),
        };

        let mut out = Vec::with_capacity(body.len() + 64);
        out.extend_from_slice(b"q\n");
        out.extend_from_slice(&body);
        out.extend_from_slice(b"\nQ\n");
        out.extend_from_slice(self.fill_ops(fill_color).as_bytes());
        Ok(out)
    }

    fn fill_ops(&self, [r, g, b]: [u8; 3]) -> String {
        let mut ops = format!(
            "q {:.3} {:.3} {:.3} rg\n",
            f32::from(r) / 255.0,
            f32::from(g) / 255.0,
            f32::from(b) / 255.0
        );
        for region in &self.regions {
            let (x, y) = self.geometry.from_top_left(region.x1, region.y2);
            let _ = writeln!(
                ops,
                "{:.2} {:.2} {:.2} {:.2} re f",
                x,
                y,
                region.width(),
                region.height()
            );
        }
        ops.push_str("Q\n");
        ops
    }
}

/// Operators that keep the text position where a removed run left it
fn blank_run(op: &Operation, advance: i64) -> Vec<Operation> {
    let gap = Operation::new("TJ", vec![Object::Array(vec![Object::Integer(-advance)])]);
    match op.operator.as_str() {
        "'" => vec![Operation::new("T*", vec![]), gap],
        "\"" if op.operands.len() >= 2 => vec![
            Operation::new("Tw", vec![op.operands[0].clone()]),
            Operation::new("Tc", vec![op.operands[1].clone()]),
            Operation::new("T*", vec![]),
            gap,
        ],
        _ => vec![gap],
    }
}

#[derive(Debug, Clone, Copy)]
struct PageGeometry {
    llx: f32,
    lly: f32,
    urx: f32,
    ury: f32,
}

impl PageGeometry {
    fn of(doc: &Document, page_id: ObjectId) -> Self {
        // MediaBox is inheritable from the page tree
        let mut current = Some(page_id);
        let mut depth = 0;
        while let Some(id) = current {
            let dict = match doc.get_dictionary(id) {
                Ok(dict) => dict,
                Err(_) => break,
            };
            if let Ok(Object::Array(values)) = dict.get(b"MediaBox") {
                let numbers: Vec<f32> = values.iter().filter_map(number).collect();
                if let [x1, y1, x2, y2] = numbers[..] {
                    return Self::from_corners([x1, y1, x2, y2]);
                }
            }
            current = dict.get(b"Parent").and_then(Object::as_reference).ok();
            depth += 1;
            if depth > 32 {
                break;
            }
        }
        Self::from_corners(DEFAULT_MEDIA_BOX)
    }

    fn from_corners([x1, y1, x2, y2]: [f32; 4]) -> Self {
        Self {
            llx: x1.min(x2),
            lly: y1.min(y2),
            urx: x1.max(x2),
            ury: y1.max(y2),
        }
    }

    fn width(&self) -> f32 {
        self.urx - self.llx
    }

    fn height(&self) -> f32 {
        self.ury - self.lly
    }

    fn to_top_left(&self, x: f32, y: f32) -> (f32, f32) {
        (x - self.llx, self.ury - y)
    }

    fn from_top_left(&self, x: f32, y: f32) -> (f32, f32) {
        (x + self.llx, self.ury - y)
    }
}

/// Affine matrix `[a b c d e f]` in PDF row-vector convention
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Matrix {
    const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn translate(tx: f32, ty: f32) -> Self {
        Matrix {
            e: tx,
            f: ty,
            ..Self::IDENTITY
        }
    }

    fn from_operands(operands: &[Object]) -> Option<Self> {
        let numbers: Vec<f32> = operands.iter().filter_map(number).collect();
        match numbers[..] {
            [a, b, c, d, e, f] => Some(Matrix { a, b, c, d, e, f }),
            _ => None,
        }
    }

    /// `self × other`: apply `self`, then `other`
    fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }
}

struct TextState {
    ctm: Matrix,
    stack: Vec<Matrix>,
    tm: Matrix,
    tlm: Matrix,
    font_size: f32,
    leading: f32,
    char_spacing: f32,
    word_spacing: f32,
    h_scale: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            stack: Vec::new(),
            tm: Matrix::IDENTITY,
            tlm: Matrix::IDENTITY,
            font_size: 0.0,
            leading: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scale: 1.0,
        }
    }
}

impl TextState {
    fn move_line(&mut self, tx: f32, ty: f32) {
        self.tlm = Matrix::translate(tx, ty).then(&self.tlm);
        self.tm = self.tlm;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.leading);
    }

    /// Lay out one shown string and advance the text matrix
    fn show(&mut self, glyphs: &str, adjust: f32) -> (BoundingBox, i64) {
        let size = self.font_size.abs().max(f32::EPSILON);
        let count = glyphs.chars().count() as f32;
        let spaces = glyphs.chars().filter(|c| *c == ' ').count() as f32;
        let advance = (count * (GLYPH_WIDTH * size + self.char_spacing)
            + spaces * self.word_spacing
            - adjust / 1000.0 * size)
            * self.h_scale;

        let trm = self.tm.then(&self.ctm);
        let corners = [
            trm.apply(0.0, -DESCENT * size),
            trm.apply(advance, -DESCENT * size),
            trm.apply(advance, ASCENT * size),
            trm.apply(0.0, ASCENT * size),
        ];
        self.tm = Matrix::translate(advance, 0.0).then(&self.tm);

        let bbox = BoundingBox::from_polygon(&corners).unwrap_or_default();
        let thousandths = (advance * 1000.0 / (size * self.h_scale.abs().max(f32::EPSILON))).round();
        (bbox, thousandths as i64)
    }
}

/// Recover positioned text runs from a page's operators
fn text_runs(operations: &[Operation], geometry: &PageGeometry) -> Vec<TextRun> {
    let mut state = TextState::default();
    let mut runs = Vec::new();

    for (op_index, op) in operations.iter().enumerate() {
        let operands = &op.operands;
        let shown = match op.operator.as_str() {
            "q" => {
                state.stack.push(state.ctm);
                None
            }
            "Q" => {
                state.ctm = state.stack.pop().unwrap_or(Matrix::IDENTITY);
                None
            }
            "cm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    state.ctm = m.then(&state.ctm);
                }
                None
            }
            "BT" => {
                state.tm = Matrix::IDENTITY;
                state.tlm = Matrix::IDENTITY;
                None
            }
            "Tf" => {
                if let Some(size) = operands.get(1).and_then(number) {
                    state.font_size = size;
                }
                None
            }
            "TL" => {
                state.leading = first_number(operands).unwrap_or(state.leading);
                None
            }
            "Tc" => {
                state.char_spacing = first_number(operands).unwrap_or(state.char_spacing);
                None
            }
            "Tw" => {
                state.word_spacing = first_number(operands).unwrap_or(state.word_spacing);
                None
            }
            "Tz" => {
                state.h_scale = first_number(operands).map_or(state.h_scale, |v| v / 100.0);
                None
            }
            "Td" | "TD" => {
                if let (Some(tx), Some(ty)) = (
                    operands.first().and_then(number),
                    operands.get(1).and_then(number),
                ) {
                    if op.operator == "TD" {
                        state.leading = -ty;
                    }
                    state.move_line(tx, ty);
                }
                None
            }
            "Tm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    state.tlm = m;
                    state.tm = m;
                }
                None
            }
            "T*" => {
                state.next_line();
                None
            }
            "Tj" => operands.first().and_then(string_text).map(|s| (s.clone(), s, 0.0)),
            "'" => {
                state.next_line();
                operands.first().and_then(string_text).map(|s| (s.clone(), s, 0.0))
            }
            "\"" => {
                state.word_spacing = operands.first().and_then(number).unwrap_or(state.word_spacing);
                state.char_spacing = operands.get(1).and_then(number).unwrap_or(state.char_spacing);
                state.next_line();
                operands.get(2).and_then(string_text).map(|s| (s.clone(), s, 0.0))
            }
            "TJ" => match operands.first() {
                Some(Object::Array(items)) => Some(array_text(items)),
                _ => None,
            },
            _ => None,
        };

        if let Some((glyphs, text, adjust)) = shown {
            let (bbox, advance) = state.show(&glyphs, adjust);
            if text.trim().is_empty() {
                continue;
            }
            let (x1, y1) = geometry.to_top_left(bbox.x1, bbox.y2);
            let (x2, y2) = geometry.to_top_left(bbox.x2, bbox.y1);
            runs.push(TextRun {
                op_index,
                fragment: TextFragment::new(text, BoundingBox::new(x1, y1, x2, y2)),
                advance,
            });
        }
    }
    runs
}

/// Glyph text, search text (with word gaps as spaces) and total adjustment
fn array_text(items: &[Object]) -> (String, String, f32) {
    let mut glyphs = String::new();
    let mut text = String::new();
    let mut adjust = 0.0;
    for item in items {
        if let Some(s) = string_text(item) {
            glyphs.push_str(&s);
            text.push_str(&s);
        } else if let Some(n) = number(item) {
            adjust += n;
            if n <= -WORD_GAP && !text.is_empty() && !text.ends_with(' ') {
                text.push(' ');
            }
        }
    }
    (glyphs, text, adjust)
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn first_number(operands: &[Object]) -> Option<f32> {
    operands.first().and_then(number)
}

fn string_text(object: &Object) -> Option<String> {
    match object {
        Object::String(bytes, _) => Some(decode_text(bytes)),
        _ => None,
    }
}

/// UTF-16BE with BOM, else Latin-1
fn decode_text(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        _ => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}
