//! Token source: positioned text fragments from the first page of a PDF
//!
//! The extraction core only needs a list of [`Token`]s; this module produces
//! them with lopdf by walking the page's content stream and tracking the
//! text and graphics matrices.

pub use crate::record::Token;

use crate::record::DEFAULT_FONT_SIZE;
use crate::GuideError;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId};
use std::collections::BTreeMap;
use std::path::Path;

/// Extract the first page's tokens from a PDF file
pub fn extract_tokens<P: AsRef<Path>>(path: P) -> Result<Vec<Token>, GuideError> {
    let doc = Document::load(path)?;
    first_page_tokens(&doc)
}

/// Extract the first page's tokens from a PDF memory buffer
pub fn extract_tokens_mem(buffer: &[u8]) -> Result<Vec<Token>, GuideError> {
    let doc = Document::load_mem(buffer)?;
    first_page_tokens(&doc)
}

fn first_page_tokens(doc: &Document) -> Result<Vec<Token>, GuideError> {
    let pages = doc.get_pages();
    let (&page_num, &page_id) = pages.iter().next().ok_or(GuideError::NoPages)?;

    let tokens = page_tokens(doc, page_id)?;
    log::debug!("page {}: {} tokens", page_num, tokens.len());
    Ok(tokens)
}

/// Multiply two 2D transformation matrices
/// Matrix format: [a, b, c, d, e, f] representing:
/// | a  b  0 |
/// | c  d  0 |
/// | e  f  1 |
fn multiply_matrices(m1: &[f32; 6], m2: &[f32; 6]) -> [f32; 6] {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}

const IDENTITY: [f32; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// TJ offsets at or below this (thousandths of text space) separate words
const TJ_WORD_GAP: f32 = -200.0;

/// Text and graphics state while walking a content stream
struct TextState {
    ctm: [f32; 6],
    ctm_stack: Vec<[f32; 6]>,
    font: String,
    font_size: f32,
    /// Set by TL/TD; until then approximated from the font size
    leading: Option<f32>,
    text_matrix: [f32; 6],
    line_matrix: [f32; 6],
    in_text_block: bool,
}

impl TextState {
    fn new() -> Self {
        Self {
            ctm: IDENTITY,
            ctm_stack: Vec::new(),
            font: String::new(),
            font_size: DEFAULT_FONT_SIZE,
            leading: None,
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
            in_text_block: false,
        }
    }

    fn leading(&self) -> f32 {
        self.leading.unwrap_or(self.font_size * 1.2)
    }

    /// Tlm = [1 0 0 1 tx ty] x Tlm; the offset is in text space
    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = multiply_matrices(&[1.0, 0.0, 0.0, 1.0, tx, ty], &self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        let leading = self.leading();
        self.move_line(0.0, -leading);
    }

    fn token(&self, text: String) -> Token {
        let size = effective_font_size(self.font_size, &self.text_matrix);
        let combined = multiply_matrices(&self.text_matrix, &self.ctm);
        let width = text.chars().count() as f32 * size * 0.5;
        Token {
            text,
            x: combined[4],
            y: combined[5],
            width,
            height: size,
        }
    }
}

/// Walk one page's content stream and collect its tokens in stream order
fn page_tokens(doc: &Document, page_id: ObjectId) -> Result<Vec<Token>, GuideError> {
    let fonts = doc.get_page_fonts(page_id).unwrap_or_default();
    let content_data = doc
        .get_page_content(page_id)
        .map_err(|e| GuideError::Parse(e.to_string()))?;
    let content = Content::decode(&content_data).map_err(|e| GuideError::Parse(e.to_string()))?;

    Ok(tokens_from_operations(doc, &fonts, &content.operations))
}

fn tokens_from_operations(
    doc: &Document,
    fonts: &BTreeMap<Vec<u8>, &lopdf::Dictionary>,
    operations: &[Operation],
) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut state = TextState::new();

    for op in operations {
        let operands = &op.operands;
        match op.operator.as_str() {
            "q" => state.ctm_stack.push(state.ctm),
            "Q" => {
                if let Some(saved) = state.ctm_stack.pop() {
                    state.ctm = saved;
                }
            }
            "cm" if operands.len() >= 6 => {
                let m = matrix_from(operands);
                state.ctm = multiply_matrices(&m, &state.ctm);
            }
            "BT" => {
                state.in_text_block = true;
                state.text_matrix = IDENTITY;
                state.line_matrix = IDENTITY;
            }
            "ET" => state.in_text_block = false,
            "Tf" if operands.len() >= 2 => {
                if let Ok(name) = operands[0].as_name() {
                    state.font = String::from_utf8_lossy(name).to_string();
                }
                if let Some(size) = get_number(&operands[1]) {
                    state.font_size = size;
                }
            }
            "TL" if !operands.is_empty() => {
                if let Some(leading) = get_number(&operands[0]) {
                    state.leading = Some(leading);
                }
            }
            "Td" | "TD" if operands.len() >= 2 => {
                let tx = get_number(&operands[0]).unwrap_or(0.0);
                let ty = get_number(&operands[1]).unwrap_or(0.0);
                if op.operator == "TD" {
                    state.leading = Some(-ty);
                }
                state.move_line(tx, ty);
            }
            "Tm" if operands.len() >= 6 => {
                state.text_matrix = matrix_from(operands);
                state.line_matrix = state.text_matrix;
            }
            "T*" => state.next_line(),
            "Tj" | "'" if !operands.is_empty() => {
                if op.operator == "'" {
                    state.next_line();
                }
                if !state.in_text_block {
                    continue;
                }
                if let Some(text) = decode_operand(&operands[0], doc, fonts, &state.font) {
                    if !text.trim().is_empty() {
                        tokens.push(state.token(text));
                    }
                }
            }
            "TJ" if state.in_text_block && !operands.is_empty() => {
                if let Ok(array) = operands[0].as_array() {
                    let mut text = String::new();
                    for item in array {
                        if let Some(part) = decode_operand(item, doc, fonts, &state.font) {
                            text.push_str(&part);
                        } else if get_number(item).is_some_and(|n| n <= TJ_WORD_GAP)
                            && !text.is_empty()
                            && !text.ends_with(char::is_whitespace)
                        {
                            text.push(' ');
                        }
                    }
                    if !text.trim().is_empty() {
                        tokens.push(state.token(text.trim_end().to_string()));
                    }
                }
            }
            _ => {}
        }
    }

    tokens
}

fn matrix_from(operands: &[Object]) -> [f32; 6] {
    let mut m = IDENTITY;
    for (i, operand) in operands.iter().take(6).enumerate() {
        if let Some(v) = get_number(operand) {
            m[i] = v;
        }
    }
    m
}

/// Helper to get f32 from Object
fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Compute effective font size from base size and text matrix
fn effective_font_size(base_size: f32, text_matrix: &[f32; 6]) -> f32 {
    let scale_x = (text_matrix[0].powi(2) + text_matrix[1].powi(2)).sqrt();
    let scale_y = (text_matrix[2].powi(2) + text_matrix[3].powi(2)).sqrt();
    base_size * scale_x.max(scale_y)
}

/// Decode a string operand using the current font's encoding
fn decode_operand(
    obj: &Object,
    doc: &Document,
    fonts: &BTreeMap<Vec<u8>, &lopdf::Dictionary>,
    current_font: &str,
) -> Option<String> {
    let Object::String(bytes, _) = obj else {
        return None;
    };

    if let Some(font_dict) = fonts.get(current_font.as_bytes()) {
        if let Ok(encoding) = font_dict.get_font_encoding(doc) {
            if let Ok(text) = Document::decode_text(&encoding, bytes) {
                return Some(text);
            }
        }
    }

    // UTF-16BE with BOM
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
            .collect();
        return Some(String::from_utf16_lossy(&utf16));
    }

    // Latin-1
    Some(bytes.iter().map(|&b| b as char).collect())
}
