//! Line-item table reconstruction
//!
//! Finds the CANTIDAD/DESCRIPCIÓN header row, derives column bands from it and
//! walks the tokens below in reading order. A numeric token in the quantity
//! band opens a row; description-column text on the row's own line joins it;
//! a footer label ends the table.

use crate::config::ExtractionConfig;
use crate::layout::{sort_reading_order, Page};
use crate::record::{LineItem, Token};
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::ControlFlow;

static QUANTITY_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)CANTIDAD").unwrap());
static DESCRIPTION_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)DESCRIPCI.N").unwrap());
static PRICE_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)P\.?\s*UNIT|PRECIO").unwrap());
static TOTAL_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)VALOR\s*TOTAL|TOTAL").unwrap());
static STOP_WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)TOTAL|OBSERVACIONES|RECIBIDO|FIRMA|RUT Transportista|Tipo Traslado|Comuna Destino",
    )
    .unwrap()
});
static NUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9.,]+$").unwrap());

/// Column geometry derived from the header row
#[derive(Debug, Clone, PartialEq)]
pub struct TableGeometry {
    /// X of the quantity header; the quantity band is centered on it
    pub quantity_x: f32,
    /// Y of the quantity header
    pub header_y: f32,
    pub quantity_band: f32,
    /// Description text must start left of this
    pub description_max_x: f32,
    pub row_tolerance: f32,
}

impl TableGeometry {
    /// Locate the header row; `None` when either required header is missing.
    pub fn detect(page: &Page) -> Option<Self> {
        let config = page.config();
        let quantity = page.find_label(&QUANTITY_HEADER)?;
        page.find_label(&DESCRIPTION_HEADER)?;

        let on_header_line =
            |t: &&Token| (t.y - quantity.y).abs() < config.header_line_tolerance;
        let right_header = page
            .find_label(&PRICE_HEADER)
            .filter(on_header_line)
            .or_else(|| page.find_label(&TOTAL_HEADER).filter(on_header_line));
        let description_max_x = right_header
            .map(|h| h.x - config.description_margin)
            .unwrap_or(f32::INFINITY);

        Some(Self {
            quantity_x: quantity.x,
            header_y: quantity.y,
            quantity_band: config.quantity_band,
            description_max_x,
            row_tolerance: config.row_tolerance,
        })
    }

    fn in_quantity_band(&self, token: &Token) -> bool {
        (token.x - self.quantity_x).abs() < self.quantity_band
    }

    fn in_description_column(&self, token: &Token) -> bool {
        token.x > self.quantity_x + self.quantity_band && token.x < self.description_max_x
    }
}

/// A row that is still collecting description text
#[derive(Debug, Clone, PartialEq)]
pub struct OpenRow {
    pub item: LineItem,
    /// Y of the quantity token that opened the row
    pub anchor_y: f32,
}

/// State threaded through the table walk
#[derive(Debug, Clone, PartialEq)]
pub struct TableWalk {
    pub rows: Vec<LineItem>,
    pub current: Option<OpenRow>,
    /// Sequence label for the next row
    pub counter: u32,
}

impl Default for TableWalk {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            current: None,
            counter: 1,
        }
    }
}

impl TableWalk {
    /// Apply one token. `Break` means a footer label ended the table.
    pub fn step(mut self, token: &Token, geometry: &TableGeometry) -> ControlFlow<Self, Self> {
        if STOP_WORD.is_match(&token.text) {
            log::trace!("table ends at {:?}", token.text);
            return ControlFlow::Break(self);
        }

        if geometry.in_quantity_band(token) && NUMERIC.is_match(token.text.trim()) {
            if let Some(open) = self.current.take() {
                self.rows.push(open.item);
            }
            self.current = Some(OpenRow {
                item: LineItem {
                    sequence_label: self.counter.to_string(),
                    quantity: token.text.clone(),
                    ..Default::default()
                },
                anchor_y: token.y,
            });
            self.counter += 1;
            return ControlFlow::Continue(self);
        }

        if geometry.in_description_column(token) {
            if let Some(open) = self.current.as_mut() {
                let text = token.text.trim();
                if (token.y - open.anchor_y).abs() < geometry.row_tolerance && !text.is_empty() {
                    let description = &mut open.item.description;
                    if !description.is_empty() {
                        description.push(' ');
                    }
                    description.push_str(text);
                }
            }
        }

        ControlFlow::Continue(self)
    }

    /// Commit the open row and return all rows in table order
    pub fn finish(mut self) -> Vec<LineItem> {
        if let Some(open) = self.current.take() {
            self.rows.push(open.item);
        }
        for row in &mut self.rows {
            row.description = row.description.trim().to_string();
        }
        self.rows
    }
}

/// Reconstruct the line items of a page's goods table.
pub fn extract_items(page: &Page) -> Vec<LineItem> {
    let Some(geometry) = TableGeometry::detect(page) else {
        log::debug!("no CANTIDAD/DESCRIPCION header; no items");
        return Vec::new();
    };
    walk_table(page.tokens(), &geometry, page.config())
}

/// Run the state machine over the tokens below the header row
pub fn walk_table(
    tokens: &[Token],
    geometry: &TableGeometry,
    config: &ExtractionConfig,
) -> Vec<LineItem> {
    let mut candidates: Vec<Token> = tokens
        .iter()
        .filter(|t| t.y < geometry.header_y - config.header_clearance)
        .cloned()
        .collect();
    sort_reading_order(&mut candidates, config.line_tolerance);

    let walk = match candidates
        .iter()
        .try_fold(TableWalk::default(), |walk, token| walk.step(token, geometry))
    {
        ControlFlow::Break(walk) | ControlFlow::Continue(walk) => walk,
    };

    let rows = walk.finish();
    log::debug!("table: {} rows", rows.len());
    rows
}
