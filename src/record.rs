//! Input tokens and the output record: header fields plus line items
//!
//! Also holds the normalizer (upper-case + trim) and quantity formatting.

use serde::{Deserialize, Serialize};

/// A text fragment with its position on the page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// The text content
    pub text: String,
    /// X position on page
    pub x: f32,
    /// Y position on page (PDF coordinates, origin at bottom-left)
    pub y: f32,
    /// Width of text (estimated from font size)
    pub width: f32,
    /// Height (rendered font size)
    pub height: f32,
}

impl Token {
    pub fn new(text: impl Into<String>, x: f32, y: f32) -> Self {
        let text = text.into();
        let width = text.chars().count() as f32 * DEFAULT_FONT_SIZE * 0.5;
        Self {
            text,
            x,
            y,
            width,
            height: DEFAULT_FONT_SIZE,
        }
    }
}

pub(crate) const DEFAULT_FONT_SIZE: f32 = 12.0;

/// Header fields of a shipping guide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Origin,
    Destination,
    VehicleType,
    Driver,
    ContractNumber,
    DocumentNumber,
    Date,
    Plate,
    NationalId,
    Coordinator,
}

impl Field {
    pub const ALL: [Field; 10] = [
        Field::Origin,
        Field::Destination,
        Field::VehicleType,
        Field::Driver,
        Field::ContractNumber,
        Field::DocumentNumber,
        Field::Date,
        Field::Plate,
        Field::NationalId,
        Field::Coordinator,
    ];
}

/// Named header values; unresolved fields stay empty
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldRecord {
    pub origin: String,
    pub destination: String,
    pub vehicle_type: String,
    pub driver: String,
    pub contract_number: String,
    pub document_number: String,
    pub date: String,
    pub plate: String,
    pub national_id: String,
    pub coordinator: String,
}

impl FieldRecord {
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Origin => &self.origin,
            Field::Destination => &self.destination,
            Field::VehicleType => &self.vehicle_type,
            Field::Driver => &self.driver,
            Field::ContractNumber => &self.contract_number,
            Field::DocumentNumber => &self.document_number,
            Field::Date => &self.date,
            Field::Plate => &self.plate,
            Field::NationalId => &self.national_id,
            Field::Coordinator => &self.coordinator,
        }
    }

    pub fn get_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Origin => &mut self.origin,
            Field::Destination => &mut self.destination,
            Field::VehicleType => &mut self.vehicle_type,
            Field::Driver => &mut self.driver,
            Field::ContractNumber => &mut self.contract_number,
            Field::DocumentNumber => &mut self.document_number,
            Field::Date => &mut self.date,
            Field::Plate => &mut self.plate,
            Field::NationalId => &mut self.national_id,
            Field::Coordinator => &mut self.coordinator,
        }
    }
}

/// One row of the goods table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineItem {
    /// 1-based position in table order
    pub sequence_label: String,
    pub quantity: String,
    pub description: String,
    /// No reference column exists in the supported layout; always empty
    pub reference: String,
}

/// Everything extracted from one guide
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuideRecord {
    #[serde(flatten)]
    pub fields: FieldRecord,
    pub items: Vec<LineItem>,
}

impl GuideRecord {
    /// Upper-case and trim every string, formatting quantities.
    pub fn normalized(mut self) -> Self {
        for field in Field::ALL {
            let value = self.fields.get_mut(field);
            *value = normalize_text(value);
        }
        for item in &mut self.items {
            item.sequence_label = normalize_text(&item.sequence_label);
            item.quantity = normalize_quantity(&item.quantity);
            item.description = normalize_text(&item.description);
            item.reference = normalize_text(&item.reference);
        }
        self
    }

    /// Overlay extracted values onto a user-editable form.
    ///
    /// Non-empty fields overwrite the form's values; empty ones leave them
    /// alone. Items replace the form's items only when any were found.
    pub fn merge_into(&self, form: &mut GuideRecord) {
        for field in Field::ALL {
            let value = self.fields.get(field);
            if !value.is_empty() {
                *form.fields.get_mut(field) = value.to_string();
            }
        }
        if !self.items.is_empty() {
            form.items = self.items.clone();
        }
    }
}

fn normalize_text(s: &str) -> String {
    s.trim().to_uppercase()
}

/// Format a quantity cell: leading integer part, zero-padded to two digits.
///
/// `"7"` becomes `"07"`, `"43,00"` becomes `"43"`; text without a leading
/// integer is kept as-is (upper-cased).
pub fn normalize_quantity(raw: &str) -> String {
    let cleaned = raw.trim().replacen(',', ".", 1);
    let digits: String = cleaned.chars().take_while(|c| c.is_ascii_digit()).collect();
    match digits.parse::<u128>() {
        Ok(n) => format!("{:02}", n),
        Err(_) => normalize_text(raw),
    }
}
