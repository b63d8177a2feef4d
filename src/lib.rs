//! Shipping-guide extraction from PDF text
//!
//! This crate provides:
//! - Positioned text tokens from the first page of a PDF (lopdf)
//! - Label-anchored extraction of the guide's header fields
//! - Reconstruction of the goods table into ordered line items
//!
//! Extraction is a pure function of the token list: the same tokens always
//! give the same [`GuideRecord`], and anything not found is simply left empty.

pub mod config;
pub mod extractor;
pub mod fields;
pub mod items;
pub mod layout;
pub mod record;

pub use config::ExtractionConfig;
pub use extractor::{extract_tokens, extract_tokens_mem};
pub use layout::Page;
pub use record::{Field, FieldRecord, GuideRecord, LineItem, Token};

use std::path::Path;

/// Extract a guide from a PDF file with default tolerances
pub fn extract_guide<P: AsRef<Path>>(path: P) -> Result<GuideRecord, GuideError> {
    extract_guide_with_config(path, &ExtractionConfig::default())
}

/// Extract a guide from a PDF file
pub fn extract_guide_with_config<P: AsRef<Path>>(
    path: P,
    config: &ExtractionConfig,
) -> Result<GuideRecord, GuideError> {
    let tokens = extract_tokens(path)?;
    Ok(extract_from_tokens(&tokens, config))
}

/// Extract a guide from a PDF memory buffer with default tolerances
pub fn extract_guide_mem(buffer: &[u8]) -> Result<GuideRecord, GuideError> {
    extract_guide_mem_with_config(buffer, &ExtractionConfig::default())
}

/// Extract a guide from a PDF memory buffer
pub fn extract_guide_mem_with_config(
    buffer: &[u8],
    config: &ExtractionConfig,
) -> Result<GuideRecord, GuideError> {
    let tokens = extract_tokens_mem(buffer)?;
    Ok(extract_from_tokens(&tokens, config))
}

/// Build the normalized record for one page's tokens.
///
/// Token order does not matter; tokens are put in reading order first.
pub fn extract_from_tokens(tokens: &[Token], config: &ExtractionConfig) -> GuideRecord {
    let page = Page::new(tokens.to_vec(), config);

    let record = GuideRecord {
        fields: fields::extract_fields(&page),
        items: items::extract_items(&page),
    };
    log::debug!(
        "extracted guide {:?}: {} items",
        record.fields.document_number,
        record.items.len()
    );

    record.normalized()
}

#[derive(Debug, thiserror::Error)]
pub enum GuideError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parsing error: {0}")]
    Parse(String),
    #[error("PDF has no pages")]
    NoPages,
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<lopdf::Error> for GuideError {
    fn from(e: lopdf::Error) -> Self {
        GuideError::Parse(e.to_string())
    }
}
