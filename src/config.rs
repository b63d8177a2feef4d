//! Geometric tolerances used by the extraction heuristics
//!
//! All distances are in PDF user-space units (1/72 inch). The defaults are
//! tuned to the font size and layout of the supported guide forms.

use serde::{Deserialize, Serialize};

/// Configuration for guide extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Tokens closer than this vertically sort as one visual line
    pub line_tolerance: f32,
    /// Vertical tolerance for "same line as the label" searches
    pub same_line_tolerance: f32,
    /// Maximum horizontal reach of a same-line value search
    pub max_value_distance: f32,
    /// Maximum vertical drop for the next-line value fallback
    pub below_line_distance: f32,
    /// Maximum horizontal drift for the next-line value fallback
    pub below_line_x_tolerance: f32,
    /// Horizontal reach when looking for an ID right of its label
    pub id_label_distance: f32,
    /// Half-width of the quantity column band around its header
    pub quantity_band: f32,
    /// Rows must start this far below the quantity header
    pub header_clearance: f32,
    /// Vertical tolerance for headers sharing the quantity header's row
    pub header_line_tolerance: f32,
    /// Gap kept left of the price/total column
    pub description_margin: f32,
    /// Vertical tolerance for description text joining a row
    pub row_tolerance: f32,
    /// IDs whose millions group is below this are treated as individuals
    pub individual_id_prefix_limit: u32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            line_tolerance: 4.0,
            same_line_tolerance: 5.0,
            max_value_distance: 300.0,
            below_line_distance: 20.0,
            below_line_x_tolerance: 100.0,
            id_label_distance: 200.0,
            quantity_band: 50.0,
            header_clearance: 10.0,
            header_line_tolerance: 20.0,
            description_margin: 10.0,
            row_tolerance: 5.0,
            individual_id_prefix_limit: 50,
        }
    }
}

impl ExtractionConfig {
    /// Parse a (possibly partial) JSON override; missing keys keep defaults.
    pub fn from_json(json: &str) -> Result<Self, crate::GuideError> {
        serde_json::from_str(json).map_err(|e| crate::GuideError::Config(e.to_string()))
    }
}
