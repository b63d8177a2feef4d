//! Header field extraction
//!
//! Each field is described by a [`FieldRule`]: an ordered list of strategies
//! (the first non-empty result wins) and a cleanup applied to the winner.
//! Strategies are pure functions of the [`Page`].

use crate::layout::Page;
use crate::record::{Field, FieldRecord};
use once_cell::sync::Lazy;
use regex::Regex;

macro_rules! pattern {
    ($re:expr) => {{
        static RE: Lazy<Regex> = Lazy::new(|| Regex::new($re).unwrap());
        &RE
    }};
}

static DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]{2}[-/][0-9]{2}[-/][0-9]{4}").unwrap());
static PLATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?-u:\b)([A-Z]{4}-?[0-9]{2}|[A-Z]{2}-?[0-9]{4})(?-u:\b)").unwrap());
static DOCUMENT_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)N[º°]\s*:\s*0*([0-9]+)").unwrap());
static NATIONAL_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9]{1,2}\.?[0-9]{3}\.?[0-9]{3}-[0-9kK]").unwrap());
static LEADING_COLON: Lazy<Regex> = Lazy::new(|| Regex::new(r"^:\s*").unwrap());

/// How a field value is searched for
#[derive(Debug, Clone, Copy)]
pub enum Strategy {
    /// First regex match in the full page text. Uses capture group 1 when the
    /// pattern has one. `strip` characters are removed, `/` maps to `-` when
    /// `dashes` is set.
    TextPattern {
        pattern: &'static Lazy<Regex>,
        strip: Option<char>,
        dashes: bool,
    },
    /// Value next to the first token matching the label
    LabelValue { label: &'static Lazy<Regex> },
    /// Value next to the first token matching `label` but not `exclude`
    LabelValueExcluding {
        label: &'static Lazy<Regex>,
        exclude: &'static Lazy<Regex>,
    },
    /// ID-pattern token right of an explicit ID label
    IdNearLabel { label: &'static Lazy<Regex> },
    /// Last individual ID in the document, else the last ID of any kind
    IdAnywhere,
}

impl Strategy {
    pub fn apply(&self, page: &Page) -> String {
        match *self {
            Strategy::TextPattern {
                pattern,
                strip,
                dashes,
            } => {
                let Some(caps) = pattern.captures(page.full_text()) else {
                    return String::new();
                };
                let matched = caps.get(1).or_else(|| caps.get(0));
                let mut value = matched.map(|m| m.as_str().to_string()).unwrap_or_default();
                if let Some(c) = strip {
                    value.retain(|ch| ch != c);
                }
                if dashes {
                    value = value.replace('/', "-");
                }
                value
            }
            Strategy::LabelValue { label } => page.value_after_label(label),
            Strategy::LabelValueExcluding { label, exclude } => page
                .tokens()
                .iter()
                .find(|t| label.is_match(&t.text) && !exclude.is_match(&t.text))
                .map(|t| page.value_after(t, page.config().max_value_distance))
                .unwrap_or_default(),
            Strategy::IdNearLabel { label } => id_near_label(page, label),
            Strategy::IdAnywhere => id_anywhere(page),
        }
    }
}

/// Post-processing for a resolved value
#[derive(Debug, Clone, Copy, Default)]
pub struct Cleanup {
    /// Drop a leading ": " left over from "Label: value" layouts
    pub strip_colon: bool,
    /// Cut at the first match; catches a neighbouring column's label
    pub truncate_at: Option<&'static Lazy<Regex>>,
}

impl Cleanup {
    const NONE: Cleanup = Cleanup {
        strip_colon: false,
        truncate_at: None,
    };

    const COLON: Cleanup = Cleanup {
        strip_colon: true,
        truncate_at: None,
    };

    pub fn apply(&self, value: String) -> String {
        let mut value = if self.strip_colon {
            LEADING_COLON.replace(&value, "").into_owned()
        } else {
            value
        };
        if let Some(marker) = self.truncate_at {
            if let Some(m) = marker.find(&value) {
                value.truncate(m.start());
            }
        }
        value.trim().to_string()
    }
}

/// Ordered strategies for one field
#[derive(Debug, Clone)]
pub struct FieldRule {
    pub field: Field,
    pub strategies: Vec<Strategy>,
    pub cleanup: Cleanup,
}

impl FieldRule {
    pub fn resolve(&self, page: &Page) -> String {
        let value = self
            .strategies
            .iter()
            .map(|s| s.apply(page))
            .find(|v| !v.is_empty())
            .unwrap_or_default();
        if value.is_empty() {
            return value;
        }
        self.cleanup.apply(value)
    }
}

/// The rule table for the supported guide layout
pub static FIELD_RULES: Lazy<Vec<FieldRule>> = Lazy::new(|| {
    vec![
        FieldRule {
            field: Field::Date,
            strategies: vec![Strategy::TextPattern {
                pattern: &DATE,
                strip: None,
                dashes: true,
            }],
            cleanup: Cleanup::NONE,
        },
        FieldRule {
            field: Field::Plate,
            strategies: vec![Strategy::TextPattern {
                pattern: &PLATE,
                strip: Some('-'),
                dashes: false,
            }],
            cleanup: Cleanup::NONE,
        },
        FieldRule {
            field: Field::Destination,
            strategies: vec![
                Strategy::LabelValue {
                    label: pattern!(r"(?i)Direcci.n Destino"),
                },
                Strategy::LabelValue {
                    label: pattern!(r"(?i)Lugar de Destino"),
                },
            ],
            cleanup: Cleanup {
                strip_colon: true,
                truncate_at: Some(pattern!(r"(?i)Comuna Destino")),
            },
        },
        FieldRule {
            field: Field::Origin,
            strategies: vec![
                Strategy::LabelValueExcluding {
                    label: pattern!(r"(?i)DIRECCI.N"),
                    exclude: pattern!(r"(?i)DESTINO"),
                },
                Strategy::LabelValue {
                    label: pattern!(r"(?i)Se.or\s*\(es\)"),
                },
            ],
            cleanup: Cleanup {
                strip_colon: true,
                truncate_at: Some(pattern!(r"(?i)N. DOC. INTERNO")),
            },
        },
        FieldRule {
            field: Field::DocumentNumber,
            strategies: vec![Strategy::TextPattern {
                pattern: &DOCUMENT_NUMBER,
                strip: None,
                dashes: false,
            }],
            cleanup: Cleanup::NONE,
        },
        FieldRule {
            field: Field::Driver,
            strategies: vec![
                Strategy::LabelValue {
                    label: pattern!(r"(?i)Nombre Chofer"),
                },
                Strategy::LabelValue {
                    label: pattern!(r"(?i)Chofer"),
                },
            ],
            cleanup: Cleanup {
                strip_colon: true,
                truncate_at: Some(pattern!(r"(?i)RUT Chofer")),
            },
        },
        FieldRule {
            field: Field::Coordinator,
            strategies: vec![Strategy::LabelValue {
                label: pattern!(r"(?i)Nombre Coordinador"),
            }],
            cleanup: Cleanup::COLON,
        },
        FieldRule {
            field: Field::VehicleType,
            strategies: vec![Strategy::LabelValue {
                label: pattern!(r"(?i)Tipo (de )?Veh.culo"),
            }],
            cleanup: Cleanup::COLON,
        },
        FieldRule {
            field: Field::ContractNumber,
            strategies: vec![Strategy::LabelValue {
                label: pattern!(r"(?i)N[º°]?\s*(de\s*)?Contrato"),
            }],
            cleanup: Cleanup::COLON,
        },
        FieldRule {
            field: Field::NationalId,
            strategies: vec![
                Strategy::IdNearLabel {
                    label: pattern!(r"(?i)RUT Chofer"),
                },
                Strategy::IdNearLabel {
                    label: pattern!(r"(?i)RUT Transportista"),
                },
                Strategy::IdNearLabel {
                    label: pattern!(r"(?i)RUT\s*Transport"),
                },
                Strategy::IdAnywhere,
            ],
            cleanup: Cleanup::NONE,
        },
    ]
});

/// Resolve every header field of a page
pub fn extract_fields(page: &Page) -> FieldRecord {
    let mut record = FieldRecord::default();
    for rule in FIELD_RULES.iter() {
        let value = rule.resolve(page);
        log::trace!("{:?} = {:?}", rule.field, value);
        *record.get_mut(rule.field) = value;
    }
    record
}

fn id_near_label(page: &Page, label: &Regex) -> String {
    let Some(label_token) = page.find_label(label) else {
        return String::new();
    };
    page.same_line_right(label_token, page.config().id_label_distance)
        .find_map(|t| NATIONAL_ID.find(&t.text))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

fn id_anywhere(page: &Page) -> String {
    let limit = page.config().individual_id_prefix_limit;
    let all: Vec<&str> = NATIONAL_ID
        .find_iter(page.full_text())
        .map(|m| m.as_str())
        .collect();

    all.iter()
        .rev()
        .find(|id| id_prefix(id).is_some_and(|p| p < limit))
        .or_else(|| all.last())
        .map(|id| id.to_string())
        .unwrap_or_default()
}

/// Millions group of an ID: `"12.345.678-9"` and `"12345678-9"` both give 12.
pub fn id_prefix(id: &str) -> Option<u32> {
    let body: String = id
        .split('-')
        .next()?
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    let split = body.len().checked_sub(6)?;
    body[..split].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractionConfig;
    use crate::record::Token;

    fn page(tokens: Vec<Token>) -> Page {
        Page::new(tokens, &ExtractionConfig::default())
    }

    fn rule(field: Field) -> &'static FieldRule {
        FIELD_RULES.iter().find(|r| r.field == field).unwrap()
    }

    #[test]
    fn test_every_field_has_a_rule() {
        for field in Field::ALL {
            assert_eq!(FIELD_RULES.iter().filter(|r| r.field == field).count(), 1);
        }
    }

    #[test]
    fn test_date_normalizes_separators() {
        let p = page(vec![Token::new("Fecha: 05/11/2024", 10.0, 700.0)]);
        assert_eq!(rule(Field::Date).resolve(&p), "05-11-2024");
    }

    #[test]
    fn test_plate_strips_hyphen() {
        let p = page(vec![Token::new("Patente: BCDF-12", 10.0, 700.0)]);
        assert_eq!(rule(Field::Plate).resolve(&p), "BCDF12");

        let p = page(vec![Token::new("Patente AB1234", 10.0, 700.0)]);
        assert_eq!(rule(Field::Plate).resolve(&p), "AB1234");
    }

    #[test]
    fn test_document_number_strips_zeros() {
        let p = page(vec![
            Token::new("Nº Contrato: 777", 10.0, 700.0),
            Token::new("Nº: 00023349", 10.0, 650.0),
        ]);
        assert_eq!(rule(Field::DocumentNumber).resolve(&p), "23349");
    }

    #[test]
    fn test_destination_priority_and_cleanup() {
        let p = page(vec![
            Token::new("Lugar de Destino", 10.0, 600.0),
            Token::new("BODEGA 2", 150.0, 600.0),
            Token::new("Dirección Destino", 10.0, 700.0),
            Token::new(": AV. SIEMPRE VIVA 742", 120.0, 700.0),
            Token::new("Comuna Destino", 250.0, 700.0),
        ]);
        assert_eq!(rule(Field::Destination).resolve(&p), "AV. SIEMPRE VIVA 742");
    }

    #[test]
    fn test_destination_falls_back_to_place() {
        let p = page(vec![
            Token::new("Lugar de Destino", 10.0, 600.0),
            Token::new("BODEGA 2", 150.0, 600.0),
        ]);
        assert_eq!(rule(Field::Destination).resolve(&p), "BODEGA 2");
    }

    #[test]
    fn test_origin_skips_destination_label() {
        let p = page(vec![
            Token::new("Dirección Destino", 10.0, 700.0),
            Token::new("LOS ANDES 10", 150.0, 700.0),
            Token::new("DIRECCIÓN", 10.0, 650.0),
            Token::new(": CAMINO REAL 55", 100.0, 650.0),
            Token::new("Nº DOC. INTERNO 99", 250.0, 650.0),
        ]);
        assert_eq!(rule(Field::Origin).resolve(&p), "CAMINO REAL 55");
    }

    #[test]
    fn test_origin_falls_back_to_recipient() {
        let p = page(vec![
            Token::new("Señor(es)", 10.0, 700.0),
            Token::new("CONSTRUCTORA SUR", 100.0, 700.0),
        ]);
        assert_eq!(rule(Field::Origin).resolve(&p), "CONSTRUCTORA SUR");
    }

    #[test]
    fn test_driver_cut_at_id_label() {
        let p = page(vec![
            Token::new("Nombre Chofer", 10.0, 300.0),
            Token::new("PEDRO SOTO", 120.0, 300.0),
            Token::new("RUT Chofer", 230.0, 300.0),
        ]);
        assert_eq!(rule(Field::Driver).resolve(&p), "PEDRO SOTO");
    }

    #[test]
    fn test_id_from_label() {
        let p = page(vec![
            Token::new("RUT Transportista", 10.0, 300.0),
            Token::new("76.543.210-K", 150.0, 300.0),
            Token::new("12.345.678-9", 10.0, 100.0),
        ]);
        assert_eq!(rule(Field::NationalId).resolve(&p), "76.543.210-K");
    }

    #[test]
    fn test_id_label_too_far_falls_through() {
        let p = page(vec![
            Token::new("RUT Chofer", 10.0, 300.0),
            Token::new("76.543.210-K", 250.0, 300.0),
        ]);
        // out of label reach, but still the only ID in the document
        assert_eq!(id_near_label(&p, pattern!(r"(?i)RUT Chofer")), "");
        assert_eq!(rule(Field::NationalId).resolve(&p), "76.543.210-K");
    }

    #[test]
    fn test_id_prefers_individual() {
        let p = page(vec![
            Token::new("12.345.678-9", 10.0, 500.0),
            Token::new("76.543.210-K", 10.0, 400.0),
        ]);
        assert_eq!(rule(Field::NationalId).resolve(&p), "12.345.678-9");
    }

    #[test]
    fn test_id_last_individual_wins() {
        let p = page(vec![
            Token::new("9.876.543-2", 10.0, 500.0),
            Token::new("15.111.222-3", 10.0, 100.0),
            Token::new("80.000.000-1", 10.0, 50.0),
        ]);
        assert_eq!(id_anywhere(&p), "15.111.222-3");
    }

    #[test]
    fn test_id_entity_only() {
        let p = page(vec![
            Token::new("76.000.001-5", 10.0, 500.0),
            Token::new("77.000.002-6", 10.0, 400.0),
        ]);
        assert_eq!(id_anywhere(&p), "77.000.002-6");
    }

    #[test]
    fn test_id_prefix() {
        assert_eq!(id_prefix("12.345.678-9"), Some(12));
        assert_eq!(id_prefix("12345678-9"), Some(12));
        assert_eq!(id_prefix("9.876.543-2"), Some(9));
        assert_eq!(id_prefix("76.543.210-K"), Some(76));
    }

    #[test]
    fn test_driver_bare_label_fallback() {
        let p = page(vec![
            Token::new("Chofer", 10.0, 300.0),
            Token::new(": LUIS MUÑOZ", 100.0, 300.0),
        ]);
        assert_eq!(rule(Field::Driver).resolve(&p), "LUIS MUÑOZ");
    }

    #[test]
    fn test_origin_empty_address_falls_to_recipient() {
        let p = page(vec![
            Token::new("DIRECCIÓN", 10.0, 700.0),
            Token::new("Señor(es)", 10.0, 600.0),
            Token::new("CONSTRUCTORA SUR", 100.0, 600.0),
        ]);
        assert_eq!(rule(Field::Origin).resolve(&p), "CONSTRUCTORA SUR");
    }

    #[test]
    fn test_coordinator() {
        let p = page(vec![
            Token::new("Nombre Coordinador", 10.0, 250.0),
            Token::new(": ANA ROJAS", 150.0, 250.0),
        ]);
        assert_eq!(rule(Field::Coordinator).resolve(&p), "ANA ROJAS");
    }

    #[test]
    fn test_vehicle_type() {
        let p = page(vec![
            Token::new("Tipo Vehículo", 10.0, 600.0),
            Token::new(": CAMION 3/4", 120.0, 600.0),
        ]);
        assert_eq!(rule(Field::VehicleType).resolve(&p), "CAMION 3/4");

        let p = page(vec![
            Token::new("Tipo de Vehiculo", 10.0, 600.0),
            Token::new("RAMPLA", 140.0, 600.0),
        ]);
        assert_eq!(rule(Field::VehicleType).resolve(&p), "RAMPLA");
    }

    #[test]
    fn test_contract_number() {
        let p = page(vec![
            Token::new("N° Contrato", 10.0, 600.0),
            Token::new(": 4600012345", 120.0, 600.0),
        ]);
        assert_eq!(rule(Field::ContractNumber).resolve(&p), "4600012345");

        let p = page(vec![
            Token::new("Nº de Contrato", 10.0, 600.0),
            Token::new("C-77", 140.0, 600.0),
        ]);
        assert_eq!(rule(Field::ContractNumber).resolve(&p), "C-77");
    }

    #[test]
    fn test_patterns_are_ascii_only() {
        // Arabic-Indic and fullwidth digits are not digits here
        let p = page(vec![
            Token::new("١٢.٣٤٥.٦٧٨-٩", 10.0, 500.0),
            Token::new("Fecha ０５/１１/２０２４", 10.0, 480.0),
            Token::new("Patente ABCD١٢", 10.0, 460.0),
        ]);
        assert_eq!(rule(Field::NationalId).resolve(&p), "");
        assert_eq!(rule(Field::Date).resolve(&p), "");
        assert_eq!(rule(Field::Plate).resolve(&p), "");
    }

    #[test]
    fn test_plate_word_boundary_is_ascii() {
        // "Ñ" is not a word character, so the plate still has a boundary
        let p = page(vec![Token::new("ÑABCD12", 10.0, 500.0)]);
        assert_eq!(rule(Field::Plate).resolve(&p), "ABCD12");
    }

    #[test]
    fn test_empty_page_yields_empty_record() {
        assert_eq!(extract_fields(&page(vec![])), FieldRecord::default());
    }
}
