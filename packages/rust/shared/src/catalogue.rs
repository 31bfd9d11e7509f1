//! Fixed catalogues: valid region codes and the queryable source descriptors.
//!
//! Both are built once at start-up and only read afterwards.

use serde::Serialize;

use crate::types::SignalField;

/// Dataset holding the catalogue tables, used when the config doesn't override it.
pub const DEFAULT_DATASET: &str = "ccibt-hack25ww7-719.Genavate_real_estae_data";

/// Lower bound of the floor-area comparable window, as a fraction of the subject.
pub const FLOOR_AREA_LOWER_RATIO: f64 = 0.8;

/// Upper bound of the floor-area comparable window, as a fraction of the subject.
pub const FLOOR_AREA_UPPER_RATIO: f64 = 1.2;

/// Two-letter codes of the 50 US states.
pub const REGION_CODES: [&str; 50] = [
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA", "KS",
    "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ", "NM", "NY",
    "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT", "VA", "WA", "WV",
    "WI", "WY",
];

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

/// A WHERE-clause predicate bound from one signal field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    /// `column = @param`
    Equals {
        column: &'static str,
        param: &'static str,
    },
    /// `LOWER(column) = @param`
    LowerEquals {
        column: &'static str,
        param: &'static str,
    },
    /// `column BETWEEN @min_param AND @max_param`, bounds scaled from the signal value.
    Range {
        column: &'static str,
        min_param: &'static str,
        max_param: &'static str,
    },
}

/// An optional filter: applied only when `field` is set on the signal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterSpec {
    pub field: SignalField,
    pub predicate: Predicate,
}

/// One queryable external source.
#[derive(Debug, Clone, Serialize)]
pub struct SourceDescriptor {
    /// Display label, unique within the catalogue.
    pub name: &'static str,
    /// Fully-qualified table identifier.
    pub table: String,
    /// Selected columns, in output order.
    pub columns: &'static [&'static str],
    /// Column the required signal is matched against.
    pub required_column: &'static str,
    /// Signal that must be set for the source to be queried at all.
    pub required_signal: SignalField,
    /// Filters added when their signal is present, in this order.
    pub optional_filters: Vec<FilterSpec>,
    /// Optional `ORDER BY` clause body.
    pub order_by: Option<&'static str>,
    pub result_limit: u32,
    /// Failures are logged and dropped rather than reported.
    pub tolerant: bool,
}

/// The ordered, read-only list of sources consulted for every request.
#[derive(Debug, Clone, Serialize)]
pub struct Catalogue {
    sources: Vec<SourceDescriptor>,
}

impl Catalogue {
    /// Build a catalogue from explicit descriptors (kept in the given order).
    pub fn new(sources: Vec<SourceDescriptor>) -> Self {
        Self { sources }
    }

    /// The standard four sources, with tables resolved under `dataset`:
    /// realtor comps, commercial comps, flood-loss statistics, internal risk summary.
    pub fn standard(dataset: &str) -> Self {
        let table = |name: &str| format!("{dataset}.{name}");

        Self::new(vec![
            SourceDescriptor {
                name: "Realtor Market Data",
                table: table("realtor_data"),
                columns: &["city", "state", "price", "beds", "baths", "sqft"],
                required_column: "state",
                required_signal: SignalField::State,
                optional_filters: vec![
                    FilterSpec {
                        field: SignalField::City,
                        predicate: Predicate::Equals {
                            column: "city",
                            param: "city",
                        },
                    },
                    FilterSpec {
                        field: SignalField::FloorAreaSqft,
                        predicate: Predicate::Range {
                            column: "sqft",
                            min_param: "sqft_min",
                            max_param: "sqft_max",
                        },
                    },
                ],
                order_by: None,
                result_limit: 5,
                tolerant: false,
            },
            SourceDescriptor {
                name: "Commercial Real Estate Comps",
                table: table("commercial_real_estate"),
                columns: &["sale_price", "city", "state", "property_type", "year_built"],
                required_column: "state",
                required_signal: SignalField::State,
                optional_filters: vec![FilterSpec {
                    field: SignalField::PropertyType,
                    predicate: Predicate::LowerEquals {
                        column: "property_type",
                        param: "prop_type",
                    },
                }],
                order_by: None,
                result_limit: 5,
                tolerant: false,
            },
            SourceDescriptor {
                name: "NFIP Financial Losses Data",
                table: table("nfip_financial-losses-by-state__20251031"),
                columns: &["state", "amount_paid_on_claims"],
                required_column: "state",
                required_signal: SignalField::State,
                optional_filters: Vec::new(),
                order_by: None,
                result_limit: 1,
                tolerant: false,
            },
            // Known to be missing or schema-drifted in some projects.
            SourceDescriptor {
                name: "Internal SAFMRS Risk Data",
                table: table("safmrs_revised"),
                columns: &["state", "risk_summary", "last_updated"],
                required_column: "state",
                required_signal: SignalField::State,
                optional_filters: Vec::new(),
                order_by: Some("last_updated DESC"),
                result_limit: 1,
                tolerant: true,
            },
        ])
    }

    /// Sources in fixed query/output order.
    pub fn sources(&self) -> &[SourceDescriptor] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl Default for Catalogue {
    fn default() -> Self {
        Self::standard(DEFAULT_DATASET)
    }
}
