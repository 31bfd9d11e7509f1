//! Core domain types: the signal record recovered from free text.

use serde::{Deserialize, Serialize};

use crate::source::ParamValue;

// ---------------------------------------------------------------------------
// PropertyType
// ---------------------------------------------------------------------------

/// Closed set of property types recognised in deal text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    Office,
    Retail,
    Industrial,
    Multifamily,
    Land,
}

impl PropertyType {
    /// All property types, in match-priority order.
    pub const ALL: [PropertyType; 5] = [
        Self::Office,
        Self::Retail,
        Self::Industrial,
        Self::Multifamily,
        Self::Land,
    ];

    /// Lower-cased name, as bound into queries.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Office => "office",
            Self::Retail => "retail",
            Self::Industrial => "industrial",
            Self::Multifamily => "multifamily",
            Self::Land => "land",
        }
    }

    /// Case-insensitive lookup by name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(name))
    }
}

impl std::fmt::Display for PropertyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SignalRecord
// ---------------------------------------------------------------------------

/// Names a single field of a [`SignalRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalField {
    State,
    City,
    PostalCode,
    PropertyType,
    FloorAreaSqft,
}

/// Structured attributes recovered from a deal description.
///
/// Every field is independently optional, except that `city` is only ever
/// set alongside `state`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalRecord {
    /// Two-letter region code, upper-cased.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Title-cased locality name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// Five-digit postal code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_type: Option<PropertyType>,
    /// Floor area in square feet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor_area_sqft: Option<u64>,
}

impl SignalRecord {
    /// Whether the given field is populated.
    pub fn has(&self, field: SignalField) -> bool {
        self.param_value(field).is_some()
    }

    /// The field's value in the form it is bound into a query.
    pub fn param_value(&self, field: SignalField) -> Option<ParamValue> {
        match field {
            SignalField::State => self.state.clone().map(ParamValue::String),
            SignalField::City => self.city.clone().map(ParamValue::String),
            SignalField::PostalCode => self.postal_code.clone().map(ParamValue::String),
            SignalField::PropertyType => self
                .property_type
                .map(|t| ParamValue::String(t.as_str().to_string())),
            SignalField::FloorAreaSqft => self
                .floor_area_sqft
                .and_then(|v| i64::try_from(v).ok())
                .map(ParamValue::Int64),
        }
    }

    /// True when no field is populated.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
