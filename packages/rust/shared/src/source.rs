//! Outbound boundaries: row-returning data sources and the text generator.

use std::future::Future;

use crate::error::Result;

/// One result row: column name to value, in the order the source returned them.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// A typed value bound to a named query parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    String(String),
    Int64(i64),
}

impl ParamValue {
    /// BigQuery standard SQL type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "STRING",
            Self::Int64(_) => "INT64",
        }
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Int64(v) => write!(f, "{v}"),
        }
    }
}

/// A named query parameter (`@name` in the SQL text).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParam {
    pub name: String,
    pub value: ParamValue,
}

impl QueryParam {
    pub fn new(name: impl Into<String>, value: ParamValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// A fully parameterised, read-only lookup against one catalogue source.
///
/// User-derived values only ever appear in `params`, never in `sql`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceQuery {
    /// Display label of the source this query targets.
    pub source: String,
    /// Standard SQL text with `@name` placeholders.
    pub sql: String,
    /// Bound parameters, in the order they were added.
    pub params: Vec<QueryParam>,
    /// Maximum rows to return.
    pub limit: u32,
}

impl SourceQuery {
    /// Look up a bound parameter by name.
    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.params.iter().find(|p| p.name == name).map(|p| &p.value)
    }
}

/// A queryable external dataset.
///
/// Implementations must support concurrent independent queries on a shared
/// handle.
pub trait RowSource: Send + Sync {
    /// Execute `query`, returning at most `query.limit` rows.
    fn run_query(&self, query: &SourceQuery) -> impl Future<Output = Result<Vec<Row>>> + Send;
}

/// An opaque text-to-text generation service.
pub trait Generator: Send + Sync {
    /// Generate a completion for `prompt`.
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String>> + Send;
}
