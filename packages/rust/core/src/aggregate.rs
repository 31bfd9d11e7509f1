//! Context aggregation: signal record → one merged, source-attributed text block.
//!
//! Every catalogue source is looked up independently. Each lookup ends in a
//! [`SourceOutcome`]; the outcomes are folded in catalogue order into an
//! [`AggregateContext`]. Failures are scoped to their source and end up as
//! data in the context, so aggregation itself never fails.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use underwrite_shared::{
    AppConfig, Catalogue, FLOOR_AREA_LOWER_RATIO, FLOOR_AREA_UPPER_RATIO, ParamValue, Predicate,
    QueryParam, Row, RowSource, SignalRecord, SourceDescriptor, SourceQuery,
};

/// Returned when the text yields no state to query by.
pub const NO_LOCATION_CONTEXT: &str =
    "No location information could be extracted to query the data sources.";

/// Returned when every source answered but none had rows.
pub const NO_DATA_CONTEXT: &str =
    "No relevant data found in the data sources for the specified location.";

const UNAVAILABLE_PREFIX: &str = "Error accessing data sources. Please check project permissions and table names. Details: ";

const DEADLINE_DETAIL: &str = "deadline exceeded before the lookup completed";

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Runtime aggregation options, merged from config + CLI flags.
#[derive(Debug, Clone)]
pub struct AggregateOptions {
    /// Run lookups concurrently (results are identical either way).
    pub fan_out: bool,
    /// Time budget for all lookups; outstanding ones are dropped when it elapses.
    pub deadline: Option<Duration>,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            fan_out: true,
            deadline: None,
        }
    }
}

impl From<&AppConfig> for AggregateOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            fan_out: config.aggregation.fan_out,
            deadline: config.aggregation.deadline_ms.map(Duration::from_millis),
        }
    }
}

// ---------------------------------------------------------------------------
// Outcomes and the aggregate
// ---------------------------------------------------------------------------

/// How a single source lookup ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceOutcome {
    Rows(Vec<Row>),
    Empty,
    /// Failure of a tolerant source, or a lookup cut off by the deadline.
    Tolerated(String),
    /// Failure of a non-tolerant source.
    Failed(String),
}

/// Rows contributed by one source.
#[derive(Debug, Clone, PartialEq)]
pub struct Contribution {
    pub source: String,
    pub rows: Vec<Row>,
}

/// A non-tolerant source failure reported in the context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    pub source: String,
    pub detail: String,
}

/// The merged result of a lookup round.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateContext {
    /// No state signal; nothing was queried.
    NoLocation,
    /// Nothing returned rows and nothing failed hard.
    NoData,
    /// Nothing returned rows and at least one source failed hard.
    Unavailable { failures: Vec<SourceFailure> },
    /// At least one source returned rows.
    Data {
        contributions: Vec<Contribution>,
        failures: Vec<SourceFailure>,
    },
}

impl AggregateContext {
    /// Fold per-source outcomes, given in catalogue order.
    pub fn fold<'a>(
        outcomes: impl IntoIterator<Item = (&'a SourceDescriptor, SourceOutcome)>,
    ) -> Self {
        let mut contributions = Vec::new();
        let mut failures = Vec::new();

        for (descriptor, outcome) in outcomes {
            match outcome {
                SourceOutcome::Rows(rows) => contributions.push(Contribution {
                    source: descriptor.name.to_string(),
                    rows,
                }),
                SourceOutcome::Failed(detail) => failures.push(SourceFailure {
                    source: descriptor.name.to_string(),
                    detail,
                }),
                SourceOutcome::Tolerated(detail) => {
                    debug!(source = descriptor.name, %detail, "tolerated failure left out of context");
                }
                SourceOutcome::Empty => {}
            }
        }

        match (contributions.is_empty(), failures.is_empty()) {
            (true, true) => Self::NoData,
            (true, false) => Self::Unavailable { failures },
            (false, _) => Self::Data {
                contributions,
                failures,
            },
        }
    }

    /// Source contributions, empty for the degenerate cases.
    pub fn contributions(&self) -> &[Contribution] {
        match self {
            Self::Data { contributions, .. } => contributions,
            _ => &[],
        }
    }

    /// Hard failures that were reported.
    pub fn failures(&self) -> &[SourceFailure] {
        match self {
            Self::Unavailable { failures } | Self::Data { failures, .. } => failures,
            _ => &[],
        }
    }

    /// Render as the text block handed to the generator. Never empty.
    pub fn render(&self) -> String {
        match self {
            Self::NoLocation => NO_LOCATION_CONTEXT.to_string(),
            Self::NoData => NO_DATA_CONTEXT.to_string(),
            Self::Unavailable { failures } => {
                let details: Vec<String> = failures
                    .iter()
                    .map(|f| format!("{}: {}", f.source, f.detail))
                    .collect();
                format!("{UNAVAILABLE_PREFIX}{}", details.join("; "))
            }
            Self::Data {
                contributions,
                failures,
            } => {
                let mut parts: Vec<String> = contributions
                    .iter()
                    .map(|c| format!("{}:\n{}", c.source, rows_json(&c.rows)))
                    .collect();

                if !failures.is_empty() {
                    let lines: Vec<String> = failures
                        .iter()
                        .map(|f| format!("- {}: {}", f.source, f.detail))
                        .collect();
                    parts.push(format!("Data Source Errors:\n{}", lines.join("\n")));
                }

                parts.join("\n\n")
            }
        }
    }
}

impl std::fmt::Display for AggregateContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

/// Compact JSON array of records, field order as returned.
fn rows_json(rows: &[Row]) -> String {
    serde_json::Value::Array(rows.iter().cloned().map(serde_json::Value::Object).collect())
        .to_string()
}

// ---------------------------------------------------------------------------
// Query building
// ---------------------------------------------------------------------------

/// Build the parameterised lookup for `descriptor`.
///
/// Returns `None` when the signal lacks the source's required field. Signal
/// values only ever travel as named parameters.
pub fn build_query(descriptor: &SourceDescriptor, signal: &SignalRecord) -> Option<SourceQuery> {
    let required = signal.param_value(descriptor.required_signal)?;

    let mut clauses = vec![format!(
        "{col} = @{col}",
        col = descriptor.required_column
    )];
    let mut params = vec![QueryParam::new(descriptor.required_column, required)];

    for filter in &descriptor.optional_filters {
        let Some(value) = signal.param_value(filter.field) else {
            continue;
        };

        match (&filter.predicate, value) {
            (Predicate::Equals { column, param }, value) => {
                clauses.push(format!("{column} = @{param}"));
                params.push(QueryParam::new(*param, value));
            }
            (Predicate::LowerEquals { column, param }, value) => {
                clauses.push(format!("LOWER({column}) = @{param}"));
                params.push(QueryParam::new(*param, value));
            }
            (
                Predicate::Range {
                    column,
                    min_param,
                    max_param,
                },
                ParamValue::Int64(center),
            ) => {
                let (low, high) = scaled_bounds(center);
                clauses.push(format!("{column} BETWEEN @{min_param} AND @{max_param}"));
                params.push(QueryParam::new(*min_param, ParamValue::Int64(low)));
                params.push(QueryParam::new(*max_param, ParamValue::Int64(high)));
            }
            (Predicate::Range { column, .. }, other) => {
                debug!(column, value = %other, "range filter needs a numeric signal, skipping");
            }
        }
    }

    let mut sql = format!(
        "SELECT {} FROM `{}` WHERE {}",
        descriptor.columns.join(", "),
        descriptor.table,
        clauses.join(" AND ")
    );
    if let Some(order_by) = descriptor.order_by {
        sql.push_str(&format!(" ORDER BY {order_by}"));
    }
    sql.push_str(&format!(" LIMIT {}", descriptor.result_limit));

    Some(SourceQuery {
        source: descriptor.name.to_string(),
        sql,
        params,
        limit: descriptor.result_limit,
    })
}

/// Inclusive comparable window around `center`, rounded to whole units.
fn scaled_bounds(center: i64) -> (i64, i64) {
    let center = center as f64;
    (
        (center * FLOOR_AREA_LOWER_RATIO).round() as i64,
        (center * FLOOR_AREA_UPPER_RATIO).round() as i64,
    )
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

/// Queries every catalogue source for a signal and merges the results.
pub struct ContextAggregator<S> {
    source: S,
    catalogue: Arc<Catalogue>,
    options: AggregateOptions,
}

impl<S: RowSource> ContextAggregator<S> {
    /// Create an aggregator over a shared, read-only catalogue.
    pub fn new(source: S, catalogue: Arc<Catalogue>) -> Self {
        Self {
            source,
            catalogue,
            options: AggregateOptions::default(),
        }
    }

    pub fn with_options(mut self, options: AggregateOptions) -> Self {
        self.options = options;
        self
    }

    pub fn catalogue(&self) -> &Catalogue {
        &self.catalogue
    }

    /// Query all sources, bounded by the configured deadline if any.
    #[instrument(skip_all, fields(state = ?signal.state))]
    pub async fn aggregate(&self, signal: &SignalRecord) -> AggregateContext {
        let deadline = self.options.deadline.map(|budget| Instant::now() + budget);
        self.run(signal, deadline).await
    }

    /// Query all sources; lookups still outstanding at `deadline` contribute nothing.
    #[instrument(skip_all, fields(state = ?signal.state))]
    pub async fn aggregate_until(
        &self,
        signal: &SignalRecord,
        deadline: Instant,
    ) -> AggregateContext {
        self.run(signal, Some(deadline)).await
    }

    async fn run(&self, signal: &SignalRecord, deadline: Option<Instant>) -> AggregateContext {
        if signal.state.is_none() {
            info!("no location signal, skipping source lookups");
            return AggregateContext::NoLocation;
        }

        let sources = self.catalogue.sources();
        let lookups = sources
            .iter()
            .map(|descriptor| self.lookup(descriptor, signal, deadline));

        let outcomes: Vec<SourceOutcome> = if self.options.fan_out {
            join_all(lookups).await
        } else {
            let mut outcomes = Vec::with_capacity(sources.len());
            for lookup in lookups {
                outcomes.push(lookup.await);
            }
            outcomes
        };

        let context = AggregateContext::fold(sources.iter().zip(outcomes));

        info!(
            contributions = context.contributions().len(),
            failures = context.failures().len(),
            "context aggregated"
        );

        context
    }

    async fn lookup(
        &self,
        descriptor: &SourceDescriptor,
        signal: &SignalRecord,
        deadline: Option<Instant>,
    ) -> SourceOutcome {
        let Some(query) = build_query(descriptor, signal) else {
            debug!(source = descriptor.name, "required signal missing, skipping");
            return SourceOutcome::Empty;
        };

        debug!(source = descriptor.name, sql = %query.sql, "querying source");

        let pending = self.source.run_query(&query);
        let result = match deadline {
            Some(at) => match tokio::time::timeout_at(at, pending).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(source = descriptor.name, "lookup cut off by deadline");
                    return SourceOutcome::Tolerated(DEADLINE_DETAIL.to_string());
                }
            },
            None => pending.await,
        };

        match result {
            Ok(rows) if rows.is_empty() => {
                debug!(source = descriptor.name, "no rows");
                SourceOutcome::Empty
            }
            Ok(mut rows) => {
                rows.truncate(descriptor.result_limit as usize);
                info!(source = descriptor.name, rows = rows.len(), "source contributed");
                SourceOutcome::Rows(rows)
            }
            Err(e) if descriptor.tolerant => {
                warn!(source = descriptor.name, error = %e, "tolerant source failed, skipping");
                SourceOutcome::Tolerated(e.detail())
            }
            Err(e) => {
                error!(source = descriptor.name, error = %e, "source lookup failed");
                SourceOutcome::Failed(e.detail())
            }
        }
    }
}
