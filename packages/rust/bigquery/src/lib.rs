//! BigQuery-backed [`RowSource`].
//!
//! Runs catalogue lookups through the synchronous `jobs.query` REST endpoint
//! with named query parameters, and decodes the positional `f`/`v` row
//! format into ordered JSON records using the response schema.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use tracing::{debug, instrument};

use underwrite_shared::{BigQueryConfig, Result, Row, RowSource, SourceQuery, UnderwriteError};

/// User-Agent string for BigQuery requests.
const USER_AGENT: &str = concat!("Underwrite/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    query: &'a str,
    use_legacy_sql: bool,
    parameter_mode: &'static str,
    query_parameters: Vec<ApiParameter<'a>>,
    max_results: u32,
    timeout_ms: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiParameter<'a> {
    name: &'a str,
    parameter_type: ApiParameterType,
    parameter_value: ApiParameterValue,
}

#[derive(Debug, Serialize)]
struct ApiParameterType {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ApiParameterValue {
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_complete: Option<bool>,
    #[serde(default)]
    schema: Option<TableSchema>,
    #[serde(default)]
    rows: Vec<TableRow>,
}

#[derive(Debug, Deserialize)]
struct TableSchema {
    #[serde(default)]
    fields: Vec<FieldSchema>,
}

#[derive(Debug, Deserialize)]
struct FieldSchema {
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct TableRow {
    f: Vec<TableCell>,
}

#[derive(Debug, Deserialize)]
struct TableCell {
    v: Value,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Shared handle for read-only BigQuery lookups.
///
/// Cloning is cheap; concurrent queries share one connection pool.
#[derive(Debug, Clone)]
pub struct BigQueryClient {
    client: Client,
    queries_url: String,
    access_token: String,
    timeout: Duration,
}

impl BigQueryClient {
    /// Create a client for `project_id` authenticated with an OAuth2 access token.
    pub fn new(
        project_id: impl AsRef<str>,
        access_token: impl Into<String>,
        config: &BigQueryConfig,
    ) -> Result<Self> {
        let endpoint = config.endpoint_url()?;
        let timeout = Duration::from_secs(config.timeout_secs);

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| UnderwriteError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            queries_url: format!(
                "{}/projects/{}/queries",
                endpoint.as_str().trim_end_matches('/'),
                project_id.as_ref()
            ),
            access_token: access_token.into(),
            timeout,
        })
    }
}

impl RowSource for BigQueryClient {
    #[instrument(skip_all, fields(source = %query.source))]
    async fn run_query(&self, query: &SourceQuery) -> Result<Vec<Row>> {
        let body = QueryRequest {
            query: &query.sql,
            use_legacy_sql: false,
            parameter_mode: "NAMED",
            query_parameters: query
                .params
                .iter()
                .map(|p| ApiParameter {
                    name: &p.name,
                    parameter_type: ApiParameterType {
                        kind: p.value.type_name(),
                    },
                    parameter_value: ApiParameterValue {
                        value: p.value.to_string(),
                    },
                })
                .collect(),
            max_results: query.limit,
            timeout_ms: self.timeout.as_millis() as u64,
        };

        let response = self
            .client
            .post(&self.queries_url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| UnderwriteError::source(&query.source, format!("request failed: {e}")))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            UnderwriteError::source(&query.source, format!("failed to read body: {e}"))
        })?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|env| env.error.message)
                .unwrap_or_else(|_| format!("HTTP {status}"));
            return Err(UnderwriteError::source(&query.source, message));
        }

        let parsed: QueryResponse = serde_json::from_str(&text).map_err(|e| {
            UnderwriteError::source(&query.source, format!("malformed query response: {e}"))
        })?;

        if parsed.job_complete == Some(false) {
            return Err(UnderwriteError::source(
                &query.source,
                "query did not complete within the request timeout",
            ));
        }

        let mut rows = decode_rows(parsed)
            .map_err(|e| UnderwriteError::source(&query.source, e.to_string()))?;
        rows.truncate(query.limit as usize);

        debug!(rows = rows.len(), "query returned");
        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// Row decoding
// ---------------------------------------------------------------------------

fn decode_rows(response: QueryResponse) -> Result<Vec<Row>> {
    if response.rows.is_empty() {
        return Ok(Vec::new());
    }

    let fields = response
        .schema
        .map(|s| s.fields)
        .ok_or_else(|| UnderwriteError::parse("rows returned without a schema"))?;

    response
        .rows
        .into_iter()
        .map(|row| {
            if row.f.len() != fields.len() {
                return Err(UnderwriteError::parse(format!(
                    "row has {} cells, schema has {} fields",
                    row.f.len(),
                    fields.len()
                )));
            }
            Ok(fields
                .iter()
                .zip(row.f)
                .map(|(field, cell)| (field.name.clone(), decode_cell(&field.kind, cell.v)))
                .collect::<Row>())
        })
        .collect()
}

/// Convert a cell (always string-encoded for scalars) to a typed JSON value.
fn decode_cell(kind: &str, raw: Value) -> Value {
    let text = match raw {
        Value::String(text) => text,
        // Null, or nested RECORD / REPEATED data.
        other => return other,
    };

    match kind {
        "INTEGER" | "INT64" => text
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or(Value::String(text)),
        "FLOAT" | "FLOAT64" | "NUMERIC" | "BIGNUMERIC" => text
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::String(text)),
        "BOOLEAN" | "BOOL" if text == "true" => Value::Bool(true),
        "BOOLEAN" | "BOOL" if text == "false" => Value::Bool(false),
        _ => Value::String(text),
    }
}
