//! In-memory fakes for the outbound boundaries.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::json;
use underwrite_shared::{Generator, Result, Row, RowSource, SourceQuery, UnderwriteError};

/// Canned behaviour for one source label.
#[derive(Debug, Clone)]
pub(crate) enum FakeResponse {
    Rows(Vec<Row>),
    /// Rows returned after a delay.
    Delayed(u64, Vec<Row>),
    Fail(&'static str),
    /// Never finishes in test time.
    Stall,
}

/// A [`RowSource`] keyed by source label. Unknown labels return no rows.
#[derive(Debug, Default)]
pub(crate) struct FakeSource {
    responses: HashMap<String, FakeResponse>,
    calls: AtomicUsize,
    seen: Mutex<Vec<SourceQuery>>,
}

impl FakeSource {
    pub(crate) fn with(mut self, source: &str, response: FakeResponse) -> Self {
        self.responses.insert(source.to_string(), response);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn seen(&self) -> Vec<SourceQuery> {
        self.seen.lock().expect("lock").clone()
    }
}

impl RowSource for FakeSource {
    async fn run_query(&self, query: &SourceQuery) -> Result<Vec<Row>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().expect("lock").push(query.clone());

        match self.responses.get(&query.source) {
            None => Ok(Vec::new()),
            Some(FakeResponse::Rows(rows)) => Ok(rows.clone()),
            Some(FakeResponse::Delayed(ms, rows)) => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
                Ok(rows.clone())
            }
            Some(FakeResponse::Fail(message)) => {
                Err(UnderwriteError::source(query.source.clone(), *message))
            }
            Some(FakeResponse::Stall) => {
                tokio::time::sleep(Duration::from_secs(300)).await;
                Ok(Vec::new())
            }
        }
    }
}

/// Build a row from a JSON object literal.
pub(crate) fn row(value: serde_json::Value) -> Row {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("row fixture must be an object, got {other}"),
    }
}

pub(crate) fn price_row(state: &str, price: i64) -> Row {
    row(json!({ "state": state, "price": price }))
}

/// A [`Generator`] that records prompts and echoes a fixed reply.
#[derive(Debug, Default)]
pub(crate) struct FakeGenerator {
    pub(crate) fail: bool,
    prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("lock").clone()
    }
}

impl Generator for FakeGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().expect("lock").push(prompt.to_string());
        if self.fail {
            return Err(UnderwriteError::Generation("quota exhausted".into()));
        }
        Ok("## Executive Summary\nLooks fine.".into())
    }
}
