//! End-to-end memo pipeline: text → signals → source context → prompt → memo.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{Span, info, instrument};
use uuid::Uuid;

use underwrite_shared::{Generator, Result, RowSource, SignalRecord, UnderwriteError};

use crate::aggregate::{AggregateContext, ContextAggregator};
use crate::extract::extract;
use crate::prompt::render_prompt;

/// A generated memo together with what it was generated from.
#[derive(Debug, Clone, Serialize)]
pub struct Memo {
    /// Time-sortable request identifier.
    pub request_id: Uuid,
    pub signal: SignalRecord,
    /// Rendered aggregate context handed to the generator.
    pub context: String,
    /// Generated memo text, uninterpreted.
    pub memo: String,
    pub generated_at: DateTime<Utc>,
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when the pipeline completes.
    fn done(&self, memo: &Memo);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _memo: &Memo) {}
}

/// Reject input that is empty or whitespace-only.
pub fn validate_input(text: &str) -> Result<&str> {
    if text.trim().is_empty() {
        return Err(UnderwriteError::validation("input text is empty"));
    }
    Ok(text)
}

/// Runs extraction, aggregation and generation for one request at a time.
pub struct MemoPipeline<S, G> {
    aggregator: ContextAggregator<S>,
    generator: G,
}

impl<S: RowSource, G: Generator> MemoPipeline<S, G> {
    pub fn new(aggregator: ContextAggregator<S>, generator: G) -> Self {
        Self {
            aggregator,
            generator,
        }
    }

    pub fn aggregator(&self) -> &ContextAggregator<S> {
        &self.aggregator
    }

    /// Extract signals from `text` and aggregate their source context.
    pub async fn context_for(&self, text: &str) -> (SignalRecord, AggregateContext) {
        let signal = extract(text);
        let context = self.aggregator.aggregate(&signal).await;
        (signal, context)
    }

    /// Produce a memo for `text`.
    ///
    /// Only blank input and generator failures are errors; source problems
    /// are already folded into the context.
    #[instrument(skip_all, fields(request_id = tracing::field::Empty))]
    pub async fn analyze(&self, text: &str, progress: &dyn ProgressReporter) -> Result<Memo> {
        let text = validate_input(text)?;
        let start = Instant::now();
        let request_id = Uuid::now_v7();
        Span::current().record("request_id", tracing::field::display(request_id));

        progress.phase("Extracting signals");
        let signal = extract(text);

        progress.phase("Querying data sources");
        let context = self.aggregator.aggregate(&signal).await.render();

        progress.phase("Generating memo");
        let prompt = render_prompt(text, &context);
        let memo = self.generator.generate(&prompt).await?;

        let memo = Memo {
            request_id,
            signal,
            context,
            memo,
            generated_at: Utc::now(),
            elapsed: start.elapsed(),
        };

        info!(
            elapsed_ms = memo.elapsed.as_millis(),
            memo_len = memo.memo.len(),
            "memo generated"
        );
        progress.done(&memo);

        Ok(memo)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::aggregate::{NO_LOCATION_CONTEXT, NO_DATA_CONTEXT};
    use crate::test_support::{FakeGenerator, FakeResponse, FakeSource, price_row};
    use underwrite_shared::Catalogue;

    fn pipeline(source: FakeSource, generator: FakeGenerator) -> MemoPipeline<FakeSource, FakeGenerator> {
        let aggregator = ContextAggregator::new(source, Arc::new(Catalogue::default()));
        MemoPipeline::new(aggregator, generator)
    }

    #[tokio::test]
    async fn analyze_passes_text_and_context_to_generator() {
        let source = FakeSource::default().with(
            "Realtor Market Data",
            FakeResponse::Rows(vec![price_row("CA", 500_000)]),
        );
        let pipeline = pipeline(source, FakeGenerator::default());
        let text = "Office building at 123 Main St, Anytown, CA 90210. 50,000 sqft.";

        let memo = pipeline.analyze(text, &SilentProgress).await.expect("memo");

        assert_eq!(memo.signal.state.as_deref(), Some("CA"));
        assert!(memo.context.starts_with("Realtor Market Data:\n"));
        assert!(memo.memo.starts_with("## Executive Summary"));

        let prompts = pipeline.generator.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains(text));
        assert!(prompts[0].contains("\"price\":500000"));
    }

    #[tokio::test]
    async fn no_location_still_generates_with_sentinel() {
        let pipeline = pipeline(FakeSource::default(), FakeGenerator::default());

        let memo = pipeline
            .analyze("A piece of property.", &SilentProgress)
            .await
            .expect("memo");

        assert_eq!(memo.context, NO_LOCATION_CONTEXT);
        assert_eq!(pipeline.aggregator().catalogue().len(), 4);
        assert!(pipeline.generator.prompts()[0].contains(NO_LOCATION_CONTEXT));
    }

    #[tokio::test]
    async fn blank_input_is_rejected_before_any_call() {
        let pipeline = pipeline(FakeSource::default(), FakeGenerator::default());

        let err = pipeline.analyze("   \n", &SilentProgress).await.unwrap_err();

        assert!(matches!(err, UnderwriteError::Validation { .. }));
        assert!(pipeline.generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn generator_failure_propagates() {
        let pipeline = pipeline(FakeSource::default(), FakeGenerator::failing());

        let err = pipeline
            .analyze("Retail in TX", &SilentProgress)
            .await
            .unwrap_err();

        assert!(matches!(err, UnderwriteError::Generation(_)));
    }

    #[tokio::test]
    async fn context_for_runs_without_generator() {
        let pipeline = pipeline(FakeSource::default(), FakeGenerator::default());

        let (signal, context) = pipeline.context_for("Land parcel in WY").await;

        assert_eq!(signal.state.as_deref(), Some("WY"));
        assert_eq!(context.render(), NO_DATA_CONTEXT);
        assert!(pipeline.generator.prompts().is_empty());
    }
}
