//! Enrichment pipeline for Underwrite.
//!
//! Turns free-form deal text into structured signals ([`extract`]), uses
//! them to query the source catalogue ([`aggregate`]), and hands the merged
//! context to a generator to produce a memo ([`pipeline`]).

pub mod aggregate;
pub mod extract;
pub mod pipeline;
pub mod prompt;

#[cfg(test)]
pub(crate) mod test_support;

pub use aggregate::{
    AggregateContext, AggregateOptions, ContextAggregator, Contribution, NO_DATA_CONTEXT,
    NO_LOCATION_CONTEXT, SourceFailure, SourceOutcome, build_query,
};
pub use extract::extract;
pub use pipeline::{Memo, MemoPipeline, ProgressReporter, SilentProgress, validate_input};
pub use prompt::{PROMPT_TEMPLATE, render_prompt};
