//! Structured query extraction and claim decisions over retrieved clauses.
//!
//! Both parsers follow the same precedence: a [`TextGenerator`]'s output is
//! used when it yields something usable, deterministic rules otherwise.

use docrag_core::error::Result;

pub mod decision;
pub mod pipeline;
pub mod query;

pub use decision::{Decision, DecisionConsumer, DecisionEngine, DecisionParser, Verdict};
pub use pipeline::{process_query, ProcessResponse, DEFAULT_CLAUSES};
pub use query::QueryParser;

/// Prompt → free text capability (a local or remote language model).
pub trait TextGenerator: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String>;
}

impl<F> TextGenerator for F
where
    F: Fn(&str) -> Result<String> + Send + Sync,
{
    fn generate(&self, prompt: &str) -> Result<String> {
        self(prompt)
    }
}
