//! Free-text claim in, decision out: parse the claim, pull the clauses that
//! match it from the index and let the generator decide.

use serde::Serialize;
use tracing::info;

use docrag_core::error::Result;
use docrag_core::query::StructuredQuery;
use docrag_core::traits::VectorIndex;
use docrag_core::types::SearchResult;
use docrag_retrieval::RetrievalService;

use crate::decision::{Decision, DecisionEngine};
use crate::query::QueryParser;
use crate::TextGenerator;

/// Clauses retrieved per claim unless the caller asks otherwise.
pub const DEFAULT_CLAUSES: usize = 5;

/// A decision together with the evidence it was made from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessResponse {
    #[serde(flatten)]
    pub decision: Decision,
    pub structured_query: StructuredQuery,
    pub relevant_clauses: Vec<SearchResult>,
}

/// Search uses the structured query's text, or the raw query when nothing
/// could be extracted. Generator failures degrade to the rule-based parse
/// and an undetermined decision; only retrieval errors are returned.
pub fn process_query<VI: VectorIndex>(
    service: &RetrievalService<VI>,
    parser: &QueryParser,
    generator: &dyn TextGenerator,
    query: &str,
    k: usize,
) -> Result<ProcessResponse> {
    let structured_query = parser.parse(query, Some(generator));
    let search_text = if structured_query.is_empty() { query.to_string() } else { structured_query.to_search_text() };
    let relevant_clauses = service.retrieve(&search_text, k)?;
    let decision = DecisionEngine::new(generator).decide(&structured_query, &relevant_clauses);
    info!(
        clauses = relevant_clauses.len(),
        verdict = ?decision.verdict,
        "processed claim query"
    );
    Ok(ProcessResponse { decision, structured_query, relevant_clauses })
}
