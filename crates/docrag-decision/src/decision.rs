use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use docrag_core::query::StructuredQuery;
use docrag_core::types::SearchResult;

use crate::TextGenerator;

/// Clauses shown to the generator and eligible for citation.
pub const MAX_CLAUSES: usize = 3;
/// Characters of each clause included in the prompt.
pub const CLAUSE_PREVIEW_CHARS: usize = 200;
pub const PROCESSING_ERROR: &str = "Unable to determine decision due to processing error.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Approved,
    Rejected,
    Undetermined,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    #[serde(rename = "decision")]
    pub verdict: Verdict,
    pub amount: Option<f64>,
    pub justification: String,
    pub clause_references: Vec<String>,
}

impl Decision {
    pub fn undetermined(justification: impl Into<String>) -> Self {
        Self { verdict: Verdict::Undetermined, amount: None, justification: justification.into(), clause_references: Vec::new() }
    }
}

/// Anything that turns a structured query and its supporting clauses into a
/// decision.
pub trait DecisionConsumer {
    fn decide(&self, query: &StructuredQuery, clauses: &[SearchResult]) -> Decision;
}

static PATTERNS: OnceLock<DecisionPatterns> = OnceLock::new();

struct DecisionPatterns {
    verdict: Regex,
    clause: Regex,
    amount: Regex,
}

impl DecisionPatterns {
    fn new() -> Self {
        Self {
            verdict: Regex::new(r"(?i)approve|reject|denied").expect("verdict regex must compile"),
            clause: Regex::new(r"(?i)clause\s+(\d+)").expect("clause regex must compile"),
            amount: Regex::new(r"\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?").expect("amount regex must compile"),
        }
    }
}

fn patterns() -> &'static DecisionPatterns {
    PATTERNS.get_or_init(DecisionPatterns::new)
}

/// Reads a verdict, an amount and clause citations out of generated text.
///
/// - verdict: whichever of an approval keyword (`approve`, `approved`) or a
///   rejection keyword (`reject`, `rejected`, `denied`) occurs first,
///   case-insensitively; `Undetermined` when neither does
/// - amount: the first number, thousands separators and decimals allowed,
///   that is not the number of a `Clause N` reference
/// - clause references: `Clause i` for each `i` in `1..=min(3, clause_count)`
///   that the text mentions
#[derive(Debug, Default, Clone, Copy)]
pub struct DecisionParser;

impl DecisionParser {
    pub fn parse(&self, raw: &str, clause_count: usize) -> Decision {
        let p = patterns();

        let verdict = match p.verdict.find(raw).map(|m| m.as_str().to_ascii_lowercase()) {
            Some(word) if word.starts_with("approve") => Verdict::Approved,
            Some(_) => Verdict::Rejected,
            None => Verdict::Undetermined,
        };

        let mut cited = BTreeSet::new();
        let mut clause_numbers = Vec::new();
        for caps in p.clause.captures_iter(raw) {
            if let Some(num) = caps.get(1) {
                clause_numbers.push(num.range());
                if let Ok(n) = num.as_str().parse::<usize>() {
                    cited.insert(n);
                }
            }
        }

        let amount = p
            .amount
            .find_iter(raw)
            .find(|m| !clause_numbers.iter().any(|r| r.start < m.end() && m.start() < r.end))
            .and_then(|m| m.as_str().replace(',', "").parse::<f64>().ok());

        let clause_references = (1..=clause_count.min(MAX_CLAUSES))
            .filter(|i| cited.contains(i))
            .map(|i| format!("Clause {i}"))
            .collect();

        Decision { verdict, amount, justification: raw.trim().to_string(), clause_references }
    }
}

/// Asks a [`TextGenerator`] for a decision and parses its answer.
pub struct DecisionEngine<'g> {
    generator: &'g dyn TextGenerator,
    parser: DecisionParser,
}

impl<'g> DecisionEngine<'g> {
    pub fn new(generator: &'g dyn TextGenerator) -> Self {
        Self { generator, parser: DecisionParser }
    }

    pub fn decide(&self, query: &StructuredQuery, clauses: &[SearchResult]) -> Decision {
        let shown = &clauses[..clauses.len().min(MAX_CLAUSES)];
        let prompt = decision_prompt(query, shown);
        match self.generator.generate(&prompt) {
            Ok(raw) => {
                let decision = self.parser.parse(&raw, shown.len());
                debug!(verdict = ?decision.verdict, cited = decision.clause_references.len(), "decision parsed");
                decision
            }
            Err(e) => {
                warn!(error = %e, "decision generation failed");
                Decision::undetermined(PROCESSING_ERROR)
            }
        }
    }
}

impl DecisionConsumer for DecisionEngine<'_> {
    fn decide(&self, query: &StructuredQuery, clauses: &[SearchResult]) -> Decision {
        DecisionEngine::decide(self, query, clauses)
    }
}

pub fn decision_prompt(query: &StructuredQuery, clauses: &[SearchResult]) -> String {
    let details = query.fields().into_iter().map(|(k, v)| format!("{k}: {v}")).collect::<Vec<_>>().join(", ");
    let clauses = clauses
        .iter()
        .take(MAX_CLAUSES)
        .enumerate()
        .map(|(i, c)| format!("Clause {}: {}", i + 1, c.content.chars().take(CLAUSE_PREVIEW_CHARS).collect::<String>()))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Given these insurance claim details:\n{details}\n\n\
         And these policy clauses:\n{clauses}\n\n\
         Determine if the claim is approved or rejected and explain why."
    )
}
