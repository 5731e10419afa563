use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use docrag_core::query::{DurationUnit, Gender, PolicyDuration, StructuredQuery};

use crate::TextGenerator;

const PROCEDURE_KINDS: [&str; 4] = ["surgery", "operation", "procedure", "treatment"];
const KNOWN_CITIES: [&str; 6] = ["pune", "mumbai", "delhi", "bangalore", "kolkata", "chennai"];
/// Characters of lead-in kept before a procedure keyword.
const PROCEDURE_LEAD_IN: usize = 20;

static PATTERNS: OnceLock<QueryPatterns> = OnceLock::new();

struct QueryPatterns {
    age: Regex,
    gender_token: Regex,
    duration: Regex,
}

impl QueryPatterns {
    fn new() -> Self {
        Self {
            age: Regex::new(r"(\d+)(?:[- ]?years?[- ]?old|\s*M|\s*F)").expect("age regex must compile"),
            gender_token: Regex::new(r"\b\d*([MF])\b").expect("gender regex must compile"),
            duration: Regex::new(r"(\d+)[ -]?(day|week|month|year)s?[ -]?(?:old )?policy")
                .expect("duration regex must compile"),
        }
    }
}

fn patterns() -> &'static QueryPatterns {
    PATTERNS.get_or_init(QueryPatterns::new)
}

/// Turns a free-text claim query ("46M, knee surgery in Pune, 3-month policy")
/// into a [`StructuredQuery`].
#[derive(Debug, Default, Clone, Copy)]
pub struct QueryParser;

impl QueryParser {
    pub fn new() -> Self {
        Self
    }

    /// Ask `generator` first when one is supplied; fall back to the rules
    /// when it fails or returns nothing usable.
    pub fn parse(&self, query: &str, generator: Option<&dyn TextGenerator>) -> StructuredQuery {
        if let Some(generator) = generator {
            match generator.generate(&extraction_prompt(query)) {
                Ok(output) => {
                    if let Some(parsed) = from_model_output(&output) {
                        debug!(?parsed, "query parsed by generator");
                        return parsed;
                    }
                    debug!("generator output unusable; using rules");
                }
                Err(e) => warn!(error = %e, "query extraction failed; using rules"),
            }
        }
        self.parse_rules(query)
    }

    pub fn parse_rules(&self, query: &str) -> StructuredQuery {
        let p = patterns();
        let lower = query.to_ascii_lowercase();

        let age = p.age.captures(query).and_then(|c| c[1].parse().ok());
        let gender = if lower.contains("female") {
            Some(Gender::Female)
        } else if lower.contains("male") {
            Some(Gender::Male)
        } else {
            p.gender_token.captures(query).map(|c| if &c[1] == "F" { Gender::Female } else { Gender::Male })
        };
        let location = KNOWN_CITIES.iter().find(|city| lower.contains(*city)).map(|city| title_case(city));
        let policy_duration = p.duration.captures(&lower).and_then(|c| {
            Some(PolicyDuration { value: c[1].parse().ok()?, unit: DurationUnit::parse(&c[2])? })
        });

        StructuredQuery { age, gender, procedure: procedure(query, &lower), location, policy_duration }
    }
}

fn extraction_prompt(query: &str) -> String {
    format!(
        "Extract structured information from this insurance query:\n\"{query}\"\n\n\
         Return JSON with the keys age, gender, procedure, location and \
         policy_duration (an object with value and unit)."
    )
}

/// `lower` must be the ASCII-lowercased `query` so byte offsets line up.
fn procedure(query: &str, lower: &str) -> Option<String> {
    let (idx, kind) = PROCEDURE_KINDS.iter().find_map(|kind| lower.find(kind).map(|i| (i, *kind)))?;
    let cut = idx.saturating_sub(PROCEDURE_LEAD_IN);
    let start = lower.as_bytes()[..cut].iter().rposition(|&b| b == b' ').unwrap_or(0);
    let lead = query[start..idx].trim();
    Some(if lead.is_empty() { kind.to_string() } else { format!("{lead} {kind}") })
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Take the outermost `{...}` span of `output` and read whatever fields it
/// holds. `None` when there is no object or it yields no field.
fn from_model_output(output: &str) -> Option<StructuredQuery> {
    let open = output.find('{')?;
    let close = output.rfind('}')?;
    if close <= open {
        return None;
    }
    let value: Value = serde_json::from_str(&output[open..=close]).ok()?;
    let obj = value.as_object()?;

    let query = StructuredQuery {
        age: obj.get("age").and_then(as_u32),
        gender: obj.get("gender").and_then(Value::as_str).and_then(parse_gender),
        procedure: obj.get("procedure").and_then(non_empty_str),
        location: obj.get("location").and_then(non_empty_str),
        policy_duration: obj.get("policy_duration").and_then(parse_duration),
    };
    (!query.is_empty()).then_some(query)
}

fn as_u32(v: &Value) -> Option<u32> {
    match v {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn non_empty_str(v: &Value) -> Option<String> {
    v.as_str().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn parse_gender(s: &str) -> Option<Gender> {
    match s.trim().to_ascii_lowercase().as_str() {
        "female" | "f" | "woman" => Some(Gender::Female),
        "male" | "m" | "man" => Some(Gender::Male),
        _ => None,
    }
}

/// Accepts `{"value": 3, "unit": "months"}` or `"3 months"`.
fn parse_duration(v: &Value) -> Option<PolicyDuration> {
    match v {
        Value::Object(obj) => Some(PolicyDuration {
            value: obj.get("value").and_then(as_u32)?,
            unit: obj.get("unit").and_then(Value::as_str).and_then(DurationUnit::parse)?,
        }),
        Value::String(s) => {
            let mut parts = s.split(|c: char| c.is_whitespace() || c == '-').filter(|p| !p.is_empty());
            let value = parts.next()?.parse().ok()?;
            let unit = DurationUnit::parse(parts.next()?)?;
            Some(PolicyDuration { value, unit })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn procedure_keeps_short_lead_in() {
        let q = "Claim for a 46-year-old male who needs knee surgery";
        assert_eq!(procedure(q, &q.to_ascii_lowercase()).as_deref(), Some("male who needs knee surgery"));
    }

    #[test]
    fn procedure_at_start_has_no_lead_in() {
        assert_eq!(procedure("Surgery needed", "surgery needed").as_deref(), Some("surgery"));
    }

    #[test]
    fn model_json_is_read_leniently() {
        let out = r#"Sure: {"age": "46", "gender": "M", "policy_duration": "3 months"} done"#;
        let q = from_model_output(out).expect("parsed");
        assert_eq!(q.age, Some(46));
        assert_eq!(q.gender, Some(Gender::Male));
        assert_eq!(q.policy_duration, Some(PolicyDuration { value: 3, unit: DurationUnit::Months }));
    }

    #[test]
    fn empty_or_missing_objects_are_unusable() {
        assert!(from_model_output("no json here").is_none());
        assert!(from_model_output("{}").is_none());
        assert!(from_model_output(r#"{"unrelated": 1}"#).is_none());
        assert!(from_model_output("} backwards {").is_none());
    }
}
