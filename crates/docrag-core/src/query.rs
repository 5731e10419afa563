//! Structured claim query.
//!
//! Every field is independently optional; parsers fill what they can find.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    Days,
    Weeks,
    Months,
    Years,
}

impl DurationUnit {
    /// Accepts singular or plural English unit names, any case.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().trim_end_matches('s') {
            "day" => Some(Self::Days),
            "week" => Some(Self::Weeks),
            "month" => Some(Self::Months),
            "year" => Some(Self::Years),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Days => "days",
            Self::Weeks => "weeks",
            Self::Months => "months",
            Self::Years => "years",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Gender::Male => "male",
            Gender::Female => "female",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDuration {
    pub value: u32,
    pub unit: DurationUnit,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub procedure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_duration: Option<PolicyDuration>,
}

impl StructuredQuery {
    pub fn is_empty(&self) -> bool {
        self.age.is_none()
            && self.gender.is_none()
            && self.procedure.is_none()
            && self.location.is_none()
            && self.policy_duration.is_none()
    }

    /// Present fields as `name: value` pairs, in declaration order.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        if let Some(age) = self.age {
            out.push(("age", age.to_string()));
        }
        if let Some(gender) = self.gender {
            out.push(("gender", gender.to_string()));
        }
        if let Some(procedure) = self.procedure.as_deref().filter(|s| !s.is_empty()) {
            out.push(("procedure", procedure.to_string()));
        }
        if let Some(location) = self.location.as_deref().filter(|s| !s.is_empty()) {
            out.push(("location", location.to_string()));
        }
        out
    }

    /// Text used to search the index for clauses relevant to this query,
    /// e.g. `age: 46 gender: male procedure: knee surgery policy duration: 3 months`.
    pub fn to_search_text(&self) -> String {
        let mut parts: Vec<String> = self.fields().into_iter().map(|(k, v)| format!("{k}: {v}")).collect();
        if let Some(d) = self.policy_duration {
            parts.push(format!("policy duration: {} {}", d.value, d.unit.as_str()));
        }
        parts.join(" ")
    }
}
