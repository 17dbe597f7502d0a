use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationOutcome {
    Qualified,
    NotQualified,
    CallbackRequested,
    NeedsHuman,
}

impl EvaluationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationOutcome::Qualified => "qualified",
            EvaluationOutcome::NotQualified => "not_qualified",
            EvaluationOutcome::CallbackRequested => "callback_requested",
            EvaluationOutcome::NeedsHuman => "needs_human",
        }
    }
}

impl std::fmt::Display for EvaluationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EvaluationOutcome {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "qualified" => EvaluationOutcome::Qualified,
            "not_qualified" => EvaluationOutcome::NotQualified,
            "callback_requested" => EvaluationOutcome::CallbackRequested,
            "needs_human" => EvaluationOutcome::NeedsHuman,
            other => return Err(other.to_string()),
        })
    }
}

/// One LLM scoring result (spec §3 — Evaluation). At most one per Call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: i64,
    pub application_id: i64,
    pub call_id: i64,
    pub outcome: EvaluationOutcome,
    pub qualified: bool,
    pub score: i32,
    pub reasoning: String,
    pub callback_requested: bool,
    pub callback_notes: Option<String>,
    pub callback_at: Option<String>,
    pub needs_human: bool,
    pub needs_human_notes: Option<String>,
    pub raw_response: String,
    pub evaluated_at: String,
}

/// The parsed LLM response body, before it becomes an `Evaluation` row.
#[derive(Debug, Clone, Deserialize)]
pub struct EvaluationResponse {
    pub outcome: String,
    pub qualified: bool,
    pub score: i32,
    pub reasoning: String,
    #[serde(default)]
    pub criteria: Vec<CriterionResult>,
    #[serde(default)]
    pub disqualifying_factor: Option<String>,
    #[serde(default)]
    pub callback_requested: bool,
    #[serde(default)]
    pub callback_notes: Option<String>,
    #[serde(default)]
    pub needs_human: bool,
    #[serde(default)]
    pub needs_human_notes: Option<String>,
    #[serde(default)]
    pub callback_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CriterionResult {
    pub name: String,
    pub passed: bool,
    #[serde(default)]
    pub note: Option<String>,
}
