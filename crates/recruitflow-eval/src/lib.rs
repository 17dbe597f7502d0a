//! The evaluation adapter: serialises a call transcript and the position's
//! qualification criteria to an LLM, tolerates malformed JSON, prevents
//! duplicate scoring, and dispatches the outcome-specific transition.

pub mod anthropic;
pub mod db;
pub mod error;
pub mod evaluation;
pub mod json_repair;
pub mod provider;
pub mod types;

pub use anthropic::AnthropicProvider;
pub use db::init_db;
pub use error::{EvalError, Result};
pub use evaluation::evaluate_call;
pub use provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};
pub use types::{CriterionResult, Evaluation, EvaluationOutcome, EvaluationResponse};
