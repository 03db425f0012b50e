//! Error types for the progress core

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("Unknown badge requirement type: {0}")]
    UnknownRequirement(String),
    #[error("Requirement value for {kind} must be non-negative, got {value}")]
    NegativeRequirement { kind: String, value: i64 },
    #[error("Invalid calendar date '{0}' (expected YYYY-MM-DD)")]
    InvalidDate(String),
    #[error("Malformed suggestion payload: {0}")]
    MalformedSuggestions(String),
}
