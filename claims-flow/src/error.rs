use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::FieldIssue;

/// Why a turn stopped early. Attached to the turn result, never raised past it.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnError {
    #[error("intent classification failed: {detail}")]
    Classification { detail: String },

    #[error("claim field extraction failed: {detail}")]
    Extraction { detail: String },

    #[error("query generation failed: {detail}")]
    Generation { detail: String },

    #[error("request cannot be answered with a query: {message}")]
    InvalidRequest { message: String },

    #[error("claims API rejected fields: {}", describe_issues(.fields))]
    FieldValidation { fields: Vec<FieldIssue> },

    #[error("generated query rejected: {reason}")]
    QueryValidation { sql: String, reason: String },

    #[error("query execution failed: {detail}")]
    Execution { sql: String, detail: String },

    #[error("claim submission failed: {detail}")]
    Submission { detail: String },

    #[error("internal pipeline fault: {detail}")]
    Internal { detail: String },
}

impl TurnError {
    /// Short sentence shown to the user
    pub fn user_message(&self) -> String {
        match self {
            TurnError::Classification { .. } => {
                "Sorry, I couldn't work out what you want to do. Could you rephrase your request?"
                    .to_string()
            }
            TurnError::Extraction { .. } => {
                "Sorry, I couldn't read the claim details from your message. Could you rephrase it?"
                    .to_string()
            }
            TurnError::Generation { .. } => {
                "Sorry, I couldn't generate a query for that request. Please try rephrasing it."
                    .to_string()
            }
            TurnError::InvalidRequest { message } => {
                format!("Sorry, I couldn't generate a query for that request: {message}")
            }
            TurnError::FieldValidation { fields } => format!(
                "The claims API rejected the claim. Invalid fields: {}.",
                describe_issues(fields)
            ),
            TurnError::QueryValidation { reason, .. } => format!(
                "I generated an SQL query, but it failed validation: {reason}. Please try rephrasing your request."
            ),
            TurnError::Execution { detail, .. } => {
                format!("I generated a valid query, but it failed to execute: {detail}")
            }
            TurnError::Submission { .. } => {
                "Sorry, there was an error submitting the claim to the API.".to_string()
            }
            TurnError::Internal { .. } => {
                "Sorry, an unexpected error occurred while processing your request.".to_string()
            }
        }
    }

    /// Whether this points at a contract violation rather than bad input
    pub fn is_fault(&self) -> bool {
        matches!(self, TurnError::Internal { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TurnError::Classification { .. } => "classification",
            TurnError::Extraction { .. } => "extraction",
            TurnError::Generation { .. } => "generation",
            TurnError::InvalidRequest { .. } => "invalid_request",
            TurnError::FieldValidation { .. } => "field_validation",
            TurnError::QueryValidation { .. } => "query_validation",
            TurnError::Execution { .. } => "execution",
            TurnError::Submission { .. } => "submission",
            TurnError::Internal { .. } => "internal",
        }
    }
}

fn describe_issues(fields: &[FieldIssue]) -> String {
    if fields.is_empty() {
        return "no field details provided".to_string();
    }
    fields
        .iter()
        .map(|issue| format!("{} ({})", issue.field(), issue.msg))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors of the session layer around the pipeline
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Orchestrator is missing its {0}")]
    MissingComponent(&'static str),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, FlowError>;
