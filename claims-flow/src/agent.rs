//! Structured agent port.
//!
//! An agent takes free text and returns a value of a named schema, or fails.
//! Model-backed agents rarely hand back a typed value, so the port result is an
//! explicit [`AgentOutput`] that is normalized in one place per schema.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::models::{Intent, PartialClaim, QueryPlan};

/// A schema an agent can be asked to produce
pub trait AgentSchema: DeserializeOwned + Send + 'static {
    const NAME: &'static str;
}

impl AgentSchema for Intent {
    const NAME: &'static str = "Intent";
}

impl AgentSchema for PartialClaim {
    const NAME: &'static str = "PartialClaim";
}

impl AgentSchema for QueryPlan {
    const NAME: &'static str = "QueryPlan";
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent call failed: {0}")]
    Call(String),

    #[error("agent output does not match {schema}: {reason}")]
    Shape { schema: &'static str, reason: String },
}

/// Raw result of an agent call, before normalization
#[derive(Debug, Clone)]
pub enum AgentOutput<T> {
    /// Encoded text, usually JSON, possibly wrapped in a Markdown code fence
    Raw(String),
    /// Loosely typed mapping
    Mapping(Value),
    /// Already the target schema
    Typed(T),
}

impl<T: AgentSchema> AgentOutput<T> {
    pub fn normalize(self) -> Result<T, AgentError> {
        match self {
            AgentOutput::Typed(value) => Ok(value),
            AgentOutput::Raw(raw) => {
                let cleaned = strip_code_fence(&raw);
                if cleaned.is_empty() {
                    return Err(shape_error::<T>("empty response".to_string()));
                }
                serde_json::from_str(cleaned)
                    .map_err(|e| shape_error::<T>(format!("{e}. Raw response: {raw}")))
            }
            AgentOutput::Mapping(value @ Value::Object(_)) => {
                serde_json::from_value(value).map_err(|e| shape_error::<T>(e.to_string()))
            }
            AgentOutput::Mapping(other) => Err(shape_error::<T>(format!(
                "expected a mapping, found {}",
                json_kind(&other)
            ))),
        }
    }
}

fn shape_error<T: AgentSchema>(reason: String) -> AgentError {
    AgentError::Shape {
        schema: T::NAME,
        reason,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Removes a surrounding ```json ... ``` fence, if any
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Text-to-structure capability
#[async_trait]
pub trait StructuredAgent<T: AgentSchema>: Send + Sync {
    async fn run(&self, prompt: &str) -> Result<AgentOutput<T>, AgentError>;
}

/// Calls the agent and normalizes its output into `T`
pub async fn run_structured<T: AgentSchema>(
    agent: &dyn StructuredAgent<T>,
    prompt: &str,
) -> Result<T, AgentError> {
    agent.run(prompt).await?.normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IntentAction;
    use serde_json::json;

    #[test]
    fn test_normalize_raw_json() {
        let output: AgentOutput<Intent> =
            AgentOutput::Raw(r#"{"action": "retrieve", "query_details": "adjuster Ryan Cooper"}"#.into());
        let intent = output.normalize().unwrap();
        assert_eq!(intent.action, IntentAction::Retrieve);
        assert_eq!(intent.query_filter(), Some("adjuster Ryan Cooper"));
    }

    #[test]
    fn test_normalize_fenced_json() {
        let output: AgentOutput<Intent> =
            AgentOutput::Raw("```json\n{\"action\": \"create\", \"query_details\": null}\n```".into());
        assert_eq!(output.normalize().unwrap().action, IntentAction::Create);
    }

    #[test]
    fn test_normalize_mapping_and_typed() {
        let mapped: AgentOutput<PartialClaim> =
            AgentOutput::Mapping(json!({ "point_of_impact": "front bumper" }));
        assert_eq!(
            mapped.normalize().unwrap().point_of_impact.as_deref(),
            Some("front bumper")
        );

        let typed = AgentOutput::Typed(Intent::new(IntentAction::Unknown, None));
        assert_eq!(typed.normalize().unwrap().action, IntentAction::Unknown);
    }

    #[test]
    fn test_normalize_rejects_wrong_shapes() {
        let prose: AgentOutput<Intent> = AgentOutput::Raw("I think you want to create a claim".into());
        assert!(matches!(
            prose.normalize(),
            Err(AgentError::Shape { schema: "Intent", .. })
        ));

        let list: AgentOutput<Intent> = AgentOutput::Mapping(json!(["create"]));
        let err = list.normalize().unwrap_err();
        assert!(err.to_string().contains("found an array"));

        let bad_action: AgentOutput<Intent> = AgentOutput::Mapping(json!({ "action": "delete" }));
        assert!(bad_action.normalize().is_err());

        let empty: AgentOutput<QueryPlan> = AgentOutput::Raw("   ".into());
        assert!(empty.normalize().is_err());
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  {}  "), "{}");
    }
}
