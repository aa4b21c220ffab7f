//! Structured outputs the agent is asked to produce.
//!
//! Each output type derives [`JsonSchema`]; the rendered schema is passed to
//! the CLI with `--json-schema` and the terminal payload is decoded back into
//! the same type, so the two can never drift apart.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AgentError;

/// Upper bound on clarification questions per turn.
pub const MAX_QUESTIONS: usize = 5;

/// A typed, schema-checked terminal payload.
pub trait OutputSchema: DeserializeOwned + JsonSchema {
    /// Name used in error messages.
    const NAME: &'static str;

    /// Constraints the JSON schema cannot express through serde alone.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    /// The schema as compact JSON, ready for the command line.
    fn schema_argument() -> Result<String, AgentError> {
        let mut schema = serde_json::to_value(schemars::schema_for!(Self)).map_err(|e| {
            AgentError::Schema {
                schema: Self::NAME,
                reason: e.to_string(),
            }
        })?;

        let object = schema.as_object_mut().ok_or(AgentError::Schema {
            schema: Self::NAME,
            reason: "schema root is not an object".to_string(),
        })?;
        object.remove("$schema");
        object.remove("$defs");
        object.insert("additionalProperties".to_string(), Value::Bool(false));

        serde_json::to_string(&schema).map_err(|e| AgentError::Schema {
            schema: Self::NAME,
            reason: e.to_string(),
        })
    }

    /// Deserialize and validate a structured payload.
    fn decode(value: Value) -> Result<Self, AgentError> {
        let decoded: Self =
            serde_json::from_value(value).map_err(|e| AgentError::SchemaViolation {
                schema: Self::NAME,
                reason: e.to_string(),
            })?;
        decoded
            .validate()
            .map_err(|reason| AgentError::SchemaViolation {
                schema: Self::NAME,
                reason,
            })?;
        Ok(decoded)
    }
}

/// Result of a clarification turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ClarificationOutput {
    #[schemars(
        description = "Clarifying questions for the user, at most 5. Empty when the request is clear enough to write the spec.",
        length(max = 5)
    )]
    pub questions: Vec<String>,
}

impl OutputSchema for ClarificationOutput {
    const NAME: &'static str = "clarification";

    fn validate(&self) -> Result<(), String> {
        if self.questions.len() > MAX_QUESTIONS {
            return Err(format!(
                "expected at most {} questions, got {}",
                MAX_QUESTIONS,
                self.questions.len()
            ));
        }
        Ok(())
    }
}

/// Result of a drafting or revision turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SpecOutput {
    #[schemars(description = "The complete specification as Markdown.")]
    pub spec: String,
}

impl OutputSchema for SpecOutput {
    const NAME: &'static str = "spec";

    fn validate(&self) -> Result<(), String> {
        if self.spec.trim().is_empty() {
            return Err("spec is empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema_value<T: OutputSchema>() -> Value {
        serde_json::from_str(&T::schema_argument().unwrap()).unwrap()
    }

    #[test]
    fn clarification_schema_shape() {
        let schema = schema_value::<ClarificationOutput>();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["additionalProperties"], false);
        assert_eq!(schema["required"], json!(["questions"]));
        assert_eq!(schema["properties"]["questions"]["type"], "array");
        assert_eq!(schema["properties"]["questions"]["maxItems"], 5);
        assert!(schema.get("$schema").is_none());
    }

    #[test]
    fn spec_schema_shape() {
        let schema = schema_value::<SpecOutput>();
        assert_eq!(schema["properties"]["spec"]["type"], "string");
        assert_eq!(schema["required"], json!(["spec"]));
    }

    #[test]
    fn decode_clarification() {
        let out = ClarificationOutput::decode(json!({"questions": ["Which DB?"]})).unwrap();
        assert_eq!(out.questions, vec!["Which DB?"]);

        let empty = ClarificationOutput::decode(json!({"questions": []})).unwrap();
        assert!(empty.questions.is_empty());
    }

    #[test]
    fn too_many_questions_is_a_violation() {
        let err = ClarificationOutput::decode(json!({
            "questions": ["1", "2", "3", "4", "5", "6"]
        }))
        .unwrap_err();
        assert!(matches!(
            err,
            AgentError::SchemaViolation { schema: "clarification", .. }
        ));
    }

    #[test]
    fn wrong_shape_is_a_violation() {
        assert!(matches!(
            ClarificationOutput::decode(json!({"questions": "nope"})),
            Err(AgentError::SchemaViolation { .. })
        ));
        assert!(matches!(
            SpecOutput::decode(json!({"spec": "x", "extra": 1})),
            Err(AgentError::SchemaViolation { .. })
        ));
    }

    #[test]
    fn blank_spec_is_a_violation() {
        assert!(matches!(
            SpecOutput::decode(json!({"spec": "  \n"})),
            Err(AgentError::SchemaViolation { schema: "spec", .. })
        ));
        assert_eq!(
            SpecOutput::decode(json!({"spec": "# Spec"})).unwrap().spec,
            "# Spec"
        );
    }
}
