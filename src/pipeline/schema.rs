//! Closed-schema validation of classifier output.
//!
//! The classifier is untrusted. Its JSON is checked against a schema that
//! rejects missing fields, wrong types, out-of-enum values and any extra
//! property before it is deserialized into a [`Decision`]. Nothing is
//! coerced.

use std::sync::LazyLock;

use jsonschema::error::ValidationErrorKind;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{ClassifyError, ConfigError};
use crate::pipeline::types::Decision;

static DECISION_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "type": "object",
        "required": ["action", "confidence", "reason", "job", "event"],
        "additionalProperties": false,
        "properties": {
            "action": {
                "type": "string",
                "enum": ["CREATE_JOB", "UPDATE_JOB", "ADD_EVENT", "IGNORE", "NEEDS_REVIEW"]
            },
            "confidence": { "type": "number", "minimum": 0, "maximum": 1 },
            "reason": { "type": "string" },
            "job": {
                "type": "object",
                "required": ["match", "createIfMissing", "newJob"],
                "additionalProperties": false,
                "properties": {
                    "match": {
                        "type": "object",
                        "required": ["threadId", "jobId"],
                        "additionalProperties": false,
                        "properties": {
                            "threadId": { "type": ["string", "null"] },
                            "jobId": { "type": ["string", "null"] }
                        }
                    },
                    "createIfMissing": { "type": "boolean" },
                    "newJob": {
                        "type": "object",
                        "required": ["company", "role", "source"],
                        "additionalProperties": false,
                        "properties": {
                            "company": { "type": ["string", "null"] },
                            "role": { "type": ["string", "null"] },
                            "source": { "type": "string" }
                        }
                    }
                }
            },
            "event": {
                "type": "object",
                "required": ["shouldCreate", "type", "summary", "stageSuggestion"],
                "additionalProperties": false,
                "properties": {
                    "shouldCreate": { "type": "boolean" },
                    "type": {
                        "type": ["string", "null"],
                        "enum": [
                            "ApplicationConfirmation", "AssessmentInvite", "InterviewInvite",
                            "Rejection", "Offer", "Update", null
                        ]
                    },
                    "summary": { "type": ["string", "null"] },
                    "stageSuggestion": {
                        "type": ["string", "null"],
                        "enum": ["Applied", "Assessment", "Interview", "Offer", "Rejected", null]
                    }
                }
            }
        }
    })
});

/// Category of a schema violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    MissingField,
    WrongType,
    NotInEnum,
    UnexpectedField,
    OutOfRange,
    Other,
}

/// One reason a decision was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// JSON pointer to the offending location (`""` is the root).
    pub path: String,
    pub kind: ViolationKind,
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        write!(f, "{path}: {}", self.message)
    }
}

/// Compiled decision schema. Build once, reuse for every email.
pub struct DecisionValidator {
    validator: jsonschema::Validator,
}

impl DecisionValidator {
    pub fn new() -> Result<Self, ConfigError> {
        let validator =
            jsonschema::validator_for(&DECISION_SCHEMA).map_err(|e| ConfigError::InvalidValue {
                key: "decision_schema".into(),
                message: e.to_string(),
            })?;
        Ok(Self { validator })
    }

    /// Check `instance` and collect every violation.
    pub fn validate(&self, instance: &Value) -> Result<(), Vec<Violation>> {
        let violations: Vec<Violation> = self
            .validator
            .iter_errors(instance)
            .map(|e| {
                let mut path = e.instance_path.to_string();
                let kind = match &e.kind {
                    ValidationErrorKind::Required { property } => {
                        if let Some(name) = property.as_str() {
                            path = format!("{path}/{name}");
                        }
                        ViolationKind::MissingField
                    }
                    ValidationErrorKind::Type { .. } => ViolationKind::WrongType,
                    ValidationErrorKind::Enum { .. } => ViolationKind::NotInEnum,
                    ValidationErrorKind::AdditionalProperties { .. } => {
                        ViolationKind::UnexpectedField
                    }
                    ValidationErrorKind::Minimum { .. } | ValidationErrorKind::Maximum { .. } => {
                        ViolationKind::OutOfRange
                    }
                    _ => ViolationKind::Other,
                };
                Violation {
                    path,
                    kind,
                    message: e.to_string(),
                }
            })
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    /// Validate, then deserialize into a typed [`Decision`].
    pub fn parse(&self, instance: Value) -> Result<Decision, ClassifyError> {
        self.validate(&instance).map_err(ClassifyError::Invalid)?;
        serde_json::from_value(instance).map_err(|e| {
            ClassifyError::Invalid(vec![Violation {
                path: String::new(),
                kind: ViolationKind::Other,
                message: e.to_string(),
            }])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Stage;
    use crate::pipeline::types::Action;

    fn valid() -> Value {
        json!({
            "action": "CREATE_JOB",
            "confidence": 0.92,
            "reason": "Application confirmation from Acme",
            "job": {
                "match": { "threadId": "T1", "jobId": null },
                "createIfMissing": true,
                "newJob": { "company": "Acme", "role": "SWE", "source": "Email" }
            },
            "event": {
                "shouldCreate": true,
                "type": "ApplicationConfirmation",
                "summary": "Thanks for applying",
                "stageSuggestion": "Applied"
            }
        })
    }

    fn violations(value: Value) -> Vec<Violation> {
        DecisionValidator::new()
            .unwrap()
            .validate(&value)
            .unwrap_err()
    }

    #[test]
    fn valid_decision_parses() {
        let decision = DecisionValidator::new().unwrap().parse(valid()).unwrap();
        assert_eq!(decision.action, Action::CreateJob);
        assert_eq!(decision.event.stage_suggestion, Some(Stage::Applied));
        assert_eq!(decision.job.new_job.company.as_deref(), Some("Acme"));
    }

    #[test]
    fn all_nullables_null_is_valid() {
        let mut v = valid();
        v["job"]["match"]["threadId"] = Value::Null;
        v["job"]["newJob"]["company"] = Value::Null;
        v["job"]["newJob"]["role"] = Value::Null;
        v["event"]["type"] = Value::Null;
        v["event"]["summary"] = Value::Null;
        v["event"]["stageSuggestion"] = Value::Null;
        assert!(DecisionValidator::new().unwrap().validate(&v).is_ok());
    }

    #[test]
    fn missing_required_field_reported_with_path() {
        let mut v = valid();
        v["event"].as_object_mut().unwrap().remove("shouldCreate");
        let errs = violations(v);
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].kind, ViolationKind::MissingField);
        assert_eq!(errs[0].path, "/event/shouldCreate");
    }

    #[test]
    fn out_of_enum_action_rejected() {
        let mut v = valid();
        v["action"] = json!("DELETE_JOB");
        let errs = violations(v);
        assert!(errs.iter().any(|e| e.kind == ViolationKind::NotInEnum && e.path == "/action"));
    }

    #[test]
    fn accepted_is_not_a_suggestible_stage() {
        let mut v = valid();
        v["event"]["stageSuggestion"] = json!("Accepted");
        let errs = violations(v);
        assert!(errs.iter().any(|e| e.kind == ViolationKind::NotInEnum));
    }

    #[test]
    fn extra_property_rejected_at_any_depth() {
        let mut v = valid();
        v["job"]["newJob"]["location"] = json!("Remote");
        let errs = violations(v);
        assert!(errs.iter().any(|e| e.kind == ViolationKind::UnexpectedField));

        let mut v = valid();
        v["notes"] = json!("extra");
        let errs = violations(v);
        assert!(errs.iter().any(|e| e.kind == ViolationKind::UnexpectedField));
    }

    #[test]
    fn wrong_type_is_not_coerced() {
        let mut v = valid();
        v["job"]["createIfMissing"] = json!("true");
        let errs = violations(v);
        assert!(errs.iter().any(|e| e.kind == ViolationKind::WrongType));
    }

    #[test]
    fn confidence_outside_unit_interval_rejected() {
        let mut v = valid();
        v["confidence"] = json!(1.5);
        let errs = violations(v);
        assert!(errs.iter().any(|e| e.kind == ViolationKind::OutOfRange));
    }

    #[test]
    fn every_violation_is_collected() {
        let v = json!({ "action": "NOPE", "confidence": -1 });
        let errs = violations(v);
        // reason, job, event missing + bad enum + below minimum
        assert!(errs.len() >= 5);
    }

    #[test]
    fn parse_surfaces_violations() {
        let mut v = valid();
        v["event"]["type"] = json!("Ghosted");
        match DecisionValidator::new().unwrap().parse(v) {
            Err(ClassifyError::Invalid(errs)) => assert!(!errs.is_empty()),
            other => panic!("Expected Invalid, got {:?}", other),
        }
    }
}
