//! Request validation against a model's Input schema.
//!
//! Runs before dispatch so missing and unknown fields are reported with the
//! pydantic `detail` shape that FastAPI clients already understand.

use std::collections::HashSet;

use apiforge_schema::ModelDefinition;
use serde_json::{Value, json};

/// A single validation error for one field.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Field name (`loc[1]` in the response).
    pub field: String,
    pub msg: String,
    /// Error type string (e.g. "value_error.missing").
    pub error_type: String,
}

impl ValidationError {
    pub fn to_detail(&self) -> Value {
        json!({
            "loc": ["body", self.field],
            "msg": self.msg,
            "type": self.error_type,
        })
    }
}

/// `{"detail": [...]}` body for a 422 response.
pub fn detail_body(errors: &[ValidationError]) -> Value {
    json!({ "detail": errors.iter().map(ValidationError::to_detail).collect::<Vec<_>>() })
}

/// Compiled validator for one Input record.
pub struct InputValidator {
    validator: jsonschema::Validator,
    properties: HashSet<String>,
    required: Vec<String>,
}

impl std::fmt::Debug for InputValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputValidator")
            .field("properties", &self.properties.len())
            .field("required", &self.required)
            .finish()
    }
}

impl InputValidator {
    pub fn for_model(model: &ModelDefinition) -> Result<Self, String> {
        Self::from_schema(&model.input_json_schema())
    }

    /// Compile an object schema, rejecting properties it does not declare.
    pub fn from_schema(input_schema: &Value) -> Result<Self, String> {
        let properties: HashSet<String> = input_schema
            .get("properties")
            .and_then(|p| p.as_object())
            .map(|obj| obj.keys().cloned().collect())
            .unwrap_or_default();

        let required: Vec<String> = input_schema
            .get("required")
            .and_then(|r| r.as_array())
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        let mut resolved = input_schema.clone();
        if let Some(obj) = resolved.as_object_mut() {
            obj.insert("additionalProperties".to_string(), Value::Bool(false));
        }

        let validator = jsonschema::validator_for(&resolved).map_err(|e| e.to_string())?;

        Ok(Self {
            validator,
            properties,
            required,
        })
    }

    pub fn required_count(&self) -> usize {
        self.required.len()
    }

    /// Validate a request body.
    ///
    /// Missing and unknown fields produce one entry each; other failures are
    /// reported against the offending field, or `__root__` for the body.
    pub fn validate(&self, input: &Value) -> Result<(), Vec<ValidationError>> {
        if self.validator.validate(input).is_ok() {
            return Ok(());
        }

        let mut errors = Vec::new();
        let mut seen_required = false;
        let mut seen_additional = false;

        for error in self.validator.iter_errors(input) {
            let msg = error.to_string();

            if msg.contains("is a required property") {
                if !seen_required {
                    seen_required = true;
                    let input_obj = input.as_object();
                    for field in &self.required {
                        if !input_obj.is_some_and(|obj| obj.contains_key(field)) {
                            errors.push(ValidationError {
                                field: field.clone(),
                                msg: "Field required".to_string(),
                                error_type: "value_error.missing".to_string(),
                            });
                        }
                    }
                }
                continue;
            }

            if msg.contains("Additional properties") {
                if !seen_additional {
                    seen_additional = true;
                    if let Some(input_obj) = input.as_object() {
                        for key in input_obj.keys() {
                            if !self.properties.contains(key) {
                                errors.push(ValidationError {
                                    field: key.clone(),
                                    msg: format!("Unexpected field '{key}'"),
                                    error_type: "value_error.extra".to_string(),
                                });
                            }
                        }
                    }
                }
                continue;
            }

            let path = error.instance_path().to_string();
            let field = path.trim_start_matches('/');
            errors.push(ValidationError {
                field: if field.is_empty() {
                    "__root__".to_string()
                } else {
                    field.to_string()
                },
                msg,
                error_type: "value_error".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
