//! JSON Schema backed response validator.

use jsonschema::JSONSchema;
use serde_json::Value;

use super::error::{SchemaRejection, SchemaViolation};
use super::SchemaValidator;
use crate::{Error, ErrorContext, Result};

/// Validates decoded response bodies against a compiled JSON Schema.
pub struct JsonSchemaValidator {
    compiled: JSONSchema,
}

impl JsonSchemaValidator {
    /// Compile a schema; an invalid schema is a configuration error.
    pub fn new(schema: &Value) -> Result<Self> {
        let compiled = JSONSchema::compile(schema).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid JSON schema: {}", e),
                ErrorContext::new()
                    .with_field_path("request.schema")
                    .with_source("json_schema_validator"),
            )
        })?;
        Ok(Self { compiled })
    }
}

impl SchemaValidator for JsonSchemaValidator {
    fn validate(&self, value: &Value) -> std::result::Result<(), SchemaRejection> {
        match self.compiled.validate(value) {
            Ok(()) => Ok(()),
            Err(errors) => {
                let violations = errors
                    .map(|e| SchemaViolation::at(e.to_string(), e.instance_path.to_string()))
                    .collect();
                Err(SchemaRejection { violations })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn widget_list_schema() -> Value {
        json!({
            "type": "array",
            "items": {
                "type": "object",
                "properties": {"id": {"type": "string"}},
                "required": ["id"]
            }
        })
    }

    #[test]
    fn accepts_matching_value() {
        let validator = JsonSchemaValidator::new(&widget_list_schema()).unwrap();
        assert!(validator.validate(&json!([{"id": "w1"}])).is_ok());
    }

    #[test]
    fn reports_violation_path() {
        let validator = JsonSchemaValidator::new(&widget_list_schema()).unwrap();
        let rejection = validator.validate(&json!([{"id": "w1"}, {"id": 2}])).unwrap_err();
        assert_eq!(rejection.violations.len(), 1);
        assert_eq!(rejection.violations[0].path.as_deref(), Some("/1/id"));
    }

    #[test]
    fn invalid_schema_is_configuration_error() {
        let err = JsonSchemaValidator::new(&json!({"type": 12})).err().unwrap();
        assert!(matches!(err, Error::Configuration { .. }));
    }
}
