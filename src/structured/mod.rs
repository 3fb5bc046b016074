//! Optional response schema validation.
//!
//! The executor treats validators as opaque: anything implementing
//! [`SchemaValidator`] can be attached per call. A rejection surfaces as a
//! `Decode` error, never as an HTTP error.
//!
//! # Examples
//!
//! ```
//! use resilient_client::structured::{JsonSchemaValidator, SchemaValidator};
//! use serde_json::json;
//!
//! let schema = json!({
//!     "type": "object",
//!     "properties": {"ok": {"type": "boolean"}},
//!     "required": ["ok"]
//! });
//!
//! let validator = JsonSchemaValidator::new(&schema).unwrap();
//! assert!(validator.validate(&json!({"ok": true})).is_ok());
//! assert!(validator.validate(&json!({"ok": "yes"})).is_err());
//! ```

pub mod error;
pub mod validator;

pub use error::{SchemaRejection, SchemaViolation};
pub use validator::JsonSchemaValidator;

use serde_json::Value;

/// Validates the decoded body of a successful response.
pub trait SchemaValidator: Send + Sync {
    fn validate(&self, value: &Value) -> Result<(), SchemaRejection>;
}

impl<F> SchemaValidator for F
where
    F: Fn(&Value) -> Result<(), SchemaRejection> + Send + Sync,
{
    fn validate(&self, value: &Value) -> Result<(), SchemaRejection> {
        (self)(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn closures_are_validators() {
        let non_empty = |v: &Value| -> Result<(), SchemaRejection> {
            if v.as_array().map(|a| a.is_empty()).unwrap_or(true) {
                Err(SchemaViolation::new("expected a non-empty array").into())
            } else {
                Ok(())
            }
        };
        assert!(non_empty.validate(&json!([1])).is_ok());
        assert!(non_empty.validate(&json!([])).is_err());
    }
}
