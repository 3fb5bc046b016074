//! Error types for response schema validation.

use std::fmt;

/// A single schema violation with location information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// Error message describing what went wrong
    pub message: String,
    /// JSON pointer to the offending value (e.g., "/0/id"); `None` for the root
    pub path: Option<String>,
}

impl SchemaViolation {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: None,
        }
    }

    pub fn at(message: impl Into<String>, path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            message: message.into(),
            path: if path.is_empty() { None } else { Some(path) },
        }
    }
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}: {}", path, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for SchemaViolation {}

/// All violations reported for one value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRejection {
    pub violations: Vec<SchemaViolation>,
}

impl SchemaRejection {
    pub fn single(violation: SchemaViolation) -> Self {
        Self {
            violations: vec![violation],
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.violations.iter().map(|v| v.to_string()).collect()
    }
}

impl fmt::Display for SchemaRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "schema validation failed: {}", self.messages().join("; "))
    }
}

impl std::error::Error for SchemaRejection {}

impl From<SchemaViolation> for SchemaRejection {
    fn from(violation: SchemaViolation) -> Self {
        Self::single(violation)
    }
}
