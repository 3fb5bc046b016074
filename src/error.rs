use crate::error_code::ErrorKind;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Shared, cloneable error cause.
pub type Cause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "client.base_url")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., the offending value)
    pub details: Option<String>,
    /// Source of the error (e.g., "url_resolver", "client_builder")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A failure classified into the error taxonomy.
///
/// This is the value calling code branches on. `code` is derived from `kind`,
/// and `status` is only ever present for HTTP-originated kinds.
#[derive(Debug, Clone)]
pub struct ClassifiedError {
    kind: ErrorKind,
    status: Option<u16>,
    message: String,
    data: Option<serde_json::Value>,
    cause: Option<Cause>,
}

impl ClassifiedError {
    /// Build an error from a non-2xx HTTP status and its (possibly empty) payload.
    pub fn from_status(status: u16, data: Option<serde_json::Value>) -> Self {
        let kind = ErrorKind::from_http_status(status);
        let message = match kind {
            ErrorKind::GenericHttp => format!("HTTP Error: {}", status),
            _ => kind.default_message().to_string(),
        };
        Self {
            kind,
            status: Some(status),
            message,
            data,
            cause: None,
        }
    }

    /// Build an error of a given kind without a response.
    ///
    /// HTTP kinds get their canonical status (see [`ErrorKind::canonical_status`]).
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: kind.canonical_status(),
            message: message.into(),
            data: None,
            cause: None,
        }
    }

    /// The request never reached a server.
    pub fn network(cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        let message = format!("{}: {}", ErrorKind::Network.default_message(), cause);
        Self::new(ErrorKind::Network, message).with_cause(cause)
    }

    /// A successful response whose body could not be turned into the requested shape.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Decode, message)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn data(&self) -> Option<&serde_json::Value> {
        self.data.as_ref()
    }

    pub fn cause(&self) -> Option<&Cause> {
        self.cause.as_ref()
    }

    /// True when this authentication error comes from a failed token refresh
    /// rather than from the server rejecting a fresh token.
    pub fn is_refresh_failure(&self) -> bool {
        self.kind == ErrorKind::Authentication
            && self
                .cause
                .as_ref()
                .map(|c| c.downcast_ref::<crate::auth::RefreshError>().is_some())
                .unwrap_or(false)
    }

    /// The boundary shape `{ kind, code, status?, message, data? }` as JSON.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (HTTP {}): {}", self.code(), status, self.message),
            None => write!(f, "{}: {}", self.code(), self.message),
        }
    }
}

impl std::error::Error for ClassifiedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|c| &**c as &(dyn std::error::Error + 'static))
    }
}

impl Serialize for ClassifiedError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Shape<'a> {
            kind: ErrorKind,
            code: &'static str,
            #[serde(skip_serializing_if = "Option::is_none")]
            status: Option<u16>,
            message: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            data: Option<&'a serde_json::Value>,
            #[serde(skip_serializing_if = "Option::is_none")]
            cause: Option<String>,
        }

        Shape {
            kind: self.kind,
            code: self.code(),
            status: self.status,
            message: &self.message,
            data: self.data.as_ref(),
            cause: self.cause.as_ref().map(|c| c.to_string()),
        }
        .serialize(serializer)
    }
}

/// Pipeline stage an interceptor failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptorStage {
    Request,
    Response,
}

impl fmt::Display for InterceptorStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request => write!(f, "request"),
            Self::Response => write!(f, "response"),
        }
    }
}

/// Unified error type for the client runtime.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Classified(#[from] ClassifiedError),

    #[error("{stage} interceptor failed: {message}")]
    Interceptor {
        stage: InterceptorStage,
        message: String,
    },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Request timed out after {}ms", .after.as_millis())]
    Timeout { after: Duration },
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Abort from a request or response interceptor.
    pub fn interceptor(stage: InterceptorStage, msg: impl Into<String>) -> Self {
        Error::Interceptor {
            stage,
            message: msg.into(),
        }
    }

    /// The classified error, if this is one.
    pub fn classified(&self) -> Option<&ClassifiedError> {
        match self {
            Error::Classified(e) => Some(e),
            _ => None,
        }
    }

    /// Shortcut for `classified().map(|e| e.kind())`.
    pub fn kind(&self) -> Option<ErrorKind> {
        self.classified().map(ClassifiedError::kind)
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. } => Some(context),
            _ => None,
        }
    }
}
