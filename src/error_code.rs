//! Error kinds and their stable machine-readable codes.
//!
//! Every classified failure carries exactly one [`ErrorKind`]. The code string
//! is derived from the kind, never stored separately, so a kind and its code
//! cannot drift apart.
//!
//! | status      | kind                 | code                    |
//! |-------------|----------------------|-------------------------|
//! | 401         | `Authentication`     | `AUTHENTICATION_ERROR`  |
//! | 403         | `Forbidden`          | `FORBIDDEN_ERROR`       |
//! | 404         | `NotFound`           | `NOT_FOUND_ERROR`       |
//! | 400, 422    | `Validation`         | `VALIDATION_ERROR`      |
//! | 500         | `Server`             | `INTERNAL_SERVER_ERROR` |
//! | 503         | `ServiceUnavailable` | `SERVICE_UNAVAILABLE`   |
//! | other non-2xx | `GenericHttp`      | `GENERIC_HTTP_ERROR`    |
//! | (none)      | `Network`            | `NETWORK_ERROR`         |
//! | (none)      | `Decode`             | `DECODE_ERROR`          |
//!
//! ## Example
//!
//! ```rust
//! use resilient_client::error_code::ErrorKind;
//!
//! let kind = ErrorKind::from_http_status(422);
//! assert_eq!(kind, ErrorKind::Validation);
//! assert_eq!(kind.code(), "VALIDATION_ERROR");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Discriminant of the error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// 401: credentials missing, expired or rejected
    Authentication,
    /// 403: credentials valid but insufficient
    Forbidden,
    /// 404: resource does not exist
    NotFound,
    /// 400 / 422: request payload rejected
    Validation,
    /// 500: internal server error
    Server,
    /// 503: service temporarily unavailable
    ServiceUnavailable,
    /// Any other non-2xx status
    GenericHttp,
    /// The request never reached a server (DNS, connect, TLS, ...)
    Network,
    /// A successful response whose body could not be decoded or validated
    Decode,
}

impl ErrorKind {
    /// All kinds, in table order.
    pub const ALL: [ErrorKind; 9] = [
        Self::Authentication,
        Self::Forbidden,
        Self::NotFound,
        Self::Validation,
        Self::Server,
        Self::ServiceUnavailable,
        Self::GenericHttp,
        Self::Network,
        Self::Decode,
    ];

    /// Returns the stable code string (e.g., `"NOT_FOUND_ERROR"`).
    #[inline]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Authentication => "AUTHENTICATION_ERROR",
            Self::Forbidden => "FORBIDDEN_ERROR",
            Self::NotFound => "NOT_FOUND_ERROR",
            Self::Validation => "VALIDATION_ERROR",
            Self::Server => "INTERNAL_SERVER_ERROR",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::GenericHttp => "GENERIC_HTTP_ERROR",
            Self::Network => "NETWORK_ERROR",
            Self::Decode => "DECODE_ERROR",
        }
    }

    /// Default human message used when the server gives none.
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::Authentication => "Authorization failed",
            Self::Forbidden => "Access denied",
            Self::NotFound => "Resource not found",
            Self::Validation => "Validation failed",
            Self::Server => "Internal server error",
            Self::ServiceUnavailable => "Service unavailable",
            Self::GenericHttp => "HTTP error",
            Self::Network => "Network request failed",
            Self::Decode => "Response could not be decoded",
        }
    }

    /// Status attached when an error of this kind is built without a response.
    ///
    /// `Network` and `Decode` never carry a status; neither does `GenericHttp`,
    /// which has no single representative code.
    pub fn canonical_status(&self) -> Option<u16> {
        match self {
            Self::Authentication => Some(401),
            Self::Forbidden => Some(403),
            Self::NotFound => Some(404),
            Self::Validation => Some(422),
            Self::Server => Some(500),
            Self::ServiceUnavailable => Some(503),
            Self::GenericHttp | Self::Network | Self::Decode => None,
        }
    }

    /// Whether errors of this kind originate from an HTTP status.
    #[inline]
    pub fn is_http(&self) -> bool {
        !matches!(self, Self::Network | Self::Decode)
    }

    /// Maps a non-2xx HTTP status to its kind.
    ///
    /// Callers are expected to handle 2xx before classifying; a 2xx passed here
    /// lands in `GenericHttp` like any other status outside the table.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            401 => Self::Authentication,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            400 | 422 => Self::Validation,
            500 => Self::Server,
            503 => Self::ServiceUnavailable,
            _ => Self::GenericHttp,
        }
    }

    /// Reverse lookup from a code string.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.code() == code)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
