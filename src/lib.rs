//! # resilient-client
//!
//! HTTP client runtime that sends every request through an interceptor
//! pipeline, recovers from expired credentials with a single shared refresh,
//! and turns transport and status outcomes into a typed error taxonomy.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use resilient_client::{ApiClient, RequestOptions, TokenPair};
//!
//! #[tokio::main]
//! async fn main() -> resilient_client::Result<()> {
//!     let client = ApiClient::builder()
//!         .base_url("https://api.example.com")
//!         .credentials(TokenPair::new("access", "refresh"))
//!         .build()?;
//!
//!     let widgets: serde_json::Value = client.get_json("/widgets", RequestOptions::new()).await?;
//!     println!("{}", widgets);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Client, builder, executor, classifier and decoder |
//! | [`auth`] | Token manager with single-flight refresh |
//! | [`interceptors`] | Request, response and error interceptor pipeline |
//! | [`transport`] | Transport seam and the reqwest implementation |
//! | [`types`] | Request descriptor, response outcome, decoded payload |
//! | [`structured`] | Optional response schema validation |
//! | [`error`] / [`error_code`] | Error taxonomy |

pub mod auth;
pub mod client;
pub mod error_code;
pub mod interceptors;
pub mod structured;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use auth::{RefreshError, TokenManager, TokenPair, TokenRefresher, TokenState};
pub use client::{ApiClient, ApiClientBuilder, ClientDefaults, RequestOptions};
pub use error_code::ErrorKind;
pub use interceptors::{ErrorAction, Hooks, InterceptorHandle, InterceptorPipeline};
pub use transport::{HttpTransport, Transport, TransportError};
pub use types::{Payload, RequestBody, RequestDescriptor, ResponseOutcome};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{ClassifiedError, Error, ErrorContext};
