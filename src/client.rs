//! Client entry points.
//!
//! Implementation details are split into submodules under `src/client/`.

pub mod builder;
pub mod classification;
pub mod core;
pub mod decode;
mod execution;
pub mod options;

pub use builder::ApiClientBuilder;
pub use classification::{classify, classify_transport_error};
pub use core::ApiClient;
pub use execution::REQUEST_ID_HEADER;
pub use options::{merge, ClientDefaults, RequestOptions, ResolvedOptions};
