//! Request and response data model shared by the pipeline, transport and executor.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`RequestDescriptor`] | Method, URL, headers, body and per-call options for one attempt |
//! | [`RequestBody`] | Structured JSON or raw bytes |
//! | [`ResponseOutcome`] | Status, headers and body bytes from the transport |
//! | [`Payload`] | Decoded body of a successful response |

pub mod request;
pub mod response;

pub use request::{RequestBody, RequestDescriptor};
pub use response::{Payload, ResponseOutcome};
