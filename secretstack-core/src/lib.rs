//! Core types for SecretStack
//!
//! This crate provides the error taxonomy and request identifiers shared by
//! the authorization gate, the secret store and the transport bindings.

pub mod error;
pub mod request_id;

pub use error::{ApiError, ErrorCode};
pub use request_id::{RequestId, REQUEST_ID_HEADER};
