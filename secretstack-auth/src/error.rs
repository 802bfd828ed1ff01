//! Authorization errors

use std::time::Duration;

use secretstack_core::ApiError;
use thiserror::Error;

use crate::mode::AuthMode;

/// Errors raised while building or consulting the authorization gate
#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("Invalid authorization mode: {0}")]
    InvalidMode(String),

    #[error("Authorization mode '{0}' requires a policy oracle endpoint")]
    MissingEndpoint(AuthMode),

    #[error("Invalid policy oracle endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("Permission '{permission}' denied on resource '{resource}'")]
    PermissionDenied {
        permission: String,
        resource: String,
    },

    #[error("IAM check failed: {0}")]
    CheckFailed(#[from] OracleError),
}

/// Failures talking to the external policy oracle
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("oracle returned HTTP {0}")]
    Status(u16),

    #[error("no answer within {0:?}")]
    Timeout(Duration),

    #[error("oracle unavailable: {0}")]
    Unavailable(String),
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::PermissionDenied { .. } => ApiError::permission_denied(err.to_string()),
            _ => ApiError::internal(err.to_string()),
        }
    }
}
