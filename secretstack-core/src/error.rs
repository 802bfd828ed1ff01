//! Transport-neutral error taxonomy and its wire renderings

use serde::Serialize;
use thiserror::Error;

/// The closed set of error kinds any operation may surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidArgument,
    NotFound,
    AlreadyExists,
    FailedPrecondition,
    PermissionDenied,
    Internal,
}

impl ErrorCode {
    /// Canonical status name, as used in JSON error bodies
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::FailedPrecondition => "FAILED_PRECONDITION",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::Internal => "INTERNAL",
        }
    }

    /// Numeric RPC status code
    pub fn rpc_code(&self) -> i32 {
        match self {
            Self::InvalidArgument => 3,
            Self::NotFound => 5,
            Self::AlreadyExists => 6,
            Self::PermissionDenied => 7,
            Self::FailedPrecondition => 9,
            Self::Internal => 13,
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidArgument | Self::FailedPrecondition => 400,
            Self::PermissionDenied => 403,
            Self::NotFound => 404,
            Self::AlreadyExists => 409,
            Self::Internal => 500,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error as seen by callers of the emulator
#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    pub request_id: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgument, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PermissionDenied, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// Format as a REST-style JSON error envelope
    ///
    /// `{"error":{"code":404,"message":"...","status":"NOT_FOUND"}}`
    pub fn to_json(&self) -> String {
        #[derive(Serialize)]
        struct Envelope<'a> {
            error: Body<'a>,
        }

        #[derive(Serialize)]
        struct Body<'a> {
            code: u16,
            message: &'a str,
            status: &'static str,
        }

        let envelope = Envelope {
            error: Body {
                code: self.code.http_status(),
                message: &self.message,
                status: self.code.as_str(),
            },
        };

        serde_json::to_string(&envelope).unwrap_or_else(|_| {
            format!(
                r#"{{"error":{{"code":{},"status":"{}"}}}}"#,
                self.code.http_status(),
                self.code.as_str()
            )
        })
    }

    /// Format as an RPC status record, numeric code first
    pub fn to_rpc_json(&self) -> String {
        #[derive(Serialize)]
        struct Status<'a> {
            code: i32,
            message: &'a str,
        }

        let status = Status {
            code: self.code.rpc_code(),
            message: &self.message,
        };

        serde_json::to_string(&status).unwrap_or_else(|_| {
            format!(r#"{{"code":{}}}"#, self.code.rpc_code())
        })
    }
}
