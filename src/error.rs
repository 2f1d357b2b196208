//! Error taxonomy shared by the repositories and the boundary layer.
//!
//! Repositories return `anyhow::Result`. Conditions the caller must be able to
//! tell apart (missing rows, bad input, failed credentials) are raised as
//! [`Error`]; everything else is a plain wrapped error and reads as
//! [`ErrorCode::Internal`] through [`error_code`].

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    BadInput,
    Internal,
    NotAuthorized,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NotFound => "not_found",
            ErrorCode::BadInput => "bad_input",
            ErrorCode::Internal => "internal",
            ErrorCode::NotAuthorized => "not_authorized",
        }
    }

    /// Transport status the boundary layer answers with.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::NotFound => 404,
            ErrorCode::BadInput => 400,
            ErrorCode::NotAuthorized => 401,
            ErrorCode::Internal => 500,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("journal error: code {code} message {message}")]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn bad_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadInput, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    pub fn not_authorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotAuthorized, message)
    }
}

fn find(err: &anyhow::Error) -> Option<&Error> {
    err.chain().find_map(|cause| cause.downcast_ref::<Error>())
}

/// Code of the first taxonomy error in the chain, `internal` otherwise.
pub fn error_code(err: &anyhow::Error) -> ErrorCode {
    find(err).map_or(ErrorCode::Internal, |e| e.code)
}

/// Message of the first taxonomy error in the chain, `"Internal Error"` otherwise.
pub fn error_message(err: &anyhow::Error) -> String {
    find(err).map_or_else(|| "Internal Error".to_string(), |e| e.message.clone())
}
