//! MQRPC Error Taxonomy
//!
//! Every failure that crosses the bus boundary is one of a closed set of
//! kinds, each with a stable HTTP-style status. Errors are constructed at the
//! point of failure, propagated with `?`, and converted into a reply envelope
//! exactly once, at the consumer boundary. Handler code never surfaces raw
//! storage or transport errors.

use serde::Serialize;
use thiserror::Error;

/// Closed set of failure kinds with stable HTTP-style status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller-supplied input invalid or missing (400).
    BadRequest,
    /// Authentication missing or invalid (401).
    Unauthorized,
    /// Authenticated but not permitted (403).
    Forbidden,
    /// Addressed resource or handler absent (404).
    NotFound,
    /// Caller failed to produce input in time (408).
    RequestTimeout,
    /// Rate or quota violation (429).
    TooManyRequests,
    /// Unhandled failure or invariant violation (500).
    Internal,
    /// Upstream or broker peer did not reply in time (504).
    GatewayTimeout,
    /// Remote peer replied `ok=false`; carries the remote code and details (500).
    Rpc,
}

impl ErrorKind {
    /// The HTTP status associated with this kind.
    pub fn status(self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::RequestTimeout => 408,
            ErrorKind::TooManyRequests => 429,
            ErrorKind::Internal => 500,
            ErrorKind::GatewayTimeout => 504,
            ErrorKind::Rpc => 500,
        }
    }
}

/// A typed in-process failure.
///
/// Carries a machine-readable `code` (short token such as `"NOT_FOUND"`), a
/// human-readable `message`, and optional longer technical `details`. The
/// HTTP status is derived from the kind via [`AppError::status`].
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{code}: {message}")]
pub struct AppError {
    pub kind: ErrorKind,
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

impl AppError {
    fn new(kind: ErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, code, message)
    }

    pub fn unauthorized(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, code, message)
    }

    pub fn forbidden(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, code, message)
    }

    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, code, message)
    }

    pub fn request_timeout(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RequestTimeout, code, message)
    }

    pub fn too_many_requests(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TooManyRequests, code, message)
    }

    pub fn internal(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, code, message)
    }

    pub fn gateway_timeout(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::GatewayTimeout, code, message)
    }

    /// Reconstructs a failure reported by a remote peer.
    ///
    /// The producer uses this when a reply envelope carries `ok=false`, so
    /// end-to-end callers observe the same error abstraction regardless of
    /// where the fault originated.
    pub fn rpc(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Option<String>,
    ) -> Self {
        Self {
            kind: ErrorKind::Rpc,
            code: code.into(),
            message: message.into(),
            details,
        }
    }

    /// Attaches longer technical details to the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// The HTTP status associated with this error's kind.
    pub fn status(&self) -> u16 {
        self.kind.status()
    }

    /// Renders the gateway-facing body for this error.
    ///
    /// `exception` is only populated when `include_exception` is set, so
    /// production gateways can keep technical detail out of responses.
    pub fn to_public(&self, include_exception: bool, trace_id: Option<String>) -> PublicError {
        let exception = if include_exception {
            Some(match &self.details {
                Some(details) => format!("{}: {}", self.code, details),
                None => self.code.clone(),
            })
        } else {
            None
        };

        PublicError {
            message: self.message.clone(),
            exception,
            trace_id,
        }
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;

/// User-visible error shape for gateway-layer serialization.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublicError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}
