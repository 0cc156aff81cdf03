//! MQRPC Reply Envelope
//!
//! The outer JSON object framing a reply. Exactly one of `data`/`error` is
//! meaningful, selected by `ok`.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// A reply envelope carrying either a payload or a structured error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RpcEnvelope<T> {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl<T> RpcEnvelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: RpcError) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error),
        }
    }
}

impl<T: Serialize> RpcEnvelope<T> {
    /// Serializes this envelope to its wire form.
    pub fn encode(&self) -> AppResult<String> {
        serde_json::to_string(self).map_err(|e| {
            AppError::internal("SERIALIZE_ERROR", "Failed to serialize envelope.")
                .with_details(e.to_string())
        })
    }
}

/// The error half of a reply envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RpcError {
    /// Short machine token, e.g. `"NOT_FOUND"`.
    pub code: String,
    /// Human-readable description.
    pub message: String,
    /// Optional longer technical text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl From<AppError> for RpcError {
    fn from(err: AppError) -> Self {
        Self {
            code: err.code,
            message: err.message,
            details: err.details,
        }
    }
}

impl From<&AppError> for RpcError {
    fn from(err: &AppError) -> Self {
        Self {
            code: err.code.clone(),
            message: err.message.clone(),
            details: err.details.clone(),
        }
    }
}
