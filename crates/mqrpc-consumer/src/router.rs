//! Bus Router
//!
//! Matches an incoming message to exactly one registered handler by
//! `(type, resource)`, with case-insensitive resource comparison. The router
//! never interprets `action`; the selected handler's string result is
//! returned verbatim.

use std::collections::HashSet;
use std::sync::Arc;

use mqrpc_common::{AppError, AppResult, BusMessage};

use crate::handler::BusHandler;

/// Immutable routing table over a finite set of handlers.
///
/// Duplicate registrations are a startup misconfiguration and are rejected at
/// construction; after that the table is read-only and safe for concurrent
/// routing.
pub struct BusRouter {
    handlers: Vec<Arc<dyn BusHandler>>,
}

impl std::fmt::Debug for BusRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusRouter")
            .field("handlers_len", &self.handlers.len())
            .finish()
    }
}

impl BusRouter {
    /// Builds a router, failing fast on duplicate `(type, resource)` pairs.
    pub fn new(handlers: Vec<Arc<dyn BusHandler>>) -> AppResult<Self> {
        let mut seen = HashSet::new();
        for handler in &handlers {
            let key = (handler.service_type(), handler.resource().to_ascii_uppercase());
            if !seen.insert(key) {
                return Err(AppError::internal(
                    "DUPLICATE_HANDLER",
                    format!(
                        "Multiple handlers registered for ({}, {}).",
                        handler.service_type(),
                        handler.resource()
                    ),
                ));
            }
        }
        Ok(Self { handlers })
    }

    /// Dispatches `msg` to the unique matching handler.
    pub async fn route(&self, msg: &BusMessage) -> AppResult<String> {
        let handler = self
            .handlers
            .iter()
            .find(|h| {
                h.service_type() == msg.service_type
                    && h.resource().eq_ignore_ascii_case(&msg.resource)
            })
            .ok_or_else(|| {
                AppError::not_found(
                    "SERVICE_NOT_FOUND",
                    format!("No handler for ({}, {}).", msg.service_type, msg.resource),
                )
            })?;

        handler.handle(msg).await
    }
}
