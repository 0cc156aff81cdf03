//! Handler Seam
//!
//! A handler executes one resource's operations and is addressed uniquely by
//! `(type, resource)`. Implementations must tolerate out-of-order and
//! duplicated deliveries; the transport is best-effort.

use async_trait::async_trait;
use mqrpc_common::{AppResult, BusMessage, ServiceType};

/// A bus request handler.
///
/// `handle` returns the reply payload as a JSON string; the router and
/// consumer pass it through verbatim into the reply envelope. Failures are
/// typed [`mqrpc_common::AppError`]s and are converted into an error envelope
/// at the consumer boundary.
#[async_trait]
pub trait BusHandler: Send + Sync {
    /// The coarse category this handler serves.
    fn service_type(&self) -> ServiceType;

    /// The resource name this handler serves; matched case-insensitively.
    fn resource(&self) -> &str;

    /// Executes the operation selected by `msg.action`.
    async fn handle(&self, msg: &BusMessage) -> AppResult<String>;
}
