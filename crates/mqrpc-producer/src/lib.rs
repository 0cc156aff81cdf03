//! MQRPC Producer
//!
//! Gateway-side half of MQRPC: issues RPC calls over a broker queue and
//! awaits the correlated reply.
//!
//! # Call Flow
//!
//! 1. [`BusProducer::send_message`] declares a temporary reply queue,
//!    generates a correlation id and publishes the request
//! 2. [`BusProducer::await_response`] subscribes to the reply queue, filters
//!    deliveries by correlation id and decodes the reply envelope
//! 3. Cleanup (subscription cancel + reply-queue delete) always runs,
//!    whether the call resolved, timed out or was cancelled
//!
//! Remote failures are reconstructed as `Rpc`-kind
//! [`mqrpc_common::AppError`]s, so end-to-end callers observe one consistent
//! error abstraction regardless of where the fault originated.

pub mod producer;

pub use producer::{BusProducer, PendingReply};
