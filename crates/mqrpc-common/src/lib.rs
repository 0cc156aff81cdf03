//! MQRPC Common Types
//!
//! This crate provides the shared protocol definitions, error taxonomy and
//! broker settings for MQRPC, a library for building request/reply
//! microservices whose transport is an AMQP 0.9.1 message broker.
//!
//! # Overview
//!
//! Participants are grouped into two roles: a **producer** (gateway) that
//! issues RPC calls, and one or more **consumers** (workers) that execute
//! them and return a structured response. This crate contains everything both
//! roles agree on:
//!
//! - **Protocol Layer**: [`BusMessage`] requests, [`RpcEnvelope`] replies,
//!   [`RpcError`] and the strict payload parser
//! - **Error Taxonomy**: [`AppError`] with stable HTTP-style statuses,
//!   converted into a reply envelope at the consumer boundary
//! - **Settings**: [`BrokerSettings`] bound at startup by the host
//!
//! # Example
//!
//! ```
//! use mqrpc_common::{BusMessage, RpcEnvelope, ServiceType};
//!
//! let request = BusMessage::new(ServiceType::Data, "Users", "GET").with_id(42);
//! let reply = RpcEnvelope::success(r#"{"id":42,"name":"Ada"}"#.to_string());
//! assert!(reply.ok);
//! # let _ = request;
//! ```

pub mod error;
pub mod protocol;
pub mod settings;

pub use error::{AppError, AppResult, ErrorKind, PublicError};
pub use protocol::{BusMessage, RpcEnvelope, RpcError, ServiceType};
pub use settings::BrokerSettings;
