//! MQRPC Protocol Definitions
//!
//! Wire types shared by producers and consumers. The wire format is JSON,
//! UTF-8, content-type `application/json`; keys are lowerCamelCase and absent
//! optional fields are omitted.
//!
//! # Protocol Types
//!
//! - [`BusMessage`]: the request envelope, addressed by `(type, resource)`
//!   with an `action` verb selecting the operation
//! - [`RpcEnvelope`]: the reply envelope, exactly one of `data`/`error`
//!   meaningful depending on `ok`
//! - [`RpcError`]: the structured error half of a reply
//! - [`params`]: strict decoding of the opaque `data` payload field

pub mod envelope;
pub mod message;
pub mod params;


pub use envelope::{RpcEnvelope, RpcError};
pub use message::{BusMessage, ServiceType};
