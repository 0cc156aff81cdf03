//! MQRPC Consumer
//!
//! Worker-side half of MQRPC: a long-lived consumer loop that turns a broker
//! queue into an RPC endpoint, a routing table over `(type, resource)`
//! handlers, and the generic CRUD and Health handlers.
//!
//! # Architecture
//!
//! The consumer crate is responsible for:
//! - Declaring and consuming the durable request queue
//! - Decoding deliveries into [`mqrpc_common::BusMessage`]s
//! - Routing each message to exactly one registered [`BusHandler`]
//! - Converting every outcome into a reply envelope, copied correlation id
//!   included, so the producer always hears back
//!
//! # Resilience
//!
//! Only connection and channel establishment may terminate the loop. Decode
//! failures, handler errors and even handler panics are converted into error
//! envelopes; a poisoned message never kills the worker.
//!
//! # Main Components
//!
//! - [`BusConsumer`] - the receive → decode → route → reply loop
//! - [`BusRouter`] - immutable `(type, resource)` dispatch table
//! - [`CrudHandler`] - generic Create/Get/List/Update/Delete over a store
//! - [`HealthHandler`] - store connectivity probe
//! - [`store`] - the `Entity`/`Store` contract and the in-memory store

pub mod consumer;
pub mod crud;
pub mod handler;
pub mod health;
pub mod router;
pub mod store;

pub use consumer::BusConsumer;
pub use crud::CrudHandler;
pub use handler::BusHandler;
pub use health::{HealthHandler, HealthReport, HealthStatus};
pub use router::BusRouter;
pub use store::{ConnectivityProbe, Entity, MemoryStore, Store, StoreError};
