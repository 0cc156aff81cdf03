//! Store Contract
//!
//! The CRUD handler is bound to a persistent store through the traits in this
//! module. The store owns id assignment and timestamp maintenance; handlers
//! never touch either. Reads are snapshot-consistent and non-tracking, writes
//! are made durable by [`Store::save`].

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub use memory::MemoryStore;

/// Failures surfaced by a store implementation.
///
/// Handlers map these to the internal-error kind at the bus boundary; the
/// variants exist so implementations and probes can distinguish a clean
/// cannot-connect from a real fault.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("conflicting write: {0}")]
    Conflict(String),

    #[error("backend failure: {0}")]
    Backend(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Contract for entities managed by the CRUD handler.
///
/// `id == 0` denotes "unassigned"; the store assigns a positive id on insert.
/// Timestamps are kept in UTC and maintained by the persistence layer.
pub trait Entity: Clone + Send + Sync + 'static {
    fn id(&self) -> u64;
    fn set_id(&mut self, id: u64);
    fn set_created_at(&mut self, at: DateTime<Utc>);
    fn set_updated_at(&mut self, at: DateTime<Utc>);
}

/// Set-of-entity operations keyed by integer id.
#[async_trait]
pub trait Store<E: Entity>: Send + Sync {
    /// Inserts the entity, assigning and returning a fresh positive id.
    async fn add(&self, entity: E) -> StoreResult<u64>;

    /// Snapshot lookup by id; never writes back.
    async fn find_by_id(&self, id: u64) -> StoreResult<Option<E>>;

    /// Snapshot enumeration of the entire set.
    async fn list(&self) -> StoreResult<Vec<E>>;

    /// Replaces the stored entity with the given one, keyed by its id.
    async fn update(&self, entity: E) -> StoreResult<()>;

    /// Removes the entity with the given id.
    async fn remove(&self, id: u64) -> StoreResult<()>;

    /// Makes preceding writes durable.
    async fn save(&self) -> StoreResult<()>;
}

/// Lightweight connectivity probe used by the health handler.
///
/// `Ok(true)` means connected, `Ok(false)` a clean "cannot connect"; an error
/// is any thrown failure.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn check(&self) -> StoreResult<bool>;
}
