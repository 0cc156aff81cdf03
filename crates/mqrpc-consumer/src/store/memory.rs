//! In-memory store.
//!
//! Reference implementation of the [`Store`] contract backed by a
//! `RwLock<BTreeMap>`. Reads hand out clones, so callers never observe
//! partial writes; ids are assigned from a monotonically increasing counter.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{ConnectivityProbe, Entity, Store, StoreError, StoreResult};

pub struct MemoryStore<E> {
    entities: RwLock<BTreeMap<u64, E>>,
    last_id: AtomicU64,
}

impl<E> MemoryStore<E> {
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(BTreeMap::new()),
            last_id: AtomicU64::new(0),
        }
    }
}

impl<E> Default for MemoryStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: Entity> Store<E> for MemoryStore<E> {
    async fn add(&self, mut entity: E) -> StoreResult<u64> {
        let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Utc::now();
        entity.set_id(id);
        entity.set_created_at(now);
        entity.set_updated_at(now);

        self.entities.write().await.insert(id, entity);
        Ok(id)
    }

    async fn find_by_id(&self, id: u64) -> StoreResult<Option<E>> {
        Ok(self.entities.read().await.get(&id).cloned())
    }

    async fn list(&self) -> StoreResult<Vec<E>> {
        Ok(self.entities.read().await.values().cloned().collect())
    }

    async fn update(&self, mut entity: E) -> StoreResult<()> {
        let mut entities = self.entities.write().await;
        let id = entity.id();
        if !entities.contains_key(&id) {
            return Err(StoreError::Conflict(format!("no entity with id {id}")));
        }
        entity.set_updated_at(Utc::now());
        entities.insert(id, entity);
        Ok(())
    }

    async fn remove(&self, id: u64) -> StoreResult<()> {
        match self.entities.write().await.remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::Conflict(format!("no entity with id {id}"))),
        }
    }

    async fn save(&self) -> StoreResult<()> {
        // Writes are applied in place; there is nothing left to flush.
        Ok(())
    }
}

#[async_trait]
impl<E: Entity> ConnectivityProbe for MemoryStore<E> {
    async fn check(&self) -> StoreResult<bool> {
        Ok(true)
    }
}
