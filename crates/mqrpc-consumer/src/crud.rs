//! Generic CRUD Handler
//!
//! A polymorphic handler bound to a `(store, entity type, resource name)`
//! triple, dispatching Create/Get/List/Update/Delete on the uppercased
//! action. Missing required inputs produce `BadRequest`; storage and codec
//! failures are mapped to the internal-error kind so raw backend errors never
//! cross the bus boundary.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use mqrpc_common::protocol::params;
use mqrpc_common::{AppError, AppResult, BusMessage, ServiceType};

use crate::handler::BusHandler;
use crate::store::{Entity, Store, StoreError};

/// CRUD handler for one persisted resource.
///
/// # Example
///
/// ```ignore
/// let store = Arc::new(MemoryStore::<User>::new());
/// let users = CrudHandler::new("Users", store);
/// ```
pub struct CrudHandler<E, S> {
    resource: String,
    store: Arc<S>,
    _entity: PhantomData<fn() -> E>,
}

impl<E, S> CrudHandler<E, S>
where
    E: Entity + Serialize + DeserializeOwned,
    S: Store<E>,
{
    pub fn new(resource: impl Into<String>, store: Arc<S>) -> Self {
        Self {
            resource: resource.into(),
            store,
            _entity: PhantomData,
        }
    }

    /// CREATE: decode the payload as an entity, insert, persist.
    ///
    /// Replies with the generated id.
    async fn create(&self, msg: &BusMessage) -> AppResult<String> {
        let data = require_data(msg)?;
        let entity: E = params::to_object(data)?;
        let id = self.store.add(entity).await.map_err(store_error)?;
        self.store.save().await.map_err(store_error)?;
        Ok(id.to_string())
    }

    /// GET: read-only lookup by id.
    async fn get(&self, msg: &BusMessage) -> AppResult<String> {
        let id = require_id(msg)?;
        match self.store.find_by_id(id).await.map_err(store_error)? {
            Some(entity) => to_json(&entity),
            None => Err(AppError::not_found("NOT_FOUND", "Cannot find ressource")),
        }
    }

    /// LIST: read-only enumeration of the entire set.
    async fn enumerate(&self) -> AppResult<String> {
        let entities = self.store.list().await.map_err(store_error)?;
        to_json(&entities)
    }

    /// UPDATE: decode the payload as an entity and persist it.
    ///
    /// The `id` parameter is required but informational; the decoded body is
    /// what is persisted. Replies with `true`.
    async fn update(&self, msg: &BusMessage) -> AppResult<String> {
        require_id(msg)?;
        let data = require_data(msg)?;
        let entity: E = params::to_object(data)?;
        self.store.update(entity).await.map_err(store_error)?;
        self.store.save().await.map_err(store_error)?;
        Ok("true".to_string())
    }

    /// DELETE: load-then-remove, surfacing NotFound before mutation.
    ///
    /// Replies with `true`.
    async fn delete(&self, msg: &BusMessage) -> AppResult<String> {
        let id = require_id(msg)?;
        if self
            .store
            .find_by_id(id)
            .await
            .map_err(store_error)?
            .is_none()
        {
            return Err(AppError::not_found("NOT_FOUND", "Cannot find ressource"));
        }
        self.store.remove(id).await.map_err(store_error)?;
        self.store.save().await.map_err(store_error)?;
        Ok("true".to_string())
    }
}

#[async_trait]
impl<E, S> BusHandler for CrudHandler<E, S>
where
    E: Entity + Serialize + DeserializeOwned,
    S: Store<E>,
{
    fn service_type(&self) -> ServiceType {
        ServiceType::Data
    }

    fn resource(&self) -> &str {
        &self.resource
    }

    async fn handle(&self, msg: &BusMessage) -> AppResult<String> {
        match msg.action_upper().as_str() {
            "CREATE" => self.create(msg).await,
            "GET" => self.get(msg).await,
            "LIST" => self.enumerate().await,
            "UPDATE" => self.update(msg).await,
            "DELETE" => self.delete(msg).await,
            other => Err(AppError::internal(
                "ACTION_NOT_IMPLEMENTED",
                format!("Action {other} is not implemented."),
            )),
        }
    }
}

fn require_data(msg: &BusMessage) -> AppResult<&str> {
    match msg.data.as_deref() {
        Some(data) if !data.is_empty() => Ok(data),
        _ => Err(AppError::bad_request("DATA_MANDATORY", "Data is mandatory.")),
    }
}

fn require_id(msg: &BusMessage) -> AppResult<u64> {
    msg.id
        .ok_or_else(|| AppError::bad_request("ID_MANDATORY", "Id is mandatory."))
}

fn store_error(err: StoreError) -> AppError {
    AppError::internal("STORE_ERROR", "Storage operation failed.").with_details(err.to_string())
}

fn to_json<T: Serialize>(value: &T) -> AppResult<String> {
    serde_json::to_string(value).map_err(|e| {
        AppError::internal("SERIALIZE_ERROR", "Failed to serialize result.")
            .with_details(e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::{DateTime, Utc};
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct User {
        #[serde(default)]
        id: u64,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        created_at: Option<DateTime<Utc>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        updated_at: Option<DateTime<Utc>>,
    }

    impl Entity for User {
        fn id(&self) -> u64 {
            self.id
        }
        fn set_id(&mut self, id: u64) {
            self.id = id;
        }
        fn set_created_at(&mut self, at: DateTime<Utc>) {
            self.created_at = Some(at);
        }
        fn set_updated_at(&mut self, at: DateTime<Utc>) {
            self.updated_at = Some(at);
        }
    }

    fn handler() -> (Arc<MemoryStore<User>>, CrudHandler<User, MemoryStore<User>>) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), CrudHandler::new("Users", store))
    }

    fn msg(action: &str) -> BusMessage {
        BusMessage::new(ServiceType::Data, "Users", action)
    }

    #[tokio::test]
    async fn test_create_returns_generated_id() {
        let (store, handler) = handler();
        let result = handler
            .handle(&msg("CREATE").with_data(r#"{"name":"Ada"}"#))
            .await
            .unwrap();
        assert_eq!(result, "1");
        assert_eq!(store.find_by_id(1).await.unwrap().unwrap().name, "Ada");
    }

    #[tokio::test]
    async fn test_create_requires_data() {
        let (_, handler) = handler();
        let err = handler.handle(&msg("CREATE")).await.unwrap_err();
        assert_eq!(err.code, "DATA_MANDATORY");

        let err = handler.handle(&msg("CREATE").with_data("")).await.unwrap_err();
        assert_eq!(err.code, "DATA_MANDATORY");
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_payload() {
        let (_, handler) = handler();
        let err = handler
            .handle(&msg("CREATE").with_data("{broken"))
            .await
            .unwrap_err();
        assert_eq!(err.code, "DATA_INVALID");
    }

    #[tokio::test]
    async fn test_get_returns_entity_json() {
        let (store, handler) = handler();
        let id = store
            .add(User {
                id: 0,
                name: "Ada".into(),
                created_at: None,
                updated_at: None,
            })
            .await
            .unwrap();

        let result = handler.handle(&msg("GET").with_id(id)).await.unwrap();
        let user: User = serde_json::from_str(&result).unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.name, "Ada");
    }

    #[tokio::test]
    async fn test_get_missing_entity_is_not_found() {
        let (_, handler) = handler();
        let err = handler.handle(&msg("GET").with_id(999)).await.unwrap_err();
        assert_eq!(err.code, "NOT_FOUND");
        assert_eq!(err.message, "Cannot find ressource");
        assert_eq!(err.status(), 404);
    }

    #[tokio::test]
    async fn test_get_requires_id() {
        let (_, handler) = handler();
        let err = handler.handle(&msg("GET")).await.unwrap_err();
        assert_eq!(err.code, "ID_MANDATORY");
    }

    #[tokio::test]
    async fn test_list_enumerates_all() {
        let (store, handler) = handler();
        for name in ["Ada", "Grace"] {
            store
                .add(User {
                    id: 0,
                    name: name.into(),
                    created_at: None,
                    updated_at: None,
                })
                .await
                .unwrap();
        }

        let result = handler.handle(&msg("LIST")).await.unwrap();
        let users: Vec<User> = serde_json::from_str(&result).unwrap();
        assert_eq!(users.len(), 2);
    }

    #[tokio::test]
    async fn test_update_persists_body() {
        let (store, handler) = handler();
        let id = store
            .add(User {
                id: 0,
                name: "Ada".into(),
                created_at: None,
                updated_at: None,
            })
            .await
            .unwrap();

        let body = format!(r#"{{"id":{id},"name":"Ada Lovelace"}}"#);
        let result = handler
            .handle(&msg("UPDATE").with_id(id).with_data(body))
            .await
            .unwrap();
        assert_eq!(result, "true");
        assert_eq!(
            store.find_by_id(id).await.unwrap().unwrap().name,
            "Ada Lovelace"
        );
    }

    #[tokio::test]
    async fn test_update_requires_id_and_data() {
        let (_, handler) = handler();
        let err = handler
            .handle(&msg("UPDATE").with_data(r#"{"name":"x"}"#))
            .await
            .unwrap_err();
        assert_eq!(err.code, "ID_MANDATORY");

        let err = handler.handle(&msg("UPDATE").with_id(1)).await.unwrap_err();
        assert_eq!(err.code, "DATA_MANDATORY");
    }

    #[tokio::test]
    async fn test_delete_surfaces_not_found_before_mutation() {
        let (_, handler) = handler();
        let err = handler.handle(&msg("DELETE").with_id(1)).await.unwrap_err();
        assert_eq!(err.code, "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_delete_removes_entity() {
        let (store, handler) = handler();
        let id = store
            .add(User {
                id: 0,
                name: "Ada".into(),
                created_at: None,
                updated_at: None,
            })
            .await
            .unwrap();

        let result = handler.handle(&msg("DELETE").with_id(id)).await.unwrap();
        assert_eq!(result, "true");
        assert!(store.find_by_id(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_actions_are_case_insensitive() {
        let (_, handler) = handler();
        let result = handler
            .handle(&msg("create").with_data(r#"{"name":"Ada"}"#))
            .await
            .unwrap();
        assert_eq!(result, "1");
    }

    #[tokio::test]
    async fn test_unknown_action() {
        let (_, handler) = handler();
        let err = handler.handle(&msg("UPSERT")).await.unwrap_err();
        assert_eq!(err.code, "ACTION_NOT_IMPLEMENTED");
        assert_eq!(err.status(), 500);
    }
}
