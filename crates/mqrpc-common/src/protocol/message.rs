//! MQRPC Request Types
//!
//! This module defines the request envelope carried on the bus. A handler is
//! addressed uniquely by `(type, resource)`; `action` selects the operation
//! within that handler.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Coarse handler category.
///
/// `Data` addresses persisted entities, `App` business logic, `Infra`
/// operational concerns such as health probes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServiceType {
    Data,
    App,
    Infra,
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ServiceType::Data => "DATA",
            ServiceType::App => "APP",
            ServiceType::Infra => "INFRA",
        };
        f.write_str(name)
    }
}

/// A request travelling over the bus.
///
/// # Request Flow
///
/// 1. Producer serializes a `BusMessage` and publishes it to a worker queue
/// 2. Consumer decodes the body and routes it by `(type, resource)`
/// 3. The selected handler dispatches on the uppercased `action`
/// 4. The handler result (or error) is wrapped in a reply envelope
///
/// # Example
///
/// ```
/// use mqrpc_common::protocol::{BusMessage, ServiceType};
///
/// let msg = BusMessage::new(ServiceType::Data, "Users", "GET").with_id(42);
/// assert_eq!(msg.resource, "Users");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BusMessage {
    /// Handler category.
    #[serde(rename = "type")]
    pub service_type: ServiceType,
    /// Logical name of the domain served by the handler, e.g. `"Users"`.
    pub resource: String,
    /// Operation verb; compared case-insensitively after uppercasing.
    pub action: String,
    /// Optional entity id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Optional opaque payload, typically JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl BusMessage {
    /// Creates a new bus message without id or payload.
    pub fn new(
        service_type: ServiceType,
        resource: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            service_type,
            resource: resource.into(),
            action: action.into(),
            id: None,
            data: None,
        }
    }

    /// Sets the entity id for this message.
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the opaque payload for this message.
    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// The action in its canonical uppercase form.
    pub fn action_upper(&self) -> String {
        self.action.to_ascii_uppercase()
    }

    /// Serializes this message to its wire form.
    pub fn encode(&self) -> AppResult<String> {
        serde_json::to_string(self).map_err(|e| {
            AppError::internal("SERIALIZE_ERROR", "Failed to serialize message.")
                .with_details(e.to_string())
        })
    }

    /// Strictly decodes a wire body into a message.
    pub fn decode(body: &[u8]) -> AppResult<Self> {
        serde_json::from_slice(body).map_err(|e| {
            AppError::bad_request("DESERIALIZE_ERROR", "Invalid payload.")
                .with_details(e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_builders() {
        let msg = BusMessage::new(ServiceType::Data, "Users", "CREATE")
            .with_data(r#"{"name":"Ada"}"#);
        assert_eq!(msg.service_type, ServiceType::Data);
        assert_eq!(msg.action, "CREATE");
        assert!(msg.id.is_none());
        assert_eq!(msg.data.as_deref(), Some(r#"{"name":"Ada"}"#));
    }

    #[test]
    fn test_action_upper_is_case_insensitive() {
        let msg = BusMessage::new(ServiceType::Data, "Users", "create");
        assert_eq!(msg.action_upper(), "CREATE");
    }

    #[test]
    fn test_wire_keys_are_camel_case_and_absent_fields_skipped() {
        let msg = BusMessage::new(ServiceType::Infra, "Health", "CHECK");
        let json = msg.encode().unwrap();
        assert_eq!(json, r#"{"type":"INFRA","resource":"Health","action":"CHECK"}"#);
    }

    #[test]
    fn test_decode_round_trip() {
        let body = br#"{"type":"DATA","resource":"Users","action":"GET","id":42}"#;
        let msg = BusMessage::decode(body).unwrap();
        assert_eq!(msg.service_type, ServiceType::Data);
        assert_eq!(msg.id, Some(42));
        assert!(msg.data.is_none());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = BusMessage::decode(b"not json").unwrap_err();
        assert_eq!(err.code, "DESERIALIZE_ERROR");
        assert_eq!(err.message, "Invalid payload.");
        assert!(err.details.is_some());
    }

    #[test]
    fn test_decode_rejects_unknown_service_type() {
        let body = br#"{"type":"BOGUS","resource":"Users","action":"GET"}"#;
        assert!(BusMessage::decode(body).is_err());
    }
}
