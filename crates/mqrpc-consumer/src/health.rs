//! Health Handler
//!
//! Operational probe for the configured store. Degraded connectivity and
//! outright failures are reported in the snapshot, never propagated as
//! errors; a gateway can always render the reply.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use mqrpc_common::{AppError, AppResult, BusMessage, ServiceType};

use crate::handler::BusHandler;
use crate::store::ConnectivityProbe;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Snapshot returned by the `CHECK` action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db: Option<HealthStatus>,
}

/// Handler for `(INFRA, "Health")` with the single action `CHECK`.
pub struct HealthHandler {
    probe: Arc<dyn ConnectivityProbe>,
}

impl HealthHandler {
    pub fn new(probe: Arc<dyn ConnectivityProbe>) -> Self {
        Self { probe }
    }

    async fn check(&self) -> HealthReport {
        match self.probe.check().await {
            Ok(true) => HealthReport {
                status: HealthStatus::Healthy,
                db: Some(HealthStatus::Healthy),
            },
            Ok(false) => HealthReport {
                status: HealthStatus::Healthy,
                db: Some(HealthStatus::Degraded),
            },
            Err(err) => {
                tracing::warn!(error = %err, "store connectivity probe failed");
                HealthReport {
                    status: HealthStatus::Unhealthy,
                    db: Some(HealthStatus::Unhealthy),
                }
            }
        }
    }
}

#[async_trait]
impl BusHandler for HealthHandler {
    fn service_type(&self) -> ServiceType {
        ServiceType::Infra
    }

    fn resource(&self) -> &str {
        "Health"
    }

    async fn handle(&self, msg: &BusMessage) -> AppResult<String> {
        match msg.action_upper().as_str() {
            "CHECK" => {
                let report = self.check().await;
                serde_json::to_string(&report).map_err(|e| {
                    AppError::internal("SERIALIZE_ERROR", "Failed to serialize result.")
                        .with_details(e.to_string())
                })
            }
            other => Err(AppError::internal(
                "ACTION_NOT_IMPLEMENTED",
                format!("Action {other} is not implemented."),
            )),
        }
    }
}
