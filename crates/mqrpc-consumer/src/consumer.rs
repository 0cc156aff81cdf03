//! Consumer Loop
//!
//! Long-lived worker loop: receive, decode, route, reply. The only fatal
//! path is establishing the connection, channel and queue; after that, every
//! per-delivery failure is caught and converted into an error envelope. One
//! bad message must not terminate the consumer.
//!
//! Deliveries are handled in spawned tasks so distinct messages progress
//! concurrently; the shared state is the channel (lapin channels support
//! concurrent publishes) and the read-only routing table.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::{FutureExt, StreamExt};
use lapin::options::{
    BasicCancelOptions, BasicConsumeOptions, BasicPublishOptions, QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer};
use tokio::sync::watch;
use tokio::task::JoinSet;

use mqrpc_common::{AppError, AppResult, BrokerSettings, BusMessage, RpcEnvelope};

use crate::router::BusRouter;

/// Fallback reply used when envelope rendering itself fails.
const ROUTING_ERROR_REPLY: &str =
    r#"{"ok":false,"error":{"code":"ROUTING_ERROR","message":"Failed to render reply."}}"#;

/// Long-lived RPC worker bound to one request queue.
///
/// # Example
///
/// ```ignore
/// let consumer = BusConsumer::new(settings, "users-service", router);
/// let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
/// consumer.run(shutdown_rx).await?;
/// ```
pub struct BusConsumer {
    settings: BrokerSettings,
    queue: String,
    router: Arc<BusRouter>,
}

impl BusConsumer {
    pub fn new(settings: BrokerSettings, queue: impl Into<String>, router: BusRouter) -> Self {
        Self {
            settings,
            queue: queue.into(),
            router: Arc::new(router),
        }
    }

    /// Runs the worker loop until the shutdown signal fires.
    ///
    /// Connection, channel and queue establishment failures are returned to
    /// the host (which is expected to restart the process); per-message
    /// failures never leave the loop. On shutdown the subscription is
    /// cancelled best-effort and in-flight deliveries finish their reply
    /// attempt before this method returns.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> AppResult<()> {
        let (connection, channel, mut consumer) = match self.connect().await {
            Ok(link) => link,
            Err(err) => {
                tracing::error!(queue = %self.queue, error = %err, "broker connection failed");
                return Err(err);
            }
        };
        let consumer_tag = consumer.tag().clone();
        tracing::info!(queue = %self.queue, consumer_tag = %consumer_tag, "consuming");

        let mut inflight = JoinSet::new();

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow_and_update() {
                        break;
                    }
                }
                delivery = consumer.next() => {
                    match delivery {
                        Some(Ok(delivery)) => {
                            let router = Arc::clone(&self.router);
                            let channel = channel.clone();
                            inflight.spawn(async move {
                                Self::handle_delivery(router, channel, delivery).await;
                            });
                        }
                        Some(Err(err)) => {
                            tracing::error!(queue = %self.queue, error = %err, "delivery stream error");
                        }
                        None => {
                            tracing::warn!(queue = %self.queue, "subscription closed by broker");
                            break;
                        }
                    }
                }
                Some(finished) = inflight.join_next(), if !inflight.is_empty() => {
                    if let Err(err) = finished {
                        tracing::error!(queue = %self.queue, error = %err, "delivery task failed");
                    }
                }
            }
        }

        // Draining: stop the subscription, then let in-flight replies finish.
        if let Err(err) = channel
            .basic_cancel(consumer_tag.as_str(), BasicCancelOptions::default())
            .await
        {
            tracing::debug!(queue = %self.queue, error = %err, "failed to cancel subscription");
        }
        while let Some(finished) = inflight.join_next().await {
            if let Err(err) = finished {
                tracing::error!(queue = %self.queue, error = %err, "delivery task failed");
            }
        }
        drop(connection);

        tracing::info!(queue = %self.queue, "consumer stopped");
        Ok(())
    }

    async fn connect(&self) -> AppResult<(Connection, Channel, Consumer)> {
        let connection =
            Connection::connect(&self.settings.amqp_uri(), ConnectionProperties::default())
                .await
                .map_err(broker_error)?;
        let channel = connection.create_channel().await.map_err(broker_error)?;

        channel
            .queue_declare(
                &self.queue,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(broker_error)?;

        // Auto-ack: delivery is best-effort, redelivery is not our concern.
        let consumer = channel
            .basic_consume(
                &self.queue,
                "",
                BasicConsumeOptions {
                    no_ack: true,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(broker_error)?;

        Ok((connection, channel, consumer))
    }

    /// Per-delivery pipeline; every exit attempts a reply.
    async fn handle_delivery(
        router: Arc<BusRouter>,
        channel: Channel,
        delivery: lapin::message::Delivery,
    ) {
        let reply_to = delivery.properties.reply_to().clone();
        let correlation_id = delivery.properties.correlation_id().clone();

        let envelope = Self::process(&router, &delivery.data).await;

        let Some(reply_to) = reply_to else {
            tracing::warn!("delivery has no replyTo, skipping reply");
            return;
        };

        if let Err(err) =
            Self::publish_reply(&channel, reply_to.as_str(), correlation_id, &envelope).await
        {
            tracing::error!(reply_to = %reply_to, error = %err, "failed to publish reply");
        }
    }

    /// Decode and route a request body, converting every failure into an
    /// error envelope.
    async fn process(router: &BusRouter, body: &[u8]) -> RpcEnvelope<String> {
        let msg = match BusMessage::decode(body) {
            Ok(msg) => msg,
            Err(err) => {
                tracing::warn!(error = %err, "dropping undecodable delivery");
                return RpcEnvelope::failure(err.into());
            }
        };

        match AssertUnwindSafe(router.route(&msg)).catch_unwind().await {
            Ok(Ok(data)) => RpcEnvelope::success(data),
            Ok(Err(err)) => {
                tracing::debug!(
                    resource = %msg.resource,
                    action = %msg.action,
                    code = %err.code,
                    "handler returned error"
                );
                RpcEnvelope::failure(err.into())
            }
            Err(panic) => {
                let details = panic_message(panic);
                tracing::error!(
                    resource = %msg.resource,
                    action = %msg.action,
                    details = %details,
                    "handler panicked"
                );
                RpcEnvelope::failure(
                    AppError::internal("UNHANDLED", "Unhandled failure while processing message.")
                        .with_details(details)
                        .into(),
                )
            }
        }
    }

    async fn publish_reply(
        channel: &Channel,
        reply_to: &str,
        correlation_id: Option<ShortString>,
        envelope: &RpcEnvelope<String>,
    ) -> AppResult<()> {
        let body = match envelope.encode() {
            Ok(body) => body,
            Err(err) => {
                tracing::error!(error = %err, "failed to render reply envelope");
                ROUTING_ERROR_REPLY.to_string()
            }
        };

        let mut headers = FieldTable::default();
        let status = if envelope.ok { "ok" } else { "error" };
        headers.insert(
            ShortString::from("x-status"),
            AMQPValue::LongString(status.to_string().into()),
        );

        let mut properties = BasicProperties::default()
            .with_content_type(ShortString::from("application/json"))
            .with_content_encoding(ShortString::from("utf-8"))
            .with_headers(headers);
        if let Some(correlation_id) = correlation_id {
            properties = properties.with_correlation_id(correlation_id);
        }

        channel
            .basic_publish(
                "",
                reply_to,
                BasicPublishOptions::default(),
                body.as_bytes(),
                properties,
            )
            .await
            .map_err(broker_error)?
            .await
            .map_err(broker_error)?;

        Ok(())
    }
}

fn broker_error(err: lapin::Error) -> AppError {
    AppError::internal("BROKER_ERROR", "Broker operation failed.").with_details(err.to_string())
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "opaque panic payload".to_string()
    }
}
