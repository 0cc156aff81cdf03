//! RPC Producer
//!
//! Fires a request at a worker queue with a temporary reply queue per call,
//! then awaits the correlated response or times out. Multiple in-flight RPCs
//! share the connection and channel; each call owns its unique reply queue
//! and filters responses by correlation id, so there is no cross-talk.

use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicCancelOptions, BasicConsumeOptions, BasicPublishOptions,
    QueueDeclareOptions, QueueDeleteOptions,
};
use lapin::types::{FieldTable, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer};
use tokio::sync::{watch, Mutex};
use tokio::time::Instant;
use uuid::Uuid;

use mqrpc_common::{AppError, AppResult, BrokerSettings, RpcEnvelope, RpcError};

/// Ephemeral correlation record for one in-flight RPC.
///
/// Created by [`BusProducer::send_message`], consumed by
/// [`BusProducer::await_response`]; the reply queue is deleted (best-effort)
/// when the call resolves.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingReply {
    /// 128-bit hex token attached to the request.
    pub correlation_id: String,
    /// Server-assigned name of the temporary reply queue.
    pub reply_queue: String,
}

struct BrokerLink {
    connection: Connection,
    channel: Channel,
}

/// Gateway-side RPC producer.
///
/// The connection and channel are opened lazily on first use and re-opened
/// under the same check-open/create pattern when the broker drops them.
///
/// # Example
///
/// ```ignore
/// let producer = BusProducer::new(BrokerSettings::default());
/// let reply = producer.call("users-service", &request.encode()?).await?;
/// ```
pub struct BusProducer {
    settings: BrokerSettings,
    link: Mutex<Option<BrokerLink>>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl BusProducer {
    pub fn new(settings: BrokerSettings) -> Self {
        Self {
            settings,
            link: Mutex::new(None),
            shutdown: None,
        }
    }

    /// Attaches the host's shutdown signal.
    ///
    /// When the signal fires, pending [`BusProducer::await_response`] calls
    /// resolve as cancelled; reply-queue cleanup still executes.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Publishes `body` to `queue` and returns the correlation record.
    ///
    /// Declares a server-named exclusive, auto-delete, non-durable reply
    /// queue and attaches its name together with a fresh 128-bit correlation
    /// id to the published message.
    pub async fn send_message(&self, queue: &str, body: &str) -> AppResult<PendingReply> {
        if queue.is_empty() {
            return Err(AppError::bad_request("QUEUE_MANDATORY", "Queue is mandatory."));
        }
        if body.is_empty() {
            return Err(AppError::bad_request("BODY_MANDATORY", "Body is mandatory."));
        }

        let channel = self.channel().await?;

        let reply_queue = channel
            .queue_declare(
                "",
                QueueDeclareOptions {
                    exclusive: true,
                    auto_delete: true,
                    durable: false,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(broker_error)?;
        let reply_queue = reply_queue.name().as_str().to_string();

        let correlation_id = Uuid::new_v4().simple().to_string();

        let properties = BasicProperties::default()
            .with_correlation_id(ShortString::from(correlation_id.as_str()))
            .with_reply_to(ShortString::from(reply_queue.as_str()))
            .with_content_type(ShortString::from("application/json"))
            .with_content_encoding(ShortString::from("utf-8"));

        channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions {
                    mandatory: false,
                    ..BasicPublishOptions::default()
                },
                body.as_bytes(),
                properties,
            )
            .await
            .map_err(broker_error)?
            .await
            .map_err(broker_error)?;

        tracing::debug!(
            queue,
            correlation_id = %correlation_id,
            reply_queue = %reply_queue,
            "rpc request published"
        );

        Ok(PendingReply {
            correlation_id,
            reply_queue,
        })
    }

    /// Awaits the reply correlated with `pending`.
    ///
    /// Resolves with the remote payload on `ok=true`, an `Rpc`-kind error on
    /// `ok=false`, the raw body when the reply does not speak the envelope,
    /// or `GatewayTimeout{TIMEOUT}` after the configured wait. The consumer
    /// subscription and the reply queue are always cleaned up, best-effort.
    pub async fn await_response(&self, pending: &PendingReply) -> AppResult<String> {
        if pending.correlation_id.is_empty() {
            return Err(AppError::internal(
                "CORRELATION_MANDATORY",
                "Correlation id is mandatory.",
            ));
        }
        if pending.reply_queue.is_empty() {
            return Err(AppError::internal(
                "REPLY_QUEUE_MANDATORY",
                "Reply queue is mandatory.",
            ));
        }

        let channel = self.channel().await?;

        let mut consumer = channel
            .basic_consume(
                &pending.reply_queue,
                "",
                BasicConsumeOptions {
                    no_ack: false,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(broker_error)?;
        let consumer_tag = consumer.tag().clone();

        let outcome = self.wait_for_reply(&mut consumer, &pending.correlation_id).await;

        // Cleanup always runs; failures must not mask the primary outcome.
        if let Err(err) = channel
            .basic_cancel(consumer_tag.as_str(), BasicCancelOptions::default())
            .await
        {
            tracing::debug!(error = %err, "failed to cancel reply consumer");
        }
        if let Err(err) = channel
            .queue_delete(&pending.reply_queue, QueueDeleteOptions::default())
            .await
        {
            tracing::debug!(
                reply_queue = %pending.reply_queue,
                error = %err,
                "failed to delete reply queue"
            );
        }

        outcome
    }

    /// Sends `body` to `queue` and awaits the correlated reply.
    pub async fn call(&self, queue: &str, body: &str) -> AppResult<String> {
        let pending = self.send_message(queue, body).await?;
        self.await_response(&pending).await
    }

    async fn wait_for_reply(
        &self,
        consumer: &mut Consumer,
        correlation_id: &str,
    ) -> AppResult<String> {
        let deadline = Instant::now() + self.settings.timeout();
        let mut shutdown = self.shutdown.clone();

        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(AppError::gateway_timeout(
                        "TIMEOUT",
                        format!("No response within {} seconds.", self.settings.timeout_secs),
                    ));
                }
                _ = cancelled(&mut shutdown) => {
                    return Err(AppError::gateway_timeout(
                        "CANCELLED",
                        "RPC cancelled by shutdown.",
                    ));
                }
                delivery = consumer.next() => {
                    let delivery = match delivery {
                        Some(Ok(delivery)) => delivery,
                        Some(Err(err)) => return Err(broker_error(err)),
                        None => {
                            return Err(AppError::internal(
                                "REPLY_STREAM_CLOSED",
                                "Reply subscription closed unexpectedly.",
                            ));
                        }
                    };

                    if let Err(err) = delivery.ack(BasicAckOptions::default()).await {
                        tracing::debug!(error = %err, "failed to ack reply delivery");
                    }

                    let matches = delivery
                        .properties
                        .correlation_id()
                        .as_ref()
                        .map(|id| id.as_str() == correlation_id)
                        .unwrap_or(false);
                    if !matches {
                        tracing::debug!("ignoring reply with mismatched correlation id");
                        continue;
                    }

                    return decode_reply(&delivery.data);
                }
            }
        }
    }

    /// Returns the shared channel, lazily (re-)opening connection and
    /// channel when either is closed.
    async fn channel(&self) -> AppResult<Channel> {
        let mut link = self.link.lock().await;

        if let Some(existing) = link.as_ref() {
            if existing.connection.status().connected() && existing.channel.status().connected() {
                return Ok(existing.channel.clone());
            }
            tracing::debug!("broker link lost, reconnecting");
        }

        let connection =
            Connection::connect(&self.settings.amqp_uri(), ConnectionProperties::default())
                .await
                .map_err(broker_error)?;
        let channel = connection.create_channel().await.map_err(broker_error)?;

        let handle = channel.clone();
        *link = Some(BrokerLink { connection, channel });
        Ok(handle)
    }
}

/// Decodes a reply body into the caller-facing result.
fn decode_reply(body: &[u8]) -> AppResult<String> {
    match serde_json::from_slice::<RpcEnvelope<String>>(body) {
        Ok(envelope) if envelope.ok => Ok(envelope.data.unwrap_or_default()),
        Ok(envelope) => {
            let error = envelope.error.unwrap_or_else(|| RpcError {
                code: "RPC_ERROR".to_string(),
                message: "Remote replied ok=false without error detail.".to_string(),
                details: None,
            });
            Err(AppError::rpc(error.code, error.message, error.details))
        }
        // Compatibility path: a peer that does not speak the envelope
        // replies with a raw body.
        Err(_) => Ok(String::from_utf8_lossy(body).into_owned()),
    }
}

/// Resolves when the shutdown signal fires; pends forever without one.
async fn cancelled(shutdown: &mut Option<watch::Receiver<bool>>) {
    match shutdown {
        Some(receiver) => loop {
            if *receiver.borrow() {
                return;
            }
            if receiver.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        },
        None => std::future::pending().await,
    }
}

fn broker_error(err: lapin::Error) -> AppError {
    AppError::internal("BROKER_ERROR", "Broker operation failed.").with_details(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mqrpc_common::ErrorKind;

    #[tokio::test]
    async fn test_send_message_validates_inputs() {
        let producer = BusProducer::new(BrokerSettings::default());

        let err = producer.send_message("", "body").await.unwrap_err();
        assert_eq!(err.code, "QUEUE_MANDATORY");
        assert_eq!(err.status(), 400);

        let err = producer.send_message("queue", "").await.unwrap_err();
        assert_eq!(err.code, "BODY_MANDATORY");
    }

    #[tokio::test]
    async fn test_await_response_validates_correlation_record() {
        let producer = BusProducer::new(BrokerSettings::default());

        let err = producer
            .await_response(&PendingReply {
                correlation_id: String::new(),
                reply_queue: "q".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, "CORRELATION_MANDATORY");
        assert_eq!(err.status(), 500);

        let err = producer
            .await_response(&PendingReply {
                correlation_id: "abc".into(),
                reply_queue: String::new(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, "REPLY_QUEUE_MANDATORY");
    }

    #[test]
    fn test_correlation_ids_are_128_bit_hex_and_unique() {
        let a = Uuid::new_v4().simple().to_string();
        let b = Uuid::new_v4().simple().to_string();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_decode_reply_success() {
        let body = br#"{"ok":true,"data":"8"}"#;
        assert_eq!(decode_reply(body).unwrap(), "8");
    }

    #[test]
    fn test_decode_reply_success_without_data_is_empty_string() {
        let body = br#"{"ok":true}"#;
        assert_eq!(decode_reply(body).unwrap(), "");
    }

    #[test]
    fn test_decode_reply_failure_becomes_rpc_error() {
        let body =
            br#"{"ok":false,"error":{"code":"NOT_FOUND","message":"Cannot find ressource"}}"#;
        let err = decode_reply(body).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Rpc);
        assert_eq!(err.code, "NOT_FOUND");
        assert_eq!(err.message, "Cannot find ressource");
    }

    #[test]
    fn test_decode_reply_compatibility_path_returns_raw_body() {
        let body = b"plain text reply";
        assert_eq!(decode_reply(body).unwrap(), "plain text reply");
    }

    #[tokio::test]
    async fn test_cancelled_resolves_when_signal_fires() {
        let (tx, rx) = watch::channel(false);
        let mut shutdown = Some(rx);

        let wait = tokio::spawn(async move {
            cancelled(&mut shutdown).await;
        });
        tx.send(true).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(1), wait)
            .await
            .expect("cancellation should resolve promptly")
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_pends_without_signal() {
        let mut shutdown = None;
        let wait = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            cancelled(&mut shutdown),
        )
        .await;
        assert!(wait.is_err(), "no signal configured, must pend");
    }
}
