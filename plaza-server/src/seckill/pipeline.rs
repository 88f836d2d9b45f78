//! Reservation wire format, Kafka publication and ephemeral compensation
//!
//! Messages are keyed by `voucherId` so every reservation for one voucher
//! lands in the same partition and is consumed in FIFO order. Writes use
//! full-ISR acknowledgement.

use rdkafka::config::ClientConfig;
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::cache::keys;
use crate::db::BoxError;

/// Retries before a reservation is dead-lettered
pub const MAX_RETRIES: i32 = 3;
/// Backoff ceiling in seconds
pub const MAX_BACKOFF_SECS: u64 = 30;

/// In-flight record of an admitted purchase.
///
/// `orderId` is assigned once at admission and anchors idempotency through
/// the whole pipeline. The retry fields default to zero so primary
/// publications stay compact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationMessage {
    pub order_id: i64,
    pub user_id: i64,
    pub voucher_id: i64,
    /// Admission time, unix seconds
    pub created_at: i64,
    #[serde(default)]
    pub retry_count: i32,
    /// Earliest processing time, unix seconds; zero means immediately
    #[serde(default)]
    pub next_retry_at: i64,
    #[serde(default)]
    pub last_error: String,
}

impl ReservationMessage {
    pub fn new(order_id: i64, user_id: i64, voucher_id: i64, created_at: i64) -> Self {
        Self {
            order_id,
            user_id,
            voucher_id,
            created_at,
            retry_count: 0,
            next_retry_at: 0,
            last_error: String::new(),
        }
    }
}

/// Exponential backoff, capped: 1s, 2s, 4s, ... up to 30s
pub fn backoff_secs(retry_count: i32) -> u64 {
    let exp = retry_count.saturating_sub(1).clamp(0, 62) as u32;
    (1u64 << exp).min(MAX_BACKOFF_SECS)
}

/// Build the shared producer: strong acks, hash partitioning by key
pub fn new_producer(brokers: &str) -> Result<FutureProducer, KafkaError> {
    ClientConfig::new()
        .set("bootstrap.servers", brokers)
        .set("acks", "all")
        .set("retries", "5")
        .set("retry.backoff.ms", "200")
        .set("message.timeout.ms", "5000")
        .create()
}

/// Publisher for the three pipeline topics
pub struct OrderPublisher {
    producer: FutureProducer,
    topic: String,
    retry_topic: String,
    dlq_topic: String,
}

impl OrderPublisher {
    pub fn new(
        producer: FutureProducer,
        topic: String,
        retry_topic: String,
        dlq_topic: String,
    ) -> Self {
        Self {
            producer,
            topic,
            retry_topic,
            dlq_topic,
        }
    }

    /// Publish a fresh reservation to the primary topic
    pub async fn publish_primary(&self, msg: &ReservationMessage) -> Result<(), BoxError> {
        self.publish(&self.topic, msg).await
    }

    /// Publish a transiently failed reservation to the retry topic
    pub async fn publish_retry(&self, msg: &ReservationMessage) -> Result<(), BoxError> {
        self.publish(&self.retry_topic, msg).await
    }

    /// Publish an exhausted reservation to the dead-letter topic
    pub async fn publish_dlq(&self, msg: &ReservationMessage) -> Result<(), BoxError> {
        self.publish(&self.dlq_topic, msg).await
    }

    async fn publish(&self, topic: &str, msg: &ReservationMessage) -> Result<(), BoxError> {
        let payload = serde_json::to_vec(msg)?;
        let key = msg.voucher_id.to_string();
        self.producer
            .send(
                FutureRecord::to(topic).key(&key).payload(&payload),
                Timeout::After(Duration::from_secs(5)),
            )
            .await
            .map_err(|(e, _)| e)?;
        Ok(())
    }
}

/// Undo an admission's ephemeral effects: give the stock unit back and
/// re-allow the user. Best-effort: the authoritative stock lives in MySQL
/// and reconciles naturally.
pub async fn compensate(redis: &ConnectionManager, voucher_id: i64, user_id: i64) {
    let mut conn = redis.clone();
    let result: Result<(), redis::RedisError> = redis::pipe()
        .cmd("INCR")
        .arg(keys::stock_key(voucher_id))
        .ignore()
        .cmd("SREM")
        .arg(keys::order_set_key(voucher_id))
        .arg(user_id)
        .ignore()
        .query_async(&mut conn)
        .await;
    match result {
        Ok(()) => tracing::info!(voucher_id, user_id, "Compensated ephemeral stock"),
        Err(e) => tracing::error!(
            voucher_id,
            user_id,
            error = %e,
            "Ephemeral compensation failed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_schedule() {
        assert_eq!(backoff_secs(1), 1);
        assert_eq!(backoff_secs(2), 2);
        assert_eq!(backoff_secs(3), 4);
        assert_eq!(backoff_secs(4), 8);
        assert_eq!(backoff_secs(5), 16);
        assert_eq!(backoff_secs(6), 30);
        assert_eq!(backoff_secs(100), 30);
    }

    #[test]
    fn test_backoff_degenerate_input() {
        // retry_count is incremented before the backoff is computed, but a
        // malformed message could carry zero
        assert_eq!(backoff_secs(0), 1);
        assert_eq!(backoff_secs(-5), 1);
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let msg = ReservationMessage::new(42, 7, 12, 1_700_000_000);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["orderId"], 42);
        assert_eq!(json["userId"], 7);
        assert_eq!(json["voucherId"], 12);
        assert_eq!(json["createdAt"], 1_700_000_000i64);
        assert_eq!(json["retryCount"], 0);
    }

    #[test]
    fn test_parse_without_retry_fields() {
        // Primary publications predate the retry fields; they must default
        let msg: ReservationMessage = serde_json::from_str(
            r#"{"orderId":1,"userId":2,"voucherId":3,"createdAt":4}"#,
        )
        .unwrap();
        assert_eq!(msg.retry_count, 0);
        assert_eq!(msg.next_retry_at, 0);
        assert!(msg.last_error.is_empty());
    }
}
