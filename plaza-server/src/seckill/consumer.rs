//! Durable order pipeline consumers
//!
//! Three long-lived loops: the primary consumer materializes fresh
//! reservations, the retry consumer re-runs transient failures after their
//! backoff, and the dead-letter consumer alerts operators. All three commit
//! offsets manually after the work for a message has either finished or
//! moved to another channel, preserving at-least-once semantics.

use chrono::{DateTime, Utc};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::BorrowedMessage;
use rdkafka::{Message, Offset};
use redis::aio::ConnectionManager;
use sqlx::MySqlPool;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, SmtpConfig};
use crate::db;
use crate::email;
use crate::seckill::pipeline::{
    self, backoff_secs, OrderPublisher, ReservationMessage, MAX_RETRIES,
};

/// Cadence of the primary consumer's lag report
const LAG_REPORT_INTERVAL: Duration = Duration::from_secs(120);

/// Errors raised while materializing a reservation
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Persistent stock exhausted: business-terminal, never retried
    #[error("persistent stock exhausted")]
    StockExhausted,
    /// Store-level failure, worth retrying
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// Injected by the failure toggles, behaves like a transient fault
    #[error("injected failure")]
    Injected,
}

impl PipelineError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, PipelineError::StockExhausted)
    }
}

/// Process-scoped failure injection driven by `FORCE_SECKILL_FAIL_ONCE` /
/// `FORCE_SECKILL_FAIL_COUNT`. Each armed unit fails exactly one order
/// transaction before it reaches the store.
pub struct FailureInjector {
    remaining: AtomicU32,
}

impl FailureInjector {
    pub fn from_config(cfg: &Config) -> Self {
        let count = if cfg.force_seckill_fail_once {
            1
        } else {
            cfg.force_seckill_fail_count
        };
        if count > 0 {
            tracing::warn!(count, "Seckill failure injection armed");
        }
        Self {
            remaining: AtomicU32::new(count),
        }
    }

    /// Consume one armed failure; returns whether this call should fail
    pub fn take(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1))
            .is_ok()
    }
}

/// Shared dependencies of the primary and retry loops
#[derive(Clone)]
struct OrderConsumer {
    pool: MySqlPool,
    redis: ConnectionManager,
    publisher: Arc<OrderPublisher>,
    injector: Arc<FailureInjector>,
}

/// Spawn the primary, retry and dead-letter consumers.
///
/// Each loop drains its in-flight message before honoring the shutdown
/// token, so a committed offset always reflects completed work.
pub fn spawn_consumers(
    cfg: &Config,
    pool: MySqlPool,
    redis: ConnectionManager,
    publisher: Arc<OrderPublisher>,
    shutdown: CancellationToken,
) -> Result<Vec<JoinHandle<()>>, KafkaError> {
    let injector = Arc::new(FailureInjector::from_config(cfg));
    let deps = OrderConsumer {
        pool,
        redis,
        publisher,
        injector,
    };

    let primary = new_consumer(&cfg.kafka_brokers, &cfg.kafka_group_id)?;
    primary.subscribe(&[&cfg.kafka_topic])?;

    let retry = new_consumer(&cfg.kafka_brokers, &format!("{}-retry", cfg.kafka_group_id))?;
    retry.subscribe(&[&cfg.kafka_retry_topic])?;

    let dlq = new_consumer(&cfg.kafka_brokers, &format!("{}-dlq", cfg.kafka_group_id))?;
    dlq.subscribe(&[&cfg.kafka_dlq_topic])?;

    let smtp = cfg.smtp.clone();
    let handles = vec![
        tokio::spawn(run_order_loop(
            "primary",
            primary,
            deps.clone(),
            shutdown.clone(),
            true,
        )),
        tokio::spawn(run_order_loop(
            "retry",
            retry,
            deps,
            shutdown.clone(),
            false,
        )),
        tokio::spawn(run_dlq_loop(dlq, smtp, shutdown)),
    ];
    Ok(handles)
}

/// Build a manually committed consumer
fn new_consumer(brokers: &str, group_id: &str) -> Result<StreamConsumer, KafkaError> {
    ClientConfig::new()
        .set("bootstrap.servers", brokers)
        .set("group.id", group_id)
        .set("enable.auto.commit", "false")
        .set("auto.offset.reset", "earliest")
        .set("fetch.wait.max.ms", "1000")
        .create()
}

/// Shared loop body of the primary and retry consumers
async fn run_order_loop(
    role: &'static str,
    consumer: StreamConsumer,
    deps: OrderConsumer,
    shutdown: CancellationToken,
    report_lag: bool,
) {
    tracing::info!(role, "Order consumer started");
    let mut lag_interval = tokio::time::interval(LAG_REPORT_INTERVAL);
    lag_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = lag_interval.tick(), if report_lag => {
                report_consumer_lag(role, &consumer);
            }
            fetched = consumer.recv() => match fetched {
                Err(e) => {
                    tracing::error!(role, error = %e, "Fetch failed");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                Ok(message) => {
                    deps.handle_message(role, &consumer, &message).await;
                }
            }
        }
    }
    tracing::info!(role, "Order consumer stopped");
}

impl OrderConsumer {
    /// Process one fetched message and commit its offset.
    ///
    /// The offset is committed on every path: success, handoff to the retry
    /// channel, terminal compensation, and poisoned payloads.
    async fn handle_message(
        &self,
        role: &'static str,
        consumer: &StreamConsumer,
        message: &BorrowedMessage<'_>,
    ) {
        let payload = message.payload().unwrap_or_default();
        match serde_json::from_slice::<ReservationMessage>(payload) {
            Err(e) => {
                // Poisoned payload: skip it or the partition stalls forever
                tracing::error!(role, error = %e, "Unparseable reservation, skipping");
            }
            Ok(msg) => {
                // A requeued message carries its own earliest processing time
                let now = Utc::now().timestamp();
                if msg.next_retry_at > now {
                    let wait = (msg.next_retry_at - now) as u64;
                    tracing::debug!(role, order_id = msg.order_id, wait, "Backoff gate");
                    tokio::time::sleep(Duration::from_secs(wait)).await;
                }

                match self.create_order(&msg).await {
                    Ok(()) => {
                        tracing::info!(role, order_id = msg.order_id, "Order materialized");
                    }
                    Err(e) if e.is_retryable() => {
                        tracing::warn!(
                            role,
                            order_id = msg.order_id,
                            error = %e,
                            "Order transaction failed"
                        );
                        self.publish_retry_or_dlq(msg, &e).await;
                    }
                    Err(_) => {
                        // Persistent stock exhausted: give the ephemeral
                        // unit back, nothing further to persist
                        tracing::warn!(
                            role,
                            order_id = msg.order_id,
                            voucher_id = msg.voucher_id,
                            "Persistent stock exhausted, compensating"
                        );
                        pipeline::compensate(&self.redis, msg.voucher_id, msg.user_id).await;
                    }
                }
            }
        }

        if let Err(e) = consumer.commit_message(message, CommitMode::Sync) {
            tracing::error!(role, error = %e, "Offset commit failed");
        }
    }

    /// Insert the order row and deduct persistent stock in one transaction.
    ///
    /// A duplicate order id means this reservation was already materialized;
    /// the replay succeeds without touching stock again.
    async fn create_order(&self, msg: &ReservationMessage) -> Result<(), PipelineError> {
        if self.injector.take() {
            return Err(PipelineError::Injected);
        }

        let mut tx = self.pool.begin().await?;
        let created_at =
            DateTime::from_timestamp(msg.created_at, 0).unwrap_or_else(Utc::now);

        if let Err(e) =
            db::voucher::insert_order(&mut tx, msg.order_id, msg.user_id, msg.voucher_id, created_at)
                .await
        {
            if db::is_duplicate_key(&e) {
                tracing::info!(
                    order_id = msg.order_id,
                    "Duplicate order id, replay treated as success"
                );
                return Ok(());
            }
            return Err(e.into());
        }

        let affected = db::voucher::decrement_stock(&mut tx, msg.voucher_id).await?;
        if affected == 0 {
            return Err(PipelineError::StockExhausted);
        }

        tx.commit().await?;
        Ok(())
    }

    /// Route a failed reservation: retry with backoff, or compensate and
    /// dead-letter once the attempts are exhausted.
    async fn publish_retry_or_dlq(&self, mut msg: ReservationMessage, err: &PipelineError) {
        if !err.is_retryable() {
            pipeline::compensate(&self.redis, msg.voucher_id, msg.user_id).await;
            return;
        }

        msg.retry_count += 1;
        let backoff = backoff_secs(msg.retry_count);
        msg.next_retry_at = Utc::now().timestamp() + backoff as i64;
        msg.last_error = err.to_string();

        if msg.retry_count <= MAX_RETRIES {
            tracing::warn!(
                order_id = msg.order_id,
                retry_count = msg.retry_count,
                backoff_secs = backoff,
                "Requeueing reservation"
            );
            if let Err(e) = self.publisher.publish_retry(&msg).await {
                tracing::error!(
                    order_id = msg.order_id,
                    error = %e,
                    "Retry publish failed, reservation stalls until the broker recovers"
                );
            }
        } else {
            tracing::error!(
                order_id = msg.order_id,
                voucher_id = msg.voucher_id,
                last_error = %msg.last_error,
                "Retries exhausted, dead-lettering"
            );
            pipeline::compensate(&self.redis, msg.voucher_id, msg.user_id).await;
            if let Err(e) = self.publisher.publish_dlq(&msg).await {
                tracing::error!(order_id = msg.order_id, error = %e, "DLQ publish failed");
            }
        }
    }
}

/// Dead-letter consumer: alert and commit, never retry
async fn run_dlq_loop(consumer: StreamConsumer, smtp: SmtpConfig, shutdown: CancellationToken) {
    tracing::info!("Dead-letter consumer started");
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            fetched = consumer.recv() => match fetched {
                Err(e) => {
                    tracing::error!(error = %e, "Dead-letter fetch failed");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                Ok(message) => {
                    handle_dead_letter(&smtp, &message).await;
                    if let Err(e) = consumer.commit_message(&message, CommitMode::Sync) {
                        tracing::error!(error = %e, "Dead-letter offset commit failed");
                    }
                }
            }
        }
    }
    tracing::info!("Dead-letter consumer stopped");
}

async fn handle_dead_letter(smtp: &SmtpConfig, message: &BorrowedMessage<'_>) {
    let payload = message.payload().unwrap_or_default();
    let msg: ReservationMessage = match serde_json::from_slice(payload) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, "Unparseable dead-letter payload, skipping");
            return;
        }
    };

    tracing::error!(
        order_id = msg.order_id,
        user_id = msg.user_id,
        voucher_id = msg.voucher_id,
        retry_count = msg.retry_count,
        last_error = %msg.last_error,
        "Reservation dead-lettered"
    );

    if smtp.is_configured() {
        if let Err(e) = email::send_dead_letter_alert(smtp, &msg).await {
            tracing::error!(order_id = msg.order_id, error = %e, "Alert mail failed");
        }
    }
}

/// Sum of `high watermark − position` across the assignment
fn report_consumer_lag(role: &str, consumer: &StreamConsumer) {
    let assignment = match consumer.assignment() {
        Ok(a) => a,
        Err(e) => {
            tracing::debug!(role, error = %e, "No assignment for lag report");
            return;
        }
    };
    let position = consumer.position().ok();

    let mut total_lag = 0i64;
    for elem in assignment.elements() {
        let (low, high) = match consumer.fetch_watermarks(
            elem.topic(),
            elem.partition(),
            Duration::from_secs(2),
        ) {
            Ok(w) => w,
            Err(_) => continue,
        };
        let current = position
            .as_ref()
            .and_then(|p| p.find_partition(elem.topic(), elem.partition()))
            .map(|tp| tp.offset());
        let current = match current {
            Some(Offset::Offset(o)) => o,
            _ => low,
        };
        total_lag += (high - current).max(0);
    }
    tracing::info!(role, lag = total_lag, "Consumer lag");
}
