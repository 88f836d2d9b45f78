//! Shared scaffolding for service-backed integration tests
//!
//! Every test talks to the real backing services (MySQL, Redis, Kafka).
//! When a service is unreachable the test prints a skip note and passes,
//! mirroring local-development environments without the full stack.

#![allow(dead_code)]

use chrono::{Duration as ChronoDuration, Utc};
use redis::AsyncCommands;

use plaza_server::cache::keys;
use plaza_server::db;
use plaza_server::{AppState, Config};
use shared::models::Voucher;

pub struct TestCtx {
    pub config: Config,
    pub state: AppState,
}

impl TestCtx {
    /// Connect to the live backing services; `None` means skip the test.
    pub async fn new() -> Option<Self> {
        let mut config = Config::from_env();
        // Unique topics and consumer group per test so parallel tests and
        // leftover offsets from earlier runs cannot cross-talk (brokers in
        // the dev stack auto-create topics)
        let nonce = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        config.kafka_group_id = format!("{}-{nonce}", config.kafka_group_id);
        config.kafka_topic = format!("{}-{nonce}", config.kafka_topic);
        config.kafka_retry_topic = format!("{}-{nonce}", config.kafka_retry_topic);
        config.kafka_dlq_topic = format!("{}-{nonce}", config.kafka_dlq_topic);

        match AppState::new(&config).await {
            Ok(state) => Some(Self { config, state }),
            Err(e) => {
                eprintln!("skip: backing services unreachable: {e}");
                None
            }
        }
    }

    /// Whether the configured broker accepts TCP connections
    pub async fn kafka_reachable(&self) -> bool {
        let broker = self
            .config
            .kafka_brokers
            .split(',')
            .next()
            .unwrap_or_default();
        tokio::net::TcpStream::connect(broker).await.is_ok()
    }

    /// Insert a flash-sale voucher with an open window and seed the
    /// ephemeral stock; returns the voucher id.
    pub async fn seed_seckill_voucher(&self, stock: i32) -> i64 {
        let now = Utc::now();
        let voucher = Voucher {
            id: 0,
            shop_id: 1,
            title: "integration test voucher".into(),
            sub_title: String::new(),
            rules: String::new(),
            pay_value: 8000,
            actual_value: 10000,
            voucher_type: 1,
            status: 1,
            create_time: now,
            update_time: now,
            stock: Some(stock),
            begin_time: Some(now - ChronoDuration::minutes(1)),
            end_time: Some(now + ChronoDuration::minutes(5)),
        };
        let voucher_id = db::voucher::add_seckill_voucher(&self.state.pool, &voucher)
            .await
            .expect("seed voucher");

        let mut conn = self.state.redis.clone();
        let _: () = conn
            .set(keys::stock_key(voucher_id), stock)
            .await
            .expect("seed redis stock");
        let _: () = conn
            .del(keys::order_set_key(voucher_id))
            .await
            .expect("clear order set");

        voucher_id
    }

    /// Count order rows for a (voucher, user) pair
    pub async fn order_count(&self, voucher_id: i64, user_id: i64) -> i64 {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM tb_voucher_order WHERE voucher_id = ? AND user_id = ?",
        )
        .bind(voucher_id)
        .bind(user_id)
        .fetch_one(&self.state.pool)
        .await
        .expect("count orders");
        count
    }

    /// Current persistent stock of a voucher
    pub async fn persistent_stock(&self, voucher_id: i64) -> i32 {
        let (stock,): (i32,) =
            sqlx::query_as("SELECT stock FROM tb_seckill_voucher WHERE voucher_id = ?")
                .bind(voucher_id)
                .fetch_one(&self.state.pool)
                .await
                .expect("query stock");
        stock
    }

    /// Poll until the expected order count appears or the deadline passes
    pub async fn wait_for_order_count(
        &self,
        voucher_id: i64,
        user_id: i64,
        expected: i64,
        deadline: std::time::Duration,
    ) -> bool {
        let start = std::time::Instant::now();
        loop {
            if self.order_count(voucher_id, user_id).await == expected {
                return true;
            }
            if start.elapsed() > deadline {
                return false;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
    }
}
