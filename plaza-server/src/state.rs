//! Application state for plaza-server

use redis::aio::ConnectionManager;
use sqlx::mysql::MySqlPoolOptions;
use sqlx::MySqlPool;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::ShopCache;
use crate::config::Config;
use crate::seckill::{pipeline, OrderPublisher, SeckillService};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// MySQL connection pool
    pub pool: MySqlPool,
    /// Redis connection (auto-reconnecting)
    pub redis: ConnectionManager,
    /// Two-tier shop cache with Bloom admission
    pub shop_cache: ShopCache,
    /// Flash-sale reservation entrypoint
    pub seckill: Arc<SeckillService>,
    /// Kafka publisher shared by admission and the consumers
    pub publisher: Arc<OrderPublisher>,
}

impl AppState {
    /// Create a new AppState
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        // Connect to MySQL; the cap keeps a reservation burst from
        // exhausting the server's connection limit
        let pool = MySqlPoolOptions::new()
            .max_connections(50)
            .connect(&config.database_url)
            .await?;

        // Run migrations
        sqlx::migrate!("./migrations").run(&pool).await?;

        // Redis connection manager reconnects on its own
        let client = redis::Client::open(config.redis_url.as_str())?;
        let redis = client.get_connection_manager().await?;

        // Kafka producer, shared by admission and the retry path
        let producer = pipeline::new_producer(&config.kafka_brokers)?;
        let publisher = Arc::new(OrderPublisher::new(
            producer,
            config.kafka_topic.clone(),
            config.kafka_retry_topic.clone(),
            config.kafka_dlq_topic.clone(),
        ));

        let shop_cache = ShopCache::new(
            pool.clone(),
            redis.clone(),
            Duration::from_secs(config.shop_local_cache_ttl_secs),
        );
        let seckill = Arc::new(SeckillService::new(
            pool.clone(),
            redis.clone(),
            publisher.clone(),
        ));

        Ok(Self {
            pool,
            redis,
            shop_cache,
            seckill,
            publisher,
        })
    }
}
