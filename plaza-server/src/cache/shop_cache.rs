//! Two-tier shop cache
//!
//! Read path: L1 (in-process) → L2 (Redis) → MySQL. Two L2 formats exist
//! and never mix on the same key: the mutex flow stores raw shop JSON with
//! a real Redis TTL, the logical-expiry flow stores an envelope carrying
//! its own expiry and no Redis TTL. The empty-string sentinel marks ids
//! known to be absent; it belongs to the mutex flow only.

use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use shared::error::{AppError, ErrorCode};
use shared::models::{Shop, ShopUpdate};
use sqlx::MySqlPool;
use std::sync::Arc;
use std::time::Duration;

use super::bloom::BloomFilter;
use super::keys;
use super::local::LocalCache;
use crate::db;
use crate::error::{ServiceError, ServiceResult};

/// Logical-expiry envelope stored on L2 for pre-warmed hot keys
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicalEnvelope {
    pub expire_time: DateTime<Utc>,
    pub data: serde_json::Value,
}

impl LogicalEnvelope {
    /// Whether the embedded expiry is still in the future
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expire_time > now
    }
}

/// Two-tier shop cache with Bloom admission
#[derive(Clone)]
pub struct ShopCache {
    pool: MySqlPool,
    redis: ConnectionManager,
    local: Arc<LocalCache>,
    bloom: BloomFilter,
}

impl ShopCache {
    pub fn new(pool: MySqlPool, redis: ConnectionManager, local_ttl: Duration) -> Self {
        let bloom = BloomFilter::new(redis.clone());
        Self {
            pool,
            redis,
            local: Arc::new(LocalCache::new(local_ttl)),
            bloom,
        }
    }

    /// The Bloom filter guarding this cache (exposed for warm-up)
    pub fn bloom(&self) -> &BloomFilter {
        &self.bloom
    }

    /// Mutex flow: fetch a shop, coalescing concurrent loaders of a missing
    /// key onto a single database read.
    ///
    /// Returns `Ok(None)` when the id is known to be absent.
    pub async fn get_by_id(&self, id: i64) -> ServiceResult<Option<Shop>> {
        if let Some(shop) = self.local.get(id) {
            tracing::debug!(shop_id = id, "shop cache hit (local)");
            return Ok(Some(shop));
        }

        let key = keys::shop_key(id);
        let lock_key = keys::shop_lock_key(id);
        let mut conn = self.redis.clone();

        loop {
            let cached: Option<String> = conn.get(&key).await?;
            if let Some(cached) = cached {
                return self.decode_cached(&cached);
            }

            // Miss: try to become the single loader; everyone else naps and
            // re-reads the cache.
            if !self.try_lock(&lock_key).await? {
                tokio::time::sleep(keys::LOCK_RETRY_DELAY).await;
                continue;
            }

            let result = self.load_locked(&mut conn, id, &key).await;
            self.unlock(&lock_key).await;
            return result;
        }
    }

    /// Double-check under the lock, then fall back to the database
    async fn load_locked(
        &self,
        conn: &mut ConnectionManager,
        id: i64,
        key: &str,
    ) -> ServiceResult<Option<Shop>> {
        let cached: Option<String> = conn.get(key).await?;
        if let Some(cached) = cached {
            return self.decode_cached(&cached);
        }

        match db::shop::find_by_id(&self.pool, id).await? {
            None => {
                // Anti-penetration sentinel: remember the absence briefly
                let _: () = conn
                    .set_ex(key, "", keys::CACHE_NULL_TTL.as_secs())
                    .await?;
                Ok(None)
            }
            Some(shop) => {
                let json = serde_json::to_string(&shop)?;
                let _: () = conn
                    .set_ex(key, json, keys::CACHE_SHOP_TTL.as_secs())
                    .await?;
                self.local.insert(shop.clone());
                Ok(Some(shop))
            }
        }
    }

    fn decode_cached(&self, cached: &str) -> ServiceResult<Option<Shop>> {
        if cached.is_empty() {
            return Ok(None);
        }
        let shop: Shop = serde_json::from_str(cached)?;
        self.local.insert(shop.clone());
        Ok(Some(shop))
    }

    /// Logical-expiry flow for pre-warmed hot keys: never blocks a reader.
    ///
    /// A stale envelope is served as-is while at most one detached task
    /// rebuilds it; `Ok(None)` means the key was never warmed.
    pub async fn get_by_id_logical(&self, id: i64) -> ServiceResult<Option<Shop>> {
        let key = keys::shop_key(id);
        let mut conn = self.redis.clone();

        let cached: Option<String> = conn.get(&key).await?;
        let Some(cached) = cached else {
            return Ok(None);
        };
        if cached.is_empty() {
            return Ok(None);
        }

        let envelope: LogicalEnvelope = serde_json::from_str(&cached)?;
        let shop: Shop = serde_json::from_value(envelope.data.clone())?;
        if envelope.is_fresh(Utc::now()) {
            return Ok(Some(shop));
        }

        // Stale: whoever wins the lock rebuilds in the background, every
        // reader (winner included) returns the stale data immediately.
        let lock_key = keys::shop_lock_key(id);
        if self.try_lock(&lock_key).await? {
            let this = self.clone();
            tokio::spawn(async move {
                if let Err(e) = this.rebuild_logical(id).await {
                    tracing::error!(shop_id = id, error = %e, "Logical cache rebuild failed");
                }
                this.unlock(&lock_key).await;
            });
        }
        Ok(Some(shop))
    }

    /// Bloom-guarded read: reject ids the filter has never seen without
    /// touching L1, L2 or the database.
    pub async fn get_by_id_with_bloom(&self, id: i64) -> ServiceResult<Option<Shop>> {
        if !self.bloom.might_contain(id).await? {
            tracing::debug!(shop_id = id, "Bloom filter rejected shop id");
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    /// Update the shop row and invalidate both cache tiers.
    ///
    /// The L2 delete happens inside the transaction window: if it fails the
    /// row update rolls back, bounding the inconsistency window. The L1
    /// delete follows the commit.
    pub async fn update(&self, upd: &ShopUpdate) -> ServiceResult<()> {
        if upd.id == 0 {
            return Err(AppError::invalid_request("invalid shop id").into());
        }
        let key = keys::shop_key(upd.id);

        let mut tx = self.pool.begin().await?;
        let affected = db::shop::update_in_tx(&mut tx, upd).await?;
        if affected == 0 {
            return Err(ServiceError::App(AppError::new(ErrorCode::ShopNotFound)));
        }

        let mut conn = self.redis.clone();
        if let Err(e) = conn.del::<_, ()>(&key).await {
            tx.rollback().await.ok();
            return Err(e.into());
        }

        tx.commit().await?;
        self.local.remove(upd.id);
        Ok(())
    }

    /// Pre-warm a hot key with a logical-expiry envelope
    pub async fn warm_logical(&self, id: i64, ttl: Duration) -> ServiceResult<bool> {
        match db::shop::find_by_id(&self.pool, id).await? {
            None => Ok(false),
            Some(shop) => {
                self.save_logical(&shop, ttl).await?;
                Ok(true)
            }
        }
    }

    /// Re-read the row and write a fresh envelope
    async fn rebuild_logical(&self, id: i64) -> Result<(), db::BoxError> {
        let Some(shop) = db::shop::find_by_id(&self.pool, id).await? else {
            return Ok(());
        };
        self.save_logical(&shop, keys::CACHE_SHOP_TTL).await
    }

    /// Write the envelope without a Redis TTL; the expiry is logical only
    async fn save_logical(&self, shop: &Shop, ttl: Duration) -> Result<(), db::BoxError> {
        let envelope = LogicalEnvelope {
            expire_time: Utc::now() + chrono::Duration::from_std(ttl)?,
            data: serde_json::to_value(shop)?,
        };
        let json = serde_json::to_string(&envelope)?;
        let mut conn = self.redis.clone();
        let _: () = conn.set(keys::shop_key(shop.id), json).await?;
        Ok(())
    }

    /// SET NX with a TTL so a crashed loader cannot deadlock the key
    async fn try_lock(&self, lock_key: &str) -> Result<bool, redis::RedisError> {
        let mut conn = self.redis.clone();
        let res: Option<String> = redis::cmd("SET")
            .arg(lock_key)
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(keys::LOCK_SHOP_TTL.as_secs())
            .query_async(&mut conn)
            .await?;
        Ok(res.is_some())
    }

    /// A failed unlock is logged, not fatal: the lock TTL bounds the damage
    async fn unlock(&self, lock_key: &str) {
        let mut conn = self.redis.clone();
        if let Err(e) = conn.del::<_, ()>(lock_key).await {
            tracing::warn!(key = lock_key, error = %e, "Failed to release shop lock");
        }
    }
}
