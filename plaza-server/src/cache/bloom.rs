//! Bloom admission filter for shop ids
//!
//! A single Redis bitmap (`bloom:shop`, 2^20 bits) guarded by k = 3 FNV-1a
//! hashes with additive seeds. A clear bit proves absence; set bits only
//! ever accumulate until an external rebuild. The filter is warmed with
//! every existing shop id at startup, so false negatives cannot occur.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::keys::SHOP_BLOOM_KEY;
use crate::db;

/// Bitmap length in bits
const BLOOM_SIZE: u32 = 1 << 20;
/// Additive seeds, one per hash
const BLOOM_SEEDS: [u32; 3] = [17, 29, 37];

/// Bloom filter over the shop id space
#[derive(Clone)]
pub struct BloomFilter {
    redis: ConnectionManager,
}

impl BloomFilter {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    /// Check whether an id may exist. `false` is definitive.
    pub async fn might_contain(&self, id: i64) -> Result<bool, redis::RedisError> {
        let mut conn = self.redis.clone();
        for offset in bloom_offsets(id) {
            let bit: bool = conn.getbit(SHOP_BLOOM_KEY, offset as usize).await?;
            if !bit {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Record an id as existing
    pub async fn add(&self, id: i64) -> Result<(), redis::RedisError> {
        let mut conn = self.redis.clone();
        let mut pipe = redis::pipe();
        for offset in bloom_offsets(id) {
            pipe.cmd("SETBIT")
                .arg(SHOP_BLOOM_KEY)
                .arg(offset)
                .arg(1)
                .ignore();
        }
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    /// Seed the filter with every existing shop id
    pub async fn warm(&self, pool: &sqlx::MySqlPool) -> Result<usize, crate::db::BoxError> {
        let ids = db::shop::all_ids(pool).await?;
        for &id in &ids {
            self.add(id).await?;
        }
        tracing::info!(count = ids.len(), "Bloom filter warmed with shop ids");
        Ok(ids.len())
    }
}

/// Derive the k bit offsets for an id
fn bloom_offsets(id: i64) -> [u32; 3] {
    let hash = fnv1a32(id.to_string().as_bytes());
    BLOOM_SEEDS.map(|seed| hash.wrapping_add(seed) % BLOOM_SIZE)
}

/// 32-bit FNV-1a over raw bytes
fn fnv1a32(bytes: &[u8]) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 16_777_619;
    let mut hash = OFFSET_BASIS;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}
