//! Globally unique order id generation
//!
//! Layout of the 63-bit id: top bit zero, 31 bits of seconds since the
//! configured epoch, 32 bits of a per-day sequence taken from a Redis
//! counter. Redis executes `INCR` atomically, so ids are collision-free
//! across the whole cluster; the time prefix keeps them roughly sortable.

use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use thiserror::Error;

use crate::cache::keys::ICR_KEY_PREFIX;

/// Epoch: 2024-01-01 00:00:00 UTC
const BEGIN_TIMESTAMP: i64 = 1_704_067_200;
/// 31-bit timestamp ceiling
const MAX_TIMESTAMP: i64 = (1 << 31) - 1;
/// 32-bit sequence ceiling
const MAX_SEQUENCE: i64 = (1_i64 << 32) - 1;
/// Daily counter TTL, with slack past the day boundary
const COUNTER_TTL_SECS: i64 = 48 * 60 * 60;

#[derive(Debug, Error)]
pub enum IdWorkerError {
    #[error("timestamp {0} outside the 31-bit epoch window")]
    EpochOutOfRange(i64),
    #[error("sequence overflow: {0} exceeds {MAX_SEQUENCE}")]
    SequenceOverflow(i64),
    #[error("failed to set expiration for counter key {0}")]
    CounterExpiry(String),
    #[error(transparent)]
    Redis(#[from] redis::RedisError),
}

/// Redis-backed id generator
#[derive(Clone)]
pub struct IdWorker {
    redis: ConnectionManager,
}

impl IdWorker {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    /// Generate the next id for a key prefix (e.g. "order")
    pub async fn next_id(&self, key_prefix: &str) -> Result<i64, IdWorkerError> {
        let now = Utc::now();
        let timestamp = now.timestamp() - BEGIN_TIMESTAMP;
        if !(0..=MAX_TIMESTAMP).contains(&timestamp) {
            return Err(IdWorkerError::EpochOutOfRange(timestamp));
        }

        let date = now.format("%Y:%m:%d");
        let key = format!("{ICR_KEY_PREFIX}{key_prefix}:{date}");

        let mut conn = self.redis.clone();
        let count: i64 = conn.incr(&key, 1).await?;
        if count == 1 {
            // Only the first increment of the day sets the TTL, so later
            // writes never refresh it.
            let ok: bool = conn.expire(&key, COUNTER_TTL_SECS).await?;
            if !ok {
                return Err(IdWorkerError::CounterExpiry(key));
            }
        }
        if count > MAX_SEQUENCE {
            return Err(IdWorkerError::SequenceOverflow(count));
        }

        Ok(compose_id(timestamp, count))
    }
}

/// Combine the epoch-relative seconds and the sequence into one id
pub(crate) const fn compose_id(timestamp: i64, sequence: i64) -> i64 {
    (timestamp << 32) | sequence
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_layout() {
        let id = compose_id(1, 1);
        assert_eq!(id, (1 << 32) | 1);

        // timestamp occupies the upper bits, sequence the lower 32
        let id = compose_id(123, 456);
        assert_eq!(id >> 32, 123);
        assert_eq!(id & 0xFFFF_FFFF, 456);
    }

    #[test]
    fn test_compose_monotonic_within_second() {
        let a = compose_id(100, 1);
        let b = compose_id(100, 2);
        assert!(b > a);
    }

    #[test]
    fn test_compose_monotonic_across_seconds() {
        // A later second always beats any sequence of an earlier one
        let late = compose_id(101, 1);
        let early = compose_id(100, MAX_SEQUENCE);
        assert!(late > early);
    }

    #[test]
    fn test_top_bit_stays_zero() {
        let id = compose_id(MAX_TIMESTAMP, MAX_SEQUENCE);
        assert!(id > 0);
        assert_eq!(id >> 63, 0);
    }

    #[test]
    fn test_epoch_window() {
        assert!((0..=MAX_TIMESTAMP).contains(&0));
        assert!((0..=MAX_TIMESTAMP).contains(&MAX_TIMESTAMP));
        assert!(!(0..=MAX_TIMESTAMP).contains(&-1));
        assert!(!(0..=MAX_TIMESTAMP).contains(&(MAX_TIMESTAMP + 1)));
    }
}
