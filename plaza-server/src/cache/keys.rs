//! Redis key prefixes and TTLs shared by the cache engine and the
//! flash-sale pipeline. The formats are a wire contract: admission, the
//! consumers and the compensation path all address the same keys.

use std::time::Duration;

/// Shop JSON / logical-expiry envelope: `cache:shop:<shopId>`
pub const CACHE_SHOP_KEY: &str = "cache:shop:";
/// Shop cache TTL (mutex flow)
pub const CACHE_SHOP_TTL: Duration = Duration::from_secs(30 * 60);
/// Empty sentinel TTL (anti-penetration marker)
pub const CACHE_NULL_TTL: Duration = Duration::from_secs(2 * 60);

/// Per-shop loader mutex: `lock:shop:<shopId>`
pub const LOCK_SHOP_KEY: &str = "lock:shop:";
/// Mutex TTL, bounds a crashed loader
pub const LOCK_SHOP_TTL: Duration = Duration::from_secs(10);
/// Sleep between mutex acquisition attempts
pub const LOCK_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Ephemeral flash-sale stock counter: `seckill:stock:vid:<voucherId>`
pub const SECKILL_STOCK_KEY: &str = "seckill:stock:vid:";
/// Per-voucher set of admitted users: `order:vid:<voucherId>`
pub const SECKILL_ORDER_SET_KEY: &str = "order:vid:";

/// Shop Bloom filter bitmap
pub const SHOP_BLOOM_KEY: &str = "bloom:shop";

/// Id-worker daily counters: `icr:<prefix>:<yyyy:MM:dd>`
pub const ICR_KEY_PREFIX: &str = "icr:";

/// Default page size for shop listings
pub const DEFAULT_PAGE_SIZE: i64 = 5;

/// Key of the cached shop entry
pub fn shop_key(id: i64) -> String {
    format!("{CACHE_SHOP_KEY}{id}")
}

/// Key of the per-shop loader mutex
pub fn shop_lock_key(id: i64) -> String {
    format!("{LOCK_SHOP_KEY}{id}")
}

/// Key of the ephemeral stock counter
pub fn stock_key(voucher_id: i64) -> String {
    format!("{SECKILL_STOCK_KEY}{voucher_id}")
}

/// Key of the admitted-user set
pub fn order_set_key(voucher_id: i64) -> String {
    format!("{SECKILL_ORDER_SET_KEY}{voucher_id}")
}
