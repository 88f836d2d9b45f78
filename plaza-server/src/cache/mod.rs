//! Hot-key cache engine for shop lookup
//!
//! Three complementary strategies:
//! - per-id Redis mutex against cache stampede ([`ShopCache::get_by_id`])
//! - logical-expiry envelopes for the hottest keys
//!   ([`ShopCache::get_by_id_logical`])
//! - a Bloom admission filter against cache penetration ([`BloomFilter`])
//!
//! L1 is an in-process map with a short TTL; L2 is Redis. The empty-string
//! sentinel on L2 marks ids known to be absent.

pub mod bloom;
pub mod keys;
pub mod local;
pub mod shop_cache;

pub use bloom::BloomFilter;
pub use local::LocalCache;
pub use shop_cache::ShopCache;
