//! In-process L1 shop cache
//!
//! A `DashMap` keyed by shop id with a short per-entry TTL. Concurrent
//! writers race benignly: the last overwrite wins, readers drop expired
//! entries on access. There is no background sweeper; the map is bounded
//! by the working set of hot shops and the TTL keeps it fresh.

use dashmap::DashMap;
use shared::models::Shop;
use std::time::Duration;
use tokio::time::Instant;

struct Entry {
    shop: Shop,
    expires_at: Instant,
}

/// In-process shop cache with per-entry TTL
pub struct LocalCache {
    map: DashMap<i64, Entry>,
    ttl: Duration,
}

impl LocalCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            map: DashMap::new(),
            ttl,
        }
    }

    /// Fetch a shop if present and not expired
    pub fn get(&self, id: i64) -> Option<Shop> {
        let entry = self.map.get(&id)?;
        if Instant::now() >= entry.expires_at {
            drop(entry);
            self.map.remove(&id);
            return None;
        }
        Some(entry.shop.clone())
    }

    /// Insert or overwrite a shop
    pub fn insert(&self, shop: Shop) {
        self.map.insert(
            shop.id,
            Entry {
                shop,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Drop a shop (cache invalidation)
    pub fn remove(&self, id: i64) {
        self.map.remove(&id);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.map.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn shop(id: i64) -> Shop {
        let now = Utc::now();
        Shop {
            id,
            name: format!("shop-{id}"),
            type_id: 1,
            images: String::new(),
            area: "centro".into(),
            address: "calle mayor 1".into(),
            avg_price: 80,
            sold: 0,
            comments: 0,
            score: 45,
            open_hours: "10:00-22:00".into(),
            create_time: now,
            update_time: now,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = LocalCache::new(Duration::from_secs(30));
        cache.insert(shop(1));
        assert_eq!(cache.get(1).unwrap().name, "shop-1");

        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(cache.get(1).is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get(1).is_none());
        // expired entry is removed on read
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_refreshes_ttl() {
        let cache = LocalCache::new(Duration::from_secs(30));
        cache.insert(shop(1));

        tokio::time::advance(Duration::from_secs(20)).await;
        cache.insert(shop(1));

        tokio::time::advance(Duration::from_secs(20)).await;
        // 40s after the first insert, but only 20s after the overwrite
        assert!(cache.get(1).is_some());
    }

    #[tokio::test]
    async fn test_remove() {
        let cache = LocalCache::new(Duration::from_secs(30));
        cache.insert(shop(7));
        cache.remove(7);
        assert!(cache.get(7).is_none());
    }
}
