use redis::AsyncCommands;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::CacheSettings;

/// Cache statistics for monitoring.
#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub invalidations: AtomicU64,
    pub errors: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    pub fn get_hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn get_misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

/// Redis-backed cache for authoritative wallet balances. Every operation is
/// soft-failing: a Redis outage degrades to database reads, never to request
/// failures. Balances are stored as decimal strings to keep exact values.
pub struct WalletCache {
    client: redis::Client,
    settings: CacheSettings,
    stats: Arc<CacheStats>,
}

impl WalletCache {
    pub fn new(client: redis::Client, settings: CacheSettings) -> Self {
        Self {
            client,
            settings,
            stats: Arc::new(CacheStats::new()),
        }
    }

    pub fn stats(&self) -> Arc<CacheStats> {
        self.stats.clone()
    }

    fn cache_key(&self, account_id: Uuid) -> String {
        format!("{}:balance:{}", self.settings.key_prefix, account_id)
    }

    pub async fn get(&self, account_id: Uuid) -> Option<Decimal> {
        if !self.settings.enabled {
            return None;
        }

        let key = self.cache_key(account_id);
        let mut conn = match self.client.get_multiplexed_async_connection().await {
            Ok(c) => c,
            Err(e) => {
                self.stats.record_error();
                tracing::warn!("Redis connection error in cache get: {}", e);
                return None;
            }
        };

        let value: Option<String> = match conn.get(&key).await {
            Ok(v) => v,
            Err(e) => {
                self.stats.record_error();
                tracing::warn!("Redis get error: {}", e);
                return None;
            }
        };

        match value {
            Some(raw) => match Decimal::from_str(&raw) {
                Ok(balance) => {
                    self.stats.record_hit();
                    tracing::debug!(account_id = %account_id, "Cache hit for balance");
                    Some(balance)
                }
                Err(e) => {
                    self.stats.record_error();
                    tracing::warn!("Corrupt cached balance '{}': {}", raw, e);
                    self.invalidate(account_id).await;
                    None
                }
            },
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    pub async fn put(&self, account_id: Uuid, balance: Decimal) {
        if !self.settings.enabled {
            return;
        }

        let key = self.cache_key(account_id);
        let mut conn = match self.client.get_multiplexed_async_connection().await {
            Ok(c) => c,
            Err(e) => {
                self.stats.record_error();
                tracing::warn!("Redis connection error in cache put: {}", e);
                return;
            }
        };

        if let Err(e) = conn
            .set_ex::<_, _, ()>(&key, balance.to_string(), self.settings.ttl_seconds)
            .await
        {
            self.stats.record_error();
            tracing::warn!("Redis set error: {}", e);
        } else {
            tracing::debug!(
                account_id = %account_id,
                ttl_secs = self.settings.ttl_seconds,
                "Cached balance"
            );
        }
    }

    pub async fn invalidate(&self, account_id: Uuid) {
        if !self.settings.enabled {
            return;
        }

        let key = self.cache_key(account_id);
        let mut conn = match self.client.get_multiplexed_async_connection().await {
            Ok(c) => c,
            Err(e) => {
                self.stats.record_error();
                tracing::warn!("Redis connection error in cache invalidate: {}", e);
                return;
            }
        };

        if let Err(e) = conn.del::<_, ()>(&key).await {
            self.stats.record_error();
            tracing::warn!("Redis del error: {}", e);
        } else {
            self.stats.record_invalidation();
            tracing::debug!(account_id = %account_id, "Invalidated cached balance");
        }
    }
}
