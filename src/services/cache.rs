use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::models::StoreScoreRow;

/// In-memory caches for the location-based lookups
///
/// Entries are keyed by neighborhood and expire after the configured TTL, so
/// warehouse updates become visible without a restart.
pub struct LocationCache {
    scores: moka::future::Cache<(String, String), Arc<Vec<StoreScoreRow>>>,
    spending: moka::future::Cache<String, u64>,
}

impl LocationCache {
    pub fn new(capacity: u64, ttl_secs: u64) -> Self {
        let ttl = Duration::from_secs(ttl_secs);

        Self {
            scores: moka::future::CacheBuilder::new(capacity)
                .time_to_live(ttl)
                .build(),
            spending: moka::future::CacheBuilder::new(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn get_scores(&self, residence: &str, workplace: &str) -> Option<Arc<Vec<StoreScoreRow>>> {
        let key = CacheKey::scores(residence, workplace);
        let hit = self.scores.get(&key).await;
        if hit.is_some() {
            tracing::trace!("Score cache hit: {:?}", key);
        }
        hit
    }

    pub async fn set_scores(&self, residence: &str, workplace: &str, rows: Arc<Vec<StoreScoreRow>>) {
        self.scores
            .insert(CacheKey::scores(residence, workplace), rows)
            .await;
    }

    pub async fn get_spending(&self, residence: &str) -> Option<u64> {
        let key = CacheKey::spending(residence);
        let hit = self.spending.get(&key).await;
        if hit.is_some() {
            tracing::trace!("Spending cache hit: {}", key);
        }
        hit
    }

    pub async fn set_spending(&self, residence: &str, amount: u64) {
        self.spending
            .insert(CacheKey::spending(residence), amount)
            .await;
    }

    /// Drop every cached entry
    pub fn invalidate_all(&self) {
        self.scores.invalidate_all();
        self.spending.invalidate_all();
        tracing::debug!("Invalidated location caches");
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            score_entries: self.scores.entry_count(),
            spending_entries: self.spending.entry_count(),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub score_entries: u64,
    pub spending_entries: u64,
}

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    /// Build a cache key for a residence/workplace score table
    ///
    /// Names are free text and may contain any separator, so the parts are not joined.
    pub fn scores(residence: &str, workplace: &str) -> (String, String) {
        (residence.to_string(), workplace.to_string())
    }

    /// Build a cache key for a residence spending estimate
    pub fn spending(residence: &str) -> String {
        format!("spending:{}", residence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_builder() {
        assert_eq!(
            CacheKey::scores("Yeouido-dong", "Sogong-dong"),
            ("Yeouido-dong".to_string(), "Sogong-dong".to_string())
        );
        assert_ne!(CacheKey::scores("a:b", "c"), CacheKey::scores("a", "b:c"));
        assert_eq!(CacheKey::spending("Banpo-dong"), "spending:Banpo-dong");
    }

    #[tokio::test]
    async fn test_cache_set_get() {
        let cache = LocationCache::new(100, 60);
        let rows = Arc::new(vec![StoreScoreRow {
            store: "Hyundai".to_string(),
            score: 0.32,
        }]);

        assert!(cache.get_scores("Unknown-dong", "Sogong-dong").await.is_none());
        cache.set_scores("Unknown-dong", "Sogong-dong", rows.clone()).await;
        assert_eq!(cache.get_scores("Unknown-dong", "Sogong-dong").await, Some(rows.clone()));
        assert!(cache.get_scores("Sogong-dong", "Unknown-dong").await.is_none());

        // Pairs that would join to the same text stay distinct
        cache.set_scores("a:b", "c", rows.clone()).await;
        assert!(cache.get_scores("a", "b:c").await.is_none());

        cache.set_spending("Banpo-dong", 250_000).await;
        assert_eq!(cache.get_spending("Banpo-dong").await, Some(250_000));

        cache.invalidate_all();
        assert!(cache.get_spending("Banpo-dong").await.is_none());
    }
}
