use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::core::stores::StoreDirectory;
use crate::models::{LocationRatio, LocationRole, LocationWeights, StoreScoreRow};
use crate::services::{with_timeout, LocationCache, Warehouse, WarehouseError};

/// Combine residence and workplace visit ratios into one score per store
///
/// Stores are outer-joined on their raw name; a store missing from one side
/// contributes a ratio of 0 for that side. Rows come back in descending score
/// order (ties in raw-name order) with display names applied.
pub fn combine_location_ratios(
    residence: &[LocationRatio],
    workplace: &[LocationRatio],
    weights: LocationWeights,
    directory: &StoreDirectory,
) -> Vec<StoreScoreRow> {
    let mut merged: BTreeMap<&str, (f64, f64)> = BTreeMap::new();

    for row in residence {
        merged.entry(row.store.as_str()).or_default().0 += finite_or_zero(row.ratio);
    }
    for row in workplace {
        merged.entry(row.store.as_str()).or_default().1 += finite_or_zero(row.ratio);
    }

    let mut scored: Vec<(&str, f64)> = merged
        .into_iter()
        .map(|(store, (home, work))| (store, home * weights.residence + work * weights.workplace))
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    scored
        .into_iter()
        .map(|(store, score)| StoreScoreRow {
            store: directory.display_name(store),
            score,
        })
        .collect()
}

#[inline]
fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

/// Model-free store preference from where a customer lives and works
pub struct LocationPreferenceScorer {
    warehouse: Arc<dyn Warehouse>,
    cache: Arc<LocationCache>,
    directory: StoreDirectory,
    weights: LocationWeights,
    query_timeout: Duration,
}

impl LocationPreferenceScorer {
    pub fn new(
        warehouse: Arc<dyn Warehouse>,
        cache: Arc<LocationCache>,
        directory: StoreDirectory,
        weights: LocationWeights,
        query_timeout: Duration,
    ) -> Self {
        Self {
            warehouse,
            cache,
            directory,
            weights,
            query_timeout,
        }
    }

    /// Score every store with ratio data for either neighborhood
    ///
    /// Lookup failures count as "no rows" for that side and are logged; an
    /// empty result means no location data and is not an error. Results built
    /// from a failed lookup are not cached.
    pub async fn score(&self, residence_area: &str, workplace_area: &str) -> Vec<StoreScoreRow> {
        if let Some(rows) = self.cache.get_scores(residence_area, workplace_area).await {
            return rows.as_ref().clone();
        }

        let (home, work) = tokio::join!(
            self.fetch(residence_area, LocationRole::Residence),
            self.fetch(workplace_area, LocationRole::Workplace),
        );
        let complete = home.is_ok() && work.is_ok();

        let rows = combine_location_ratios(
            &home.unwrap_or_default(),
            &work.unwrap_or_default(),
            self.weights,
            &self.directory,
        );

        if rows.is_empty() {
            tracing::warn!(
                residence = %residence_area,
                workplace = %workplace_area,
                "No location ratio data for either neighborhood"
            );
        }

        if complete {
            self.cache
                .set_scores(residence_area, workplace_area, Arc::new(rows.clone()))
                .await;
        }

        rows
    }

    async fn fetch(&self, area: &str, role: LocationRole) -> Result<Vec<LocationRatio>, WarehouseError> {
        let result = with_timeout(
            self.query_timeout,
            self.warehouse.fetch_location_ratios(area, role),
        )
        .await;

        if let Err(e) = &result {
            tracing::warn!(area = %area, role = ?role, "Location ratio lookup failed: {}", e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::InMemoryWarehouse;

    fn ratio(store: &str, ratio: f64) -> LocationRatio {
        LocationRatio {
            store: store.to_string(),
            ratio,
        }
    }

    fn directory() -> StoreDirectory {
        StoreDirectory::from([("더현대서울", "Hyundai"), ("롯데백화점_본점", "Lotte")])
    }

    #[test]
    fn test_weighted_outer_join() {
        let rows = combine_location_ratios(
            &[ratio("롯데백화점_본점", 0.5), ratio("더현대서울", 0.1)],
            &[ratio("더현대서울", 0.8), ratio("Galleria", 0.2)],
            LocationWeights::default(),
            &directory(),
        );

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].store, "Hyundai");
        assert!((rows[0].score - (0.1 * 0.6 + 0.8 * 0.4)).abs() < 1e-12);
        assert_eq!(rows[1].store, "Lotte");
        assert!((rows[1].score - 0.3).abs() < 1e-12);
        assert_eq!(rows[2].store, "Galleria");
        assert!((rows[2].score - 0.08).abs() < 1e-12);
    }

    #[test]
    fn test_both_sides_empty() {
        let rows = combine_location_ratios(&[], &[], LocationWeights::default(), &directory());
        assert!(rows.is_empty());
    }

    #[test]
    fn test_non_finite_ratio_counts_as_zero() {
        let rows = combine_location_ratios(
            &[ratio("더현대서울", f64::NAN)],
            &[ratio("더현대서울", 0.5)],
            LocationWeights::default(),
            &directory(),
        );
        assert!((rows[0].score - 0.2).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_failed_lookup_is_not_cached() {
        let cache = Arc::new(LocationCache::new(100, 60));
        let scorer = LocationPreferenceScorer::new(
            Arc::new(InMemoryWarehouse::unreachable()),
            cache.clone(),
            directory(),
            LocationWeights::default(),
            Duration::from_secs(1),
        );

        assert!(scorer.score("Yeouido-dong", "Sogong-dong").await.is_empty());
        assert!(cache.get_scores("Yeouido-dong", "Sogong-dong").await.is_none());
    }

    #[tokio::test]
    async fn test_successful_lookup_is_cached() {
        let cache = Arc::new(LocationCache::new(100, 60));
        let warehouse = InMemoryWarehouse::new().with_ratio(
            "Yeouido-dong",
            LocationRole::Residence,
            "더현대서울",
            0.5,
        );
        let scorer = LocationPreferenceScorer::new(
            Arc::new(warehouse),
            cache.clone(),
            directory(),
            LocationWeights::default(),
            Duration::from_secs(1),
        );

        let rows = scorer.score("Yeouido-dong", "Sogong-dong").await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].store, "Hyundai");
        let cached = cache.get_scores("Yeouido-dong", "Sogong-dong").await.unwrap();
        assert_eq!(cached.as_ref(), &rows);
    }

    #[tokio::test]
    async fn test_pairs_with_separator_characters_do_not_share_cache() {
        let cache = Arc::new(LocationCache::new(100, 60));
        let warehouse = InMemoryWarehouse::new()
            .with_ratio("a:b", LocationRole::Residence, "롯데백화점_본점", 1.0)
            .with_ratio("a", LocationRole::Residence, "더현대서울", 0.5);
        let scorer = LocationPreferenceScorer::new(
            Arc::new(warehouse),
            cache,
            directory(),
            LocationWeights::default(),
            Duration::from_secs(1),
        );

        let first = scorer.score("a:b", "c").await;
        assert_eq!(first[0].store, "Lotte");

        let second = scorer.score("a", "b:c").await;
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].store, "Hyundai");
        assert!((second[0].score - 0.3).abs() < 1e-12);
    }
}
