use std::sync::Arc;
use std::time::Duration;

use crate::models::AverageSpendingRow;
use crate::services::{with_timeout, LocationCache, Warehouse};

/// Amount returned when no usable spending figure exists
///
/// This is a "no data" marker, not an observed zero spend.
pub const NO_SPENDING_DATA: u64 = 0;

/// Why a neighborhood has no spending estimate
#[derive(Debug, Clone, PartialEq)]
pub enum SpendingLookupMiss {
    UnknownArea,
    MissingValue,
    NotNumeric(String),
}

/// Interpret the raw spending cell for a neighborhood
///
/// Numeric values are truncated toward zero; negative figures clamp to 0.
pub fn interpret_average_spending(row: Option<&AverageSpendingRow>) -> Result<u64, SpendingLookupMiss> {
    let row = row.ok_or(SpendingLookupMiss::UnknownArea)?;
    let raw = row
        .value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(SpendingLookupMiss::MissingValue)?;

    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value.max(0.0).trunc() as u64),
        Ok(_) => Err(SpendingLookupMiss::MissingValue),
        Err(_) => Err(SpendingLookupMiss::NotNumeric(raw.to_string())),
    }
}

/// Average department-store spending by residence neighborhood
pub struct SpendEstimator {
    warehouse: Arc<dyn Warehouse>,
    cache: Arc<LocationCache>,
    query_timeout: Duration,
}

impl SpendEstimator {
    pub fn new(warehouse: Arc<dyn Warehouse>, cache: Arc<LocationCache>, query_timeout: Duration) -> Self {
        Self {
            warehouse,
            cache,
            query_timeout,
        }
    }

    /// Average spending for `residence_area`, or [`NO_SPENDING_DATA`]
    pub async fn estimate(&self, residence_area: &str) -> u64 {
        if let Some(amount) = self.cache.get_spending(residence_area).await {
            return amount;
        }

        let row = match with_timeout(
            self.query_timeout,
            self.warehouse.fetch_average_spending(residence_area),
        )
        .await
        {
            Ok(row) => row,
            Err(e) => {
                tracing::warn!(area = %residence_area, "Spending lookup failed: {}", e);
                return NO_SPENDING_DATA;
            }
        };

        let amount = match interpret_average_spending(row.as_ref()) {
            Ok(amount) => amount,
            Err(SpendingLookupMiss::NotNumeric(value)) => {
                tracing::warn!(area = %residence_area, value = %value, "Spending value is not numeric");
                NO_SPENDING_DATA
            }
            Err(miss) => {
                tracing::warn!(area = %residence_area, reason = ?miss, "No spending data for neighborhood");
                NO_SPENDING_DATA
            }
        };

        self.cache.set_spending(residence_area, amount).await;
        amount
    }
}
