use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use crate::models::{AverageSpendingRow, LocationRatio, LocationRole, TransactionRecord, VisitRecord};

/// Errors that can occur when reading from the warehouse
#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Query timed out after {0:?}")]
    Timeout(Duration),

    #[error("Warehouse unavailable: {0}")]
    Unavailable(String),
}

/// Read-only access to the historical and lookup tables
///
/// Implementations are shared across requests and must be safe to call
/// concurrently; every read is idempotent.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Visit history for the stores used as classifier labels
    async fn fetch_visit_records(&self, stores: &[String]) -> Result<Vec<VisitRecord>, WarehouseError>;

    /// Transaction history for the districts used to train the regressor
    async fn fetch_transaction_records(
        &self,
        districts: &[String],
    ) -> Result<Vec<TransactionRecord>, WarehouseError>;

    /// Per-store visit ratios for a neighborhood in one role
    async fn fetch_location_ratios(
        &self,
        area: &str,
        role: LocationRole,
    ) -> Result<Vec<LocationRatio>, WarehouseError>;

    /// Average department-store spending row for a neighborhood, if any
    async fn fetch_average_spending(
        &self,
        area: &str,
    ) -> Result<Option<AverageSpendingRow>, WarehouseError>;

    /// Cheap connectivity probe
    async fn health_check(&self) -> Result<bool, WarehouseError>;
}

/// Run a warehouse read with an upper bound on its duration
pub async fn with_timeout<T, F>(limit: Duration, read: F) -> Result<T, WarehouseError>
where
    F: Future<Output = Result<T, WarehouseError>>,
{
    tokio::time::timeout(limit, read)
        .await
        .map_err(|_| WarehouseError::Timeout(limit))?
}
