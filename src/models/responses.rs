use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use crate::models::domain::{CustomerTier, StoreProbability, StoreScoreRow};

/// Response for the prediction endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResponse {
    pub available: bool,
    pub store_probabilities: BTreeMap<String, f64>,
    /// Most likely store; ties go to the first store in class order
    pub top_store: Option<StoreProbability>,
    pub top_stores: Vec<StoreProbability>,
    pub spending: u64,
    pub tier: Option<TierResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierResponse {
    pub tier: CustomerTier,
    pub actions: Vec<String>,
}

/// Response for the location score endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreScoreResponse {
    pub residence_area: String,
    pub workplace_area: String,
    pub available: bool,
    pub scores: Vec<StoreScoreRow>,
}

/// Response for the spending estimate endpoint
///
/// `amount` is 0 when no data exists; clients must show that as unavailable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendingEstimateResponse {
    pub residence_area: String,
    pub available: bool,
    pub amount: u64,
}

/// Combined dashboard payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightResponse {
    pub prediction: PredictionResponse,
    pub location: StoreScoreResponse,
    pub residence_spending: SpendingEstimateResponse,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub predictor: String,
    pub model_id: Option<String>,
    pub trained_at: Option<chrono::DateTime<chrono::Utc>>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
