//! TargetIQ - department-store customer targeting service
//!
//! Predicts which department store a prospective customer is likely to visit
//! and how much they are likely to spend, and scores stores by where the
//! customer lives and works, all from a read-only data warehouse.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{LocationPreferenceScorer, Predictor, PredictorStatus, SpendEstimator};
pub use crate::models::{PredictionResult, StoreScoreRow, UserProfile};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let result = PredictionResult::unavailable();
        assert!(!result.is_available());
        assert_eq!(PredictorStatus::Ready.as_str(), "ready");
    }
}
