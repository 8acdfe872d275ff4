use crate::config::TierSettings;
use crate::core::location::LocationPreferenceScorer;
use crate::core::predictor::{PredictError, Predictor};
use crate::core::spending::{SpendEstimator, NO_SPENDING_DATA};
use crate::core::tier::tier_for;
use crate::models::{CustomerTier, PredictionResult, StoreScoreRow, UserProfile};

/// Everything the dashboard shows for one profile
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerInsight {
    pub prediction: PredictionResult,
    pub tier: Option<CustomerTier>,
    pub location_scores: Vec<StoreScoreRow>,
    pub residence_spending: u64,
}

impl CustomerInsight {
    pub fn has_location_data(&self) -> bool {
        !self.location_scores.is_empty()
    }

    pub fn has_residence_spending(&self) -> bool {
        self.residence_spending != NO_SPENDING_DATA
    }
}

/// Run the prediction, location score and spending lookup for one profile concurrently
pub async fn gather_insight(
    predictor: &Predictor,
    scorer: &LocationPreferenceScorer,
    estimator: &SpendEstimator,
    tiers: &TierSettings,
    profile: &UserProfile,
) -> Result<CustomerInsight, PredictError> {
    let (prediction, location_scores, residence_spending) = tokio::join!(
        predictor.predict(profile),
        scorer.score(&profile.residence_area, &profile.workplace_area),
        estimator.estimate(&profile.residence_area),
    );
    let prediction = prediction?;

    Ok(CustomerInsight {
        tier: tier_for(&prediction, tiers),
        prediction,
        location_scores,
        residence_spending,
    })
}
