use crate::config::TierSettings;
use crate::models::{CustomerTier, PredictionResult};

/// Tier for a predicted spending amount; thresholds are exclusive
pub fn classify_spending(spending: u64, thresholds: &TierSettings) -> CustomerTier {
    if spending > thresholds.premium {
        CustomerTier::Premium
    } else if spending > thresholds.gold {
        CustomerTier::Gold
    } else {
        CustomerTier::Standard
    }
}

/// Tier for a prediction, `None` when the predictor could not produce one
pub fn tier_for(prediction: &PredictionResult, thresholds: &TierSettings) -> Option<CustomerTier> {
    prediction
        .is_available()
        .then(|| classify_spending(prediction.spending, thresholds))
}

/// Marketing actions suggested for a tier
pub fn recommended_actions(tier: CustomerTier) -> &'static [&'static str] {
    match tier {
        CustomerTier::Premium => &[
            "VIP service",
            "Premium coupons",
            "Lounge access",
            "Personal shopping assistance",
        ],
        CustomerTier::Gold => &[
            "Special discount coupons",
            "Point events",
            "Parking benefits",
            "Membership perks",
        ],
        CustomerTier::Standard => &[
            "First-visit sampling",
            "Prize events",
            "Basic membership",
            "Discount coupons",
        ],
    }
}
