// Model exports
pub mod domain;
pub mod records;
pub mod requests;
pub mod responses;

pub use domain::{
    AgeBracket, CustomerTier, Gender, HouseholdType, LocationRole, LocationWeights,
    PredictionResult, Season, StoreProbability, StoreScoreRow, UserProfile, Weather,
};
pub use records::{AverageSpendingRow, LocationRatio, TransactionRecord, VisitRecord};
pub use requests::{ProfileRequest, SpendingQuery, StoreScoreRequest};
pub use responses::{
    ErrorResponse, HealthResponse, InsightResponse, PredictionResponse, SpendingEstimateResponse,
    StoreScoreResponse, TierResponse,
};
