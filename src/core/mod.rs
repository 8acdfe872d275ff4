// Core algorithm exports
pub mod encoder;
pub mod features;
pub mod forest;
pub mod insight;
pub mod location;
pub mod predictor;
pub mod spending;
pub mod stores;
pub mod tier;

pub use encoder::{EncoderRegistry, LabelEncoder, UnknownCategory, UNKNOWN_CODE};
pub use features::{FeatureColumn, FeatureError, FeatureSchema, FeatureSource, FeatureVectorBuilder, ProfileField};
pub use forest::{ForestError, ForestParams, RandomForestClassifier, RandomForestRegressor};
pub use insight::{gather_insight, CustomerInsight};
pub use location::{combine_location_ratios, LocationPreferenceScorer};
pub use predictor::{PredictError, Predictor, PredictorConfig, PredictorStatus, TrainedModelPair, TrainingError};
pub use spending::{interpret_average_spending, SpendEstimator, SpendingLookupMiss, NO_SPENDING_DATA};
pub use stores::StoreDirectory;
pub use tier::{classify_spending, recommended_actions, tier_for};
