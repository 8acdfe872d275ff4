use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::core::encoder::{EncoderRegistry, LabelEncoder};
use crate::core::features::{column_names, FeatureColumn, FeatureError, FeatureSchema, FeatureVectorBuilder};
use crate::core::forest::{ForestError, ForestParams, RandomForestClassifier, RandomForestRegressor};
use crate::core::stores::StoreDirectory;
use crate::models::{PredictionResult, TransactionRecord, UserProfile, VisitRecord};
use crate::services::{with_timeout, Warehouse, WarehouseError};

/// Errors that leave the predictor in the failed state
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("training data unavailable: {0}")]
    DataUnavailable(String),

    #[error("warehouse error: {0}")]
    Warehouse(#[from] WarehouseError),

    #[error("history records have no column '{0}'")]
    UnknownTrainingColumn(String),

    #[error("model fitting failed: {0}")]
    Forest(#[from] ForestError),

    #[error("training task did not complete: {0}")]
    Interrupted(String),
}

/// Errors surfaced by a prediction on a ready predictor
#[derive(Debug, Error)]
pub enum PredictError {
    /// Feature layout and trained models disagree; needs operator attention
    #[error("feature configuration mismatch: {0}")]
    ConfigMismatch(#[from] FeatureError),
}

/// Lifecycle of the predictor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictorStatus {
    Uninitialized,
    Loading,
    Training,
    Ready,
    Failed,
}

impl PredictorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictorStatus::Uninitialized => "uninitialized",
            PredictorStatus::Loading => "loading",
            PredictorStatus::Training => "training",
            PredictorStatus::Ready => "ready",
            PredictorStatus::Failed => "failed",
        }
    }
}

enum PredictorState {
    Uninitialized,
    Loading,
    Training,
    Ready(Arc<TrainedModelPair>),
    Failed(String),
}

impl PredictorState {
    fn status(&self) -> PredictorStatus {
        match self {
            PredictorState::Uninitialized => PredictorStatus::Uninitialized,
            PredictorState::Loading => PredictorStatus::Loading,
            PredictorState::Training => PredictorStatus::Training,
            PredictorState::Ready(_) => PredictorStatus::Ready,
            PredictorState::Failed(_) => PredictorStatus::Failed,
        }
    }
}

/// History rows that can feed a model column by name
trait HistoryRecord {
    fn column_value(&self, column: &str) -> Option<&str>;
}

impl HistoryRecord for VisitRecord {
    fn column_value(&self, column: &str) -> Option<&str> {
        self.attribute(column)
    }
}

impl HistoryRecord for TransactionRecord {
    fn column_value(&self, column: &str) -> Option<&str> {
        self.attribute(column)
    }
}

/// Fit one encoder per column and encode every record into a feature row
fn encode_history<R: HistoryRecord>(
    records: &[R],
    columns: &[FeatureColumn],
) -> Result<(EncoderRegistry, Vec<Vec<f64>>), TrainingError> {
    let mut encoders = EncoderRegistry::new();
    let mut rows = vec![Vec::with_capacity(columns.len()); records.len()];

    for column in columns {
        let values: Vec<&str> = records
            .iter()
            .map(|r| r.column_value(&column.name))
            .collect::<Option<_>>()
            .ok_or_else(|| TrainingError::UnknownTrainingColumn(column.name.clone()))?;

        let encoder = encoders.fit(&column.name, &values);
        for (row, value) in rows.iter_mut().zip(&values) {
            // Every value was part of the fit, so encoding cannot miss
            let code = encoder.encode(value).unwrap_or_default();
            row.push(code as f64);
        }
    }

    Ok((encoders, rows))
}

/// Null, NaN and infinite sales amounts train as 0
#[inline]
fn clean_target(amount: Option<f64>) -> f64 {
    match amount {
        Some(value) if value.is_finite() => value,
        _ => 0.0,
    }
}

/// Store classifier and spending regressor fitted on one history snapshot
pub struct TrainedModelPair {
    id: Uuid,
    trained_at: DateTime<Utc>,
    store_classes: LabelEncoder,
    classifier: RandomForestClassifier,
    classifier_columns: Vec<String>,
    classifier_encoders: EncoderRegistry,
    regressor: RandomForestRegressor,
    regressor_columns: Vec<String>,
    regressor_encoders: EncoderRegistry,
}

impl TrainedModelPair {
    /// Fit both models. Store labels are display names, so classes follow display-name order.
    pub fn train(
        visits: &[VisitRecord],
        transactions: &[TransactionRecord],
        schema: &FeatureSchema,
        directory: &StoreDirectory,
        params: &ForestParams,
    ) -> Result<Self, TrainingError> {
        if visits.is_empty() {
            return Err(TrainingError::DataUnavailable("no visit records".to_string()));
        }
        if transactions.is_empty() {
            return Err(TrainingError::DataUnavailable("no transaction records".to_string()));
        }

        let labels: Vec<String> = visits.iter().map(|v| directory.display_name(&v.store)).collect();
        let store_classes = LabelEncoder::fit("store", &labels);
        let y_store: Vec<usize> = labels
            .iter()
            .map(|label| store_classes.encode(label).unwrap_or_default() as usize)
            .collect();

        let (classifier_encoders, x_store) = encode_history(visits, &schema.classifier)?;
        let classifier = RandomForestClassifier::fit(params, &x_store, &y_store, store_classes.len())?;

        let (regressor_encoders, x_spend) = encode_history(transactions, &schema.regressor)?;
        let y_spend: Vec<f64> = transactions.iter().map(|t| clean_target(t.sales_amount)).collect();
        let regressor = RandomForestRegressor::fit(params, &x_spend, &y_spend)?;

        Ok(Self {
            id: Uuid::new_v4(),
            trained_at: Utc::now(),
            store_classes,
            classifier,
            classifier_columns: column_names(&schema.classifier),
            classifier_encoders,
            regressor,
            regressor_columns: column_names(&schema.regressor),
            regressor_encoders,
        })
    }

    /// Predict for one profile using `schema` to assemble the inputs
    pub fn predict(
        &self,
        profile: &UserProfile,
        schema: &FeatureSchema,
    ) -> Result<PredictionResult, FeatureError> {
        let store_input = FeatureVectorBuilder::new(&schema.classifier).build(
            profile,
            &self.classifier_columns,
            &self.classifier_encoders,
        )?;
        let spend_input = FeatureVectorBuilder::new(&schema.regressor).build(
            profile,
            &self.regressor_columns,
            &self.regressor_encoders,
        )?;

        let proba = self.classifier.predict_proba(&to_row(&store_input));
        let store_probabilities: BTreeMap<String, f64> = self
            .store_classes
            .classes()
            .iter()
            .cloned()
            .zip(proba)
            .collect();

        let raw_spending = self.regressor.predict(&to_row(&spend_input));
        let spending = if raw_spending.is_finite() {
            raw_spending.max(0.0).trunc() as u64
        } else {
            0
        };

        Ok(PredictionResult {
            store_probabilities,
            spending,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    /// Store display names in class-label order
    pub fn store_classes(&self) -> &[String] {
        self.store_classes.classes()
    }

    pub fn classifier_columns(&self) -> &[String] {
        &self.classifier_columns
    }

    pub fn regressor_columns(&self) -> &[String] {
        &self.regressor_columns
    }
}

fn to_row(codes: &[u32]) -> Vec<f64> {
    codes.iter().map(|&c| c as f64).collect()
}

/// Everything the predictor needs besides the warehouse handle
#[derive(Debug, Clone)]
pub struct PredictorConfig {
    pub schema: FeatureSchema,
    pub directory: StoreDirectory,
    pub params: ForestParams,
    pub training_districts: Vec<String>,
    pub training_timeout: Duration,
}

/// Store-choice and spending predictor built once from warehouse history
///
/// Construction is separate from [`Predictor::build`]; until a build succeeds
/// every prediction is the empty result. Builds are serialized, and a build
/// requested after a successful one returns immediately.
pub struct Predictor {
    warehouse: Arc<dyn Warehouse>,
    config: PredictorConfig,
    state: RwLock<PredictorState>,
    build_guard: Mutex<()>,
}

impl Predictor {
    pub fn new(warehouse: Arc<dyn Warehouse>, config: PredictorConfig) -> Self {
        Self {
            warehouse,
            config,
            state: RwLock::new(PredictorState::Uninitialized),
            build_guard: Mutex::new(()),
        }
    }

    /// Load history and train both models, unless already ready
    pub async fn build(&self) -> PredictorStatus {
        let _guard = self.build_guard.lock().await;

        if let PredictorState::Ready(_) = &*self.state.read().await {
            return PredictorStatus::Ready;
        }

        *self.state.write().await = PredictorState::Loading;
        tracing::info!("Loading training history");

        match self.load_and_train().await {
            Ok(models) => {
                tracing::info!(
                    model_id = %models.id(),
                    stores = ?models.store_classes(),
                    "Predictor ready"
                );
                *self.state.write().await = PredictorState::Ready(Arc::new(models));
                PredictorStatus::Ready
            }
            Err(e) => {
                tracing::error!("Predictor build failed: {}", e);
                *self.state.write().await = PredictorState::Failed(e.to_string());
                PredictorStatus::Failed
            }
        }
    }

    async fn load_and_train(&self) -> Result<TrainedModelPair, TrainingError> {
        let stores = self.config.directory.raw_names();
        let limit = self.config.training_timeout;

        let (visits, transactions) = tokio::try_join!(
            with_timeout(limit, self.warehouse.fetch_visit_records(&stores)),
            with_timeout(
                limit,
                self.warehouse.fetch_transaction_records(&self.config.training_districts)
            ),
        )?;

        tracing::info!(
            visits = visits.len(),
            transactions = transactions.len(),
            "Training history loaded"
        );

        if visits.is_empty() || transactions.is_empty() {
            return Err(TrainingError::DataUnavailable(format!(
                "{} visit records, {} transaction records",
                visits.len(),
                transactions.len()
            )));
        }

        *self.state.write().await = PredictorState::Training;

        let schema = self.config.schema.clone();
        let directory = self.config.directory.clone();
        let params = self.config.params;

        tokio::task::spawn_blocking(move || {
            TrainedModelPair::train(&visits, &transactions, &schema, &directory, &params)
        })
        .await
        .map_err(|e| TrainingError::Interrupted(e.to_string()))?
    }

    /// Predict for a profile
    ///
    /// Returns the empty result when not ready. Only a feature layout that
    /// disagrees with the trained models is an error.
    pub async fn predict(&self, profile: &UserProfile) -> Result<PredictionResult, PredictError> {
        let Some(models) = self.models().await else {
            tracing::debug!("Predictor not ready, returning empty prediction");
            return Ok(PredictionResult::unavailable());
        };

        models.predict(profile, &self.config.schema).map_err(|e| {
            tracing::error!("Feature layout does not match trained models: {}", e);
            PredictError::ConfigMismatch(e)
        })
    }

    pub async fn status(&self) -> PredictorStatus {
        self.state.read().await.status()
    }

    /// Reason for the last failed build
    pub async fn failure(&self) -> Option<String> {
        match &*self.state.read().await {
            PredictorState::Failed(reason) => Some(reason.clone()),
            _ => None,
        }
    }

    /// The trained models, when ready
    pub async fn models(&self) -> Option<Arc<TrainedModelPair>> {
        match &*self.state.read().await {
            PredictorState::Ready(models) => Some(models.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::features::ProfileField;
    use crate::models::{AgeBracket, AverageSpendingRow, Gender, HouseholdType, LocationRatio, LocationRole};
    use crate::services::InMemoryWarehouse;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts history reads against an inner warehouse
    struct CountingWarehouse {
        inner: InMemoryWarehouse,
        visit_reads: AtomicUsize,
        transaction_reads: AtomicUsize,
    }

    #[async_trait]
    impl Warehouse for CountingWarehouse {
        async fn fetch_visit_records(&self, stores: &[String]) -> Result<Vec<VisitRecord>, WarehouseError> {
            self.visit_reads.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.inner.fetch_visit_records(stores).await
        }

        async fn fetch_transaction_records(
            &self,
            districts: &[String],
        ) -> Result<Vec<TransactionRecord>, WarehouseError> {
            self.transaction_reads.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch_transaction_records(districts).await
        }

        async fn fetch_location_ratios(
            &self,
            area: &str,
            role: LocationRole,
        ) -> Result<Vec<LocationRatio>, WarehouseError> {
            self.inner.fetch_location_ratios(area, role).await
        }

        async fn fetch_average_spending(
            &self,
            area: &str,
        ) -> Result<Option<AverageSpendingRow>, WarehouseError> {
            self.inner.fetch_average_spending(area).await
        }

        async fn health_check(&self) -> Result<bool, WarehouseError> {
            self.inner.health_check().await
        }
    }

    fn visit(store: &str, gender: &str, lifestyle: &str) -> VisitRecord {
        VisitRecord {
            store: store.to_string(),
            age_group: "30s".to_string(),
            gender: gender.to_string(),
            time_slot: "14-17".to_string(),
            weekday: "weekday".to_string(),
            lifestyle: lifestyle.to_string(),
        }
    }

    fn transaction(gender: &str, amount: Option<f64>) -> TransactionRecord {
        TransactionRecord {
            district: "Yeouido-dong".to_string(),
            card_type: "credit".to_string(),
            age_group: "30s".to_string(),
            gender: gender.to_string(),
            time_slot: "14-17".to_string(),
            weekday: "weekday".to_string(),
            lifestyle: "newlywed".to_string(),
            sales_amount: amount,
        }
    }

    fn profile(gender: Gender) -> UserProfile {
        let household_type = match gender {
            Gender::Female => HouseholdType::Newlywed,
            Gender::Male => HouseholdType::Single,
        };
        UserProfile {
            gender,
            age_bracket: AgeBracket::Thirties,
            residence_area: "Yeouido-dong".to_string(),
            workplace_area: "Sogong-dong".to_string(),
            household_type,
            weather: None,
            month: None,
        }
    }

    fn params() -> ForestParams {
        ForestParams {
            n_estimators: 10,
            ..ForestParams::default()
        }
    }

    fn directory() -> StoreDirectory {
        StoreDirectory::from([("더현대서울", "Hyundai"), ("롯데백화점_본점", "Lotte")])
    }

    fn history() -> (Vec<VisitRecord>, Vec<TransactionRecord>) {
        let mut visits = Vec::new();
        for _ in 0..20 {
            visits.push(visit("더현대서울", "female", "newlywed"));
            visits.push(visit("롯데백화점_본점", "male", "single"));
        }
        let mut transactions = Vec::new();
        for _ in 0..20 {
            transactions.push(transaction("female", Some(400_000.0)));
            transactions.push(transaction("male", Some(f64::NAN)));
        }
        (visits, transactions)
    }

    fn config() -> PredictorConfig {
        PredictorConfig {
            schema: FeatureSchema::default(),
            directory: directory(),
            params: params(),
            training_districts: vec!["Yeouido-dong".to_string()],
            training_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_clean_target() {
        assert_eq!(clean_target(Some(12.5)), 12.5);
        assert_eq!(clean_target(Some(f64::NAN)), 0.0);
        assert_eq!(clean_target(Some(f64::INFINITY)), 0.0);
        assert_eq!(clean_target(None), 0.0);
    }

    #[test]
    fn test_trained_pair_learns_history() {
        let (visits, transactions) = history();
        let models = TrainedModelPair::train(
            &visits,
            &transactions,
            &FeatureSchema::default(),
            &directory(),
            &params(),
        )
        .unwrap();

        assert_eq!(models.store_classes(), &["Hyundai".to_string(), "Lotte".to_string()]);

        let female = models.predict(&profile(Gender::Female), &FeatureSchema::default()).unwrap();
        assert_eq!(female.top_store().map(|(s, _)| s), Some("Hyundai"));
        assert_eq!(female.spending, 400_000);

        // NaN targets trained as 0
        let male = models.predict(&profile(Gender::Male), &FeatureSchema::default()).unwrap();
        assert_eq!(male.top_store().map(|(s, _)| s), Some("Lotte"));
        assert_eq!(male.spending, 0);
    }

    #[test]
    fn test_negative_sales_predict_zero_spending() {
        let (visits, _) = history();
        let transactions: Vec<TransactionRecord> = (0..20)
            .flat_map(|_| {
                [
                    transaction("female", Some(-50_000.0)),
                    transaction("male", Some(-120_000.0)),
                ]
            })
            .collect();
        let models = TrainedModelPair::train(
            &visits,
            &transactions,
            &FeatureSchema::default(),
            &directory(),
            &params(),
        )
        .unwrap();

        for gender in [Gender::Female, Gender::Male] {
            let result = models.predict(&profile(gender), &FeatureSchema::default()).unwrap();
            assert!(result.is_available());
            assert_eq!(result.spending, 0);
        }
    }

    #[test]
    fn test_schema_change_after_training_is_config_mismatch() {
        let (visits, transactions) = history();
        let models = TrainedModelPair::train(
            &visits,
            &transactions,
            &FeatureSchema::default(),
            &directory(),
            &params(),
        )
        .unwrap();

        let mut schema = FeatureSchema::default();
        schema.classifier.reverse();
        let err = models.predict(&profile(Gender::Female), &schema).unwrap_err();
        assert!(matches!(err, FeatureError::ConfigMismatch { .. }));
    }

    #[test]
    fn test_unknown_training_column_fails() {
        let (visits, transactions) = history();
        let mut schema = FeatureSchema::default();
        schema
            .classifier
            .push(FeatureColumn::field("residence", ProfileField::ResidenceArea));

        let err = TrainedModelPair::train(&visits, &transactions, &schema, &directory(), &params())
            .err()
            .unwrap();
        assert!(matches!(err, TrainingError::UnknownTrainingColumn(name) if name == "residence"));
    }

    #[tokio::test]
    async fn test_predict_before_build_is_empty() {
        let predictor = Predictor::new(Arc::new(InMemoryWarehouse::new()), config());
        assert_eq!(predictor.status().await, PredictorStatus::Uninitialized);

        let result = predictor.predict(&profile(Gender::Female)).await.unwrap();
        assert_eq!(result, PredictionResult::unavailable());
    }

    #[tokio::test]
    async fn test_build_then_predict() {
        let (visits, transactions) = history();
        let warehouse = InMemoryWarehouse::new()
            .with_visits(visits)
            .with_transactions(transactions);
        let predictor = Predictor::new(Arc::new(warehouse), config());

        assert_eq!(predictor.build().await, PredictorStatus::Ready);
        let first = predictor.models().await.unwrap().id();

        // A second build keeps the existing models
        assert_eq!(predictor.build().await, PredictorStatus::Ready);
        assert_eq!(predictor.models().await.unwrap().id(), first);

        let result = predictor.predict(&profile(Gender::Female)).await.unwrap();
        let total: f64 = result.store_probabilities.values().sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_unreachable_warehouse_fails_build() {
        let predictor = Predictor::new(Arc::new(InMemoryWarehouse::unreachable()), config());

        assert_eq!(predictor.build().await, PredictorStatus::Failed);
        assert!(predictor.failure().await.unwrap().contains("warehouse"));
        let result = predictor.predict(&profile(Gender::Male)).await.unwrap();
        assert!(!result.is_available());
    }

    #[tokio::test]
    async fn test_concurrent_builds_train_once() {
        let (visits, transactions) = history();
        let warehouse = Arc::new(CountingWarehouse {
            inner: InMemoryWarehouse::new()
                .with_visits(visits)
                .with_transactions(transactions),
            visit_reads: AtomicUsize::new(0),
            transaction_reads: AtomicUsize::new(0),
        });
        let predictor = Arc::new(Predictor::new(warehouse.clone(), config()));

        let build = |predictor: Arc<Predictor>| async move {
            let status = predictor.build().await;
            (status, predictor.models().await.map(|m| m.id()))
        };
        let a = tokio::spawn(build(predictor.clone()));
        let b = tokio::spawn(build(predictor.clone()));

        let (status_a, id_a) = a.await.unwrap();
        let (status_b, id_b) = b.await.unwrap();
        assert_eq!(status_a, PredictorStatus::Ready);
        assert_eq!(status_b, PredictorStatus::Ready);
        assert!(id_a.is_some());
        assert_eq!(id_a, id_b);
        assert_eq!(warehouse.visit_reads.load(Ordering::SeqCst), 1);
        assert_eq!(warehouse.transaction_reads.load(Ordering::SeqCst), 1);
    }
}
