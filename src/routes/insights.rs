use actix_web::{web, HttpResponse, Responder};
use validator::Validate;
use crate::config::TierSettings;
use crate::core::{gather_insight, recommended_actions, tier_for, LocationPreferenceScorer, PredictError, Predictor, PredictorStatus, SpendEstimator, NO_SPENDING_DATA};
use crate::models::{
    ErrorResponse, HealthResponse, InsightResponse, PredictionResponse, PredictionResult, ProfileRequest,
    SpendingEstimateResponse, SpendingQuery, StoreProbability, StoreScoreRequest, StoreScoreResponse,
    StoreScoreRow, TierResponse, UserProfile,
};
use crate::services::Warehouse;
use std::sync::Arc;

/// Number of stores listed in `topStores`
const TOP_STORES: usize = 3;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub predictor: Arc<Predictor>,
    pub scorer: Arc<LocationPreferenceScorer>,
    pub estimator: Arc<SpendEstimator>,
    pub warehouse: Arc<dyn Warehouse>,
    pub tiers: TierSettings,
}

/// Configure all targeting routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/predictions", web::post().to(predict))
        .route("/stores/score", web::post().to(score_stores))
        .route("/spending/estimate", web::get().to(estimate_spending))
        .route("/insights", web::post().to(insights));
}

fn prediction_response(result: PredictionResult, tiers: &TierSettings) -> PredictionResponse {
    let tier = tier_for(&result, tiers).map(|tier| TierResponse {
        tier,
        actions: recommended_actions(tier).iter().map(|a| a.to_string()).collect(),
    });

    let top_store = result.top_store().map(|(store, probability)| StoreProbability {
        store: store.to_string(),
        probability,
    });

    PredictionResponse {
        available: result.is_available(),
        top_store,
        top_stores: result.ranked(TOP_STORES),
        spending: result.spending,
        store_probabilities: result.store_probabilities,
        tier,
    }
}

fn score_response(residence_area: &str, workplace_area: &str, scores: Vec<StoreScoreRow>) -> StoreScoreResponse {
    StoreScoreResponse {
        residence_area: residence_area.to_string(),
        workplace_area: workplace_area.to_string(),
        available: !scores.is_empty(),
        scores,
    }
}

fn spending_response(residence_area: &str, amount: u64) -> SpendingEstimateResponse {
    SpendingEstimateResponse {
        residence_area: residence_area.to_string(),
        available: amount != NO_SPENDING_DATA,
        amount,
    }
}

fn validation_failed(errors: validator::ValidationErrors) -> HttpResponse {
    tracing::info!("Request validation failed: {}", errors);
    HttpResponse::BadRequest().json(ErrorResponse {
        error: "Validation failed".to_string(),
        message: errors.to_string(),
        status_code: 400,
    })
}

fn config_mismatch(e: PredictError) -> HttpResponse {
    HttpResponse::InternalServerError().json(ErrorResponse {
        error: "Feature configuration mismatch".to_string(),
        message: e.to_string(),
        status_code: 500,
    })
}

/// Health check endpoint
///
/// Healthy only when the warehouse answers and the predictor is ready.
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let warehouse_healthy = state.warehouse.health_check().await.unwrap_or(false);
    let predictor_status = state.predictor.status().await;
    let models = state.predictor.models().await;

    let status = if warehouse_healthy && predictor_status == PredictorStatus::Ready {
        "healthy"
    } else {
        "degraded"
    };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        predictor: predictor_status.as_str().to_string(),
        model_id: models.as_ref().map(|m| m.id().to_string()),
        trained_at: models.as_ref().map(|m| m.trained_at()),
        timestamp: chrono::Utc::now(),
    })
}

/// Store-choice and spending prediction
///
/// POST /api/v1/predictions
///
/// Request body:
/// ```json
/// {
///   "gender": "female",
///   "ageBracket": "30s",
///   "residenceArea": "Yeouido-dong",
///   "workplaceArea": "Sogong-dong",
///   "householdType": "newlywed"
/// }
/// ```
async fn predict(
    state: web::Data<AppState>,
    req: web::Json<ProfileRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_failed(errors);
    }

    let profile: UserProfile = req.into_inner().into();

    match state.predictor.predict(&profile).await {
        Ok(result) => {
            tracing::debug!(
                available = result.is_available(),
                spending = result.spending,
                "Prediction served"
            );
            HttpResponse::Ok().json(prediction_response(result, &state.tiers))
        }
        Err(e) => config_mismatch(e),
    }
}

/// Location-based store preference
///
/// POST /api/v1/stores/score
async fn score_stores(
    state: web::Data<AppState>,
    req: web::Json<StoreScoreRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_failed(errors);
    }

    let residence = req.residence_area.trim();
    let workplace = req.workplace_area.trim();
    let scores = state.scorer.score(residence, workplace).await;

    HttpResponse::Ok().json(score_response(residence, workplace, scores))
}

/// Average spending for a residence neighborhood
///
/// GET /api/v1/spending/estimate?residenceArea={area}
///
/// `amount` is 0 with `available: false` when the warehouse has no figure.
async fn estimate_spending(
    state: web::Data<AppState>,
    query: web::Query<SpendingQuery>,
) -> impl Responder {
    if let Err(errors) = query.validate() {
        return validation_failed(errors);
    }

    let residence = query.residence_area.trim();
    let amount = state.estimator.estimate(residence).await;

    HttpResponse::Ok().json(spending_response(residence, amount))
}

/// Prediction, location score and residence spending in one payload
///
/// POST /api/v1/insights
async fn insights(
    state: web::Data<AppState>,
    req: web::Json<ProfileRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_failed(errors);
    }

    let profile: UserProfile = req.into_inner().into();

    let insight = match gather_insight(
        &state.predictor,
        &state.scorer,
        &state.estimator,
        &state.tiers,
        &profile,
    )
    .await
    {
        Ok(insight) => insight,
        Err(e) => return config_mismatch(e),
    };

    HttpResponse::Ok().json(InsightResponse {
        prediction: prediction_response(insight.prediction, &state.tiers),
        location: score_response(&profile.residence_area, &profile.workplace_area, insight.location_scores),
        residence_spending: spending_response(&profile.residence_area, insight.residence_spending),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FeatureSchema, ForestParams, PredictorConfig, StoreDirectory};
    use crate::models::{LocationRole, LocationWeights, TransactionRecord, VisitRecord};
    use crate::services::{InMemoryWarehouse, LocationCache};
    use actix_web::{test, App};
    use std::time::Duration;

    fn warehouse() -> InMemoryWarehouse {
        let visits = (0..30)
            .map(|i| VisitRecord {
                store: if i % 2 == 0 { "더현대서울" } else { "롯데백화점_본점" }.to_string(),
                age_group: "30s".to_string(),
                gender: if i % 2 == 0 { "female" } else { "male" }.to_string(),
                time_slot: "14-17".to_string(),
                weekday: "weekday".to_string(),
                lifestyle: "newlywed".to_string(),
            })
            .collect();
        let transactions = (0..30)
            .map(|i| TransactionRecord {
                district: "Yeouido-dong".to_string(),
                card_type: "credit".to_string(),
                age_group: "30s".to_string(),
                gender: if i % 2 == 0 { "female" } else { "male" }.to_string(),
                time_slot: "14-17".to_string(),
                weekday: "weekday".to_string(),
                lifestyle: "newlywed".to_string(),
                sales_amount: Some(if i % 2 == 0 { 600_000.0 } else { 100_000.0 }),
            })
            .collect();

        InMemoryWarehouse::new()
            .with_visits(visits)
            .with_transactions(transactions)
            .with_ratio("Yeouido-dong", LocationRole::Residence, "더현대서울", 0.5)
            .with_ratio("Sogong-dong", LocationRole::Workplace, "롯데백화점_본점", 0.9)
            .with_average_spending("Yeouido-dong", Some("420000.4"))
    }

    async fn state(warehouse: InMemoryWarehouse, build: bool) -> AppState {
        let warehouse: Arc<dyn Warehouse> = Arc::new(warehouse);
        let directory = StoreDirectory::from([("더현대서울", "Hyundai"), ("롯데백화점_본점", "Lotte")]);
        let cache = Arc::new(LocationCache::new(100, 60));
        let timeout = Duration::from_secs(5);

        let predictor = Arc::new(Predictor::new(
            warehouse.clone(),
            PredictorConfig {
                schema: FeatureSchema::default(),
                directory: directory.clone(),
                params: ForestParams {
                    n_estimators: 10,
                    ..ForestParams::default()
                },
                training_districts: vec!["Yeouido-dong".to_string()],
                training_timeout: timeout,
            },
        ));
        if build {
            predictor.build().await;
        }

        AppState {
            predictor,
            scorer: Arc::new(LocationPreferenceScorer::new(
                warehouse.clone(),
                cache.clone(),
                directory,
                LocationWeights::default(),
                timeout,
            )),
            estimator: Arc::new(SpendEstimator::new(warehouse.clone(), cache, timeout)),
            warehouse,
            tiers: TierSettings::default(),
        }
    }

    fn profile_body() -> serde_json::Value {
        serde_json::json!({
            "gender": "female",
            "ageBracket": "30s",
            "residenceArea": "Yeouido-dong",
            "workplaceArea": "Sogong-dong",
            "householdType": "newlywed"
        })
    }

    #[actix_web::test]
    async fn test_health_reports_predictor_state() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(warehouse(), true).await))
                .configure(crate::routes::configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/health").to_request();
        let body: HealthResponse = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body.status, "healthy");
        assert_eq!(body.predictor, "ready");
        assert!(body.model_id.is_some());
    }

    #[actix_web::test]
    async fn test_predictions_include_tier() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(warehouse(), true).await))
                .configure(crate::routes::configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/predictions")
            .set_json(profile_body())
            .to_request();
        let body: PredictionResponse = test::call_and_read_body_json(&app, req).await;

        assert!(body.available);
        assert_eq!(body.top_store.map(|s| s.store).as_deref(), Some("Hyundai"));
        assert_eq!(body.top_stores[0].store, "Hyundai");
        assert_eq!(body.spending, 600_000);
        assert_eq!(body.tier.map(|t| t.tier), Some(crate::models::CustomerTier::Premium));
    }

    #[actix_web::test]
    async fn test_predictions_before_build_are_unavailable() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(warehouse(), false).await))
                .configure(crate::routes::configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/predictions")
            .set_json(profile_body())
            .to_request();
        let body: PredictionResponse = test::call_and_read_body_json(&app, req).await;

        assert!(!body.available);
        assert!(body.top_store.is_none());
        assert!(body.store_probabilities.is_empty());
        assert_eq!(body.spending, 0);
        assert!(body.tier.is_none());
    }

    #[actix_web::test]
    async fn test_invalid_month_is_rejected() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(warehouse(), false).await))
                .configure(crate::routes::configure_routes),
        )
        .await;

        let mut body = profile_body();
        body["month"] = serde_json::json!(13);
        let req = test::TestRequest::post()
            .uri("/api/v1/predictions")
            .set_json(body)
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_blank_area_is_rejected() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(warehouse(), false).await))
                .configure(crate::routes::configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/stores/score")
            .set_json(serde_json::json!({
                "residenceArea": "   ",
                "workplaceArea": "Sogong-dong"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_store_scores() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(warehouse(), false).await))
                .configure(crate::routes::configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/stores/score")
            .set_json(serde_json::json!({
                "residenceArea": "Yeouido-dong",
                "workplaceArea": "Sogong-dong"
            }))
            .to_request();
        let body: StoreScoreResponse = test::call_and_read_body_json(&app, req).await;

        assert!(body.available);
        assert_eq!(body.scores[0].store, "Lotte");
        assert!((body.scores[0].score - 0.36).abs() < 1e-12);
        assert_eq!(body.scores[1].store, "Hyundai");
        assert!((body.scores[1].score - 0.3).abs() < 1e-12);
    }

    #[actix_web::test]
    async fn test_spending_estimate_unknown_area() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(warehouse(), false).await))
                .configure(crate::routes::configure_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/v1/spending/estimate?residenceArea=Atlantis")
            .to_request();
        let body: SpendingEstimateResponse = test::call_and_read_body_json(&app, req).await;

        assert!(!body.available);
        assert_eq!(body.amount, 0);
    }

    #[actix_web::test]
    async fn test_insights_payload() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(warehouse(), true).await))
                .configure(crate::routes::configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/insights")
            .set_json(profile_body())
            .to_request();
        let body: InsightResponse = test::call_and_read_body_json(&app, req).await;

        assert!(body.prediction.available);
        assert!(body.location.available);
        assert_eq!(body.residence_spending.amount, 420_000);
        assert!(body.residence_spending.available);
    }
}
