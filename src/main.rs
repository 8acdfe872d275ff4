use actix_cors::Cors;
use actix_web::{web, App, HttpServer, HttpResponse, middleware, error, http::StatusCode};
use std::sync::Arc;
use std::time::Duration;
use targetiq::config::{LoggingSettings, Settings, WarehouseKind};
use targetiq::core::{LocationPreferenceScorer, Predictor, PredictorConfig, SpendEstimator, StoreDirectory};
use targetiq::models::LocationWeights;
use targetiq::routes::{self, insights::AppState};
use targetiq::services::{InMemoryWarehouse, LocationCache, PostgresWarehouse, Warehouse, WarehouseError};
use tracing::{info, error, warn};
use tracing_subscriber::EnvFilter;

/// JSON error response for JSON payload errors
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST))
            .content_type("application/json")
            .json(self)
    }
}

/// Handle JSON payload errors, including out-of-range enum labels
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    JsonError {
        error: "invalid_query".to_string(),
        message: format!("Invalid query: {}", err),
        status_code: 400,
    }
    .into()
}

/// Initialize logging; `RUST_LOG` overrides the configured level
fn init_tracing(logging: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if logging.format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

async fn open_warehouse(settings: &Settings) -> Result<Arc<dyn Warehouse>, WarehouseError> {
    match settings.warehouse.kind {
        WarehouseKind::Postgres => {
            let warehouse = PostgresWarehouse::from_settings(&settings.database).await?;
            info!(
                "PostgreSQL warehouse initialized (max: {} connections)",
                settings.database.max_connections
            );
            Ok(Arc::new(warehouse))
        }
        WarehouseKind::Synthetic => {
            warn!(
                "Using synthetic warehouse ({} rows, seed {})",
                settings.warehouse.synthetic_rows, settings.warehouse.synthetic_seed
            );
            Ok(Arc::new(InMemoryWarehouse::synthetic(
                &settings.stores.training_stores(),
                &settings.stores.training_districts,
                settings.warehouse.synthetic_rows,
                settings.warehouse.synthetic_seed,
            )))
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    // Load configuration
    let settings = Settings::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::process::exit(1);
    });

    init_tracing(&settings.logging);

    info!("Starting TargetIQ service...");

    let schema = match settings.model.feature_schema() {
        Ok(schema) => schema,
        Err(e) => {
            error!("Failed to load feature schema: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()));
        }
    };

    let directory = StoreDirectory::new(settings.stores.display_names.clone());
    let warehouse = match open_warehouse(&settings).await {
        Ok(warehouse) => warehouse,
        Err(e) => {
            error!("Invalid warehouse configuration: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
        }
    };

    let cache = Arc::new(LocationCache::new(settings.cache.capacity, settings.cache.ttl_secs));
    info!(
        "Location cache initialized ({} entries, TTL: {}s)",
        settings.cache.capacity, settings.cache.ttl_secs
    );

    let query_timeout = Duration::from_secs(settings.warehouse.query_timeout_secs);

    let predictor = Arc::new(Predictor::new(
        warehouse.clone(),
        PredictorConfig {
            schema,
            directory: directory.clone(),
            params: settings.model.forest_params(),
            training_districts: settings.stores.training_districts.clone(),
            training_timeout: Duration::from_secs(settings.warehouse.training_timeout_secs),
        },
    ));

    // A failed build leaves the service up; predictions report unavailable
    let status = predictor.build().await;
    info!("Predictor status after start-up build: {}", status.as_str());

    let weights = LocationWeights::from(&settings.scoring.weights);
    info!("Location scorer initialized with weights: {:?}", weights);

    let app_state = AppState {
        predictor,
        scorer: Arc::new(LocationPreferenceScorer::new(
            warehouse.clone(),
            cache.clone(),
            directory,
            weights,
            query_timeout,
        )),
        estimator: Arc::new(SpendEstimator::new(warehouse.clone(), cache, query_timeout)),
        warehouse,
        tiers: settings.tiers,
    };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
