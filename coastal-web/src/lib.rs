// Coastal Alert web backend
// HTTP adapter over the alert engine, with SQLite-backed contacts and alert history

pub mod config;
pub mod database;
pub mod error_handling;
pub mod handlers;
pub mod routes;

pub use config::WebConfig;
pub use database::Database;
pub use error_handling::{AppError, AppResult};

use axum::{http::HeaderValue, response::Json, routing::get, Router};
use coastal_core::{AlertEngine, Dispatcher, NotifierSet, ThresholdRegistry, ThresholdTable};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use error_handling::{handle_404, trace_request};

// Main application state
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: WebConfig,
    pub engine: Arc<AlertEngine>,
}

impl AppState {
    pub async fn new(config: WebConfig) -> anyhow::Result<Self> {
        let notifiers = NotifierSet::from_config(&config.notifier);
        Self::with_notifiers(config, notifiers).await
    }

    /// Build state with explicit notifier back-ends instead of the configured ones.
    pub async fn with_notifiers(config: WebConfig, notifiers: NotifierSet) -> anyhow::Result<Self> {
        let db = Database::new(&config.database_url).await?;
        db.create_tables().await?;

        let table = match config.thresholds_file {
            Some(ref path) => ThresholdTable::load_file(path)?,
            None => ThresholdTable::default(),
        };
        tracing::info!("Monitoring {} metrics", table.len());

        let dispatcher = Dispatcher::new(notifiers, config.notifier.send_timeout());
        let engine = AlertEngine::new(
            Arc::new(ThresholdRegistry::new(table)),
            Arc::new(db.clone()),
            Arc::new(db.clone()),
            dispatcher,
        );

        Ok(Self {
            db,
            config,
            engine: Arc::new(engine),
        })
    }
}

pub fn create_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", routes::api_routes())
        .fallback(handle_404)
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(trace_request))
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", o);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": NAME,
        "version": VERSION,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Bind and serve until the process is stopped.
pub async fn serve(config: WebConfig) -> anyhow::Result<()> {
    let port = config.port;
    let state = AppState::new(config).await?;
    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Coastal alert server listening on http://{}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
