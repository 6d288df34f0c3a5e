use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, health_check, AppState};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Alert evaluation
        .route("/alerts", post(handlers::evaluate_alert))
        .route("/evaluate-alert", post(handlers::evaluate_alert))
        .route("/alerts/logs", get(handlers::list_alert_logs))
        // Threshold configuration
        .route(
            "/thresholds",
            get(handlers::get_thresholds).put(handlers::update_thresholds),
        )
        .route("/stats", get(handlers::get_stats))
        .route("/health", get(health_check))
}
