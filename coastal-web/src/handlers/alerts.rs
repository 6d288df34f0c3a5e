use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    response::Json,
};
use coastal_core::{clamp_limit, AlertLogEntry, EvaluationResponse, Reading, ThresholdTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{
    error_handling::{validation, AppError, AppResult},
    AppState,
};

/// Raw `?limit=`; parsed by `validation::validate_limit` so that oversized
/// numbers clamp instead of failing.
#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub limit: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub total_contacts: i64,
    pub total_alerts: i64,
    pub alerts_sent: i64,
    pub thresholds: ThresholdTable,
}

/// `POST /api/alerts`: classify a reading and notify the targeted contacts.
pub async fn evaluate_alert(
    State(state): State<AppState>,
    payload: Result<Json<Reading>, JsonRejection>,
) -> AppResult<Json<EvaluationResponse>> {
    let Json(reading) = payload.map_err(|e| AppError::validation(e.body_text()))?;
    validation::validate_non_empty(&reading.metric, "metric")?;

    let response = state.engine.evaluate(&reading).await?;
    if let EvaluationResponse::Dispatched(ref dispatched) = response {
        tracing::info!(
            log_id = dispatched.log_id,
            sent_to = dispatched.sent_to,
            area_contacts = dispatched.area_contacts,
            "Alert {} dispatched to {}",
            dispatched.severity,
            dispatched.location
        );
    }

    Ok(Json(response))
}

pub async fn list_alert_logs(
    State(state): State<AppState>,
    query: Result<Query<LogQuery>, QueryRejection>,
) -> AppResult<Json<Vec<AlertLogEntry>>> {
    let Query(query) = query.map_err(|e| AppError::validation(e.body_text()))?;
    let limit = clamp_limit(validation::validate_limit(query.limit.as_deref())?);
    let logs = state.engine.recent_logs(limit).await?;
    Ok(Json(logs))
}

pub async fn get_thresholds(State(state): State<AppState>) -> Json<ThresholdTable> {
    Json(state.engine.thresholds().as_ref().clone())
}

/// `PUT /api/thresholds`: replace the whole table. Evaluations already in
/// flight finish against the table they started with.
pub async fn update_thresholds(
    State(state): State<AppState>,
    payload: Result<Json<BTreeMap<String, f64>>, JsonRejection>,
) -> AppResult<Json<ThresholdTable>> {
    let Json(raw) = payload.map_err(|e| AppError::validation(e.body_text()))?;
    let table = validation::validate_threshold_update(raw)?;

    state.engine.reload_thresholds(table.clone());
    tracing::info!("Thresholds updated: {} metrics", table.len());
    Ok(Json(table))
}

pub async fn get_stats(State(state): State<AppState>) -> AppResult<Json<StatsResponse>> {
    let total_contacts = state.db.count_contacts().await?;
    let counts = state.engine.log_counts().await?;

    Ok(Json(StatsResponse {
        total_contacts,
        total_alerts: counts.total_alerts,
        alerts_sent: counts.alerts_sent,
        thresholds: state.engine.thresholds().as_ref().clone(),
    }))
}
