use axum::{
    extract::Request,
    http::{HeaderValue, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use coastal_core::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{error, warn};

pub const TRACE_ID_HEADER: &str = "x-trace-id";

tokio::task_local! {
    static TRACE_ID: String;
}

/// Trace id of the request being handled, when called under `trace_request`.
pub fn current_trace_id() -> Option<String> {
    TRACE_ID.try_with(|id| id.clone()).ok()
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Unknown metric, non-finite value or a bad threshold table.
    #[error("Invalid input: {message}")]
    InvalidInput {
        message: String,
        available_metrics: Vec<String>,
    },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Service unavailable: {service} - {message}")]
    ServiceUnavailable { service: String, message: String },
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub code: String,
    pub timestamp: String,
    pub trace_id: Option<String>,
    pub details: Option<HashMap<String, serde_json::Value>>,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: String, code: &str) -> Self {
        Self {
            error: error_type.to_string(),
            message,
            code: code.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            trace_id: current_trace_id(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: HashMap<String, serde_json::Value>) -> Self {
        self.details = Some(details);
        self
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match self {
            AppError::Database(ref e) => {
                error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new(
                        "database_error",
                        "A database error occurred".to_string(),
                        "DB_ERROR",
                    ),
                )
            }

            AppError::InvalidInput {
                ref message,
                ref available_metrics,
            } => {
                warn!("Invalid input: {}", message);
                let mut response =
                    ErrorResponse::new("invalid_input", message.clone(), "INVALID_INPUT");
                if !available_metrics.is_empty() {
                    let mut details = HashMap::new();
                    details.insert(
                        "available_metrics".to_string(),
                        serde_json::json!(available_metrics),
                    );
                    response = response.with_details(details);
                }
                (StatusCode::BAD_REQUEST, response)
            }

            AppError::Validation { ref message } => {
                warn!("Validation error: {}", message);
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::new("validation_error", message.clone(), "VALIDATION_FAILED"),
                )
            }

            AppError::ServiceUnavailable {
                ref service,
                ref message,
            } => {
                error!("Service unavailable: {} - {}", service, message);
                let mut details = HashMap::new();
                details.insert(
                    "service".to_string(),
                    serde_json::Value::String(service.clone()),
                );
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorResponse::new(
                        "service_unavailable",
                        format!("Service unavailable: {}", service),
                        "SERVICE_DOWN",
                    )
                    .with_details(details),
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::UnknownMetric { ref available, .. } => Self::InvalidInput {
                message: err.to_string(),
                available_metrics: available.clone(),
            },
            EngineError::InvalidValue(_) | EngineError::InvalidThresholds(_) => Self::InvalidInput {
                message: err.to_string(),
                available_metrics: Vec::new(),
            },
            EngineError::DirectoryUnavailable(message) => Self::ServiceUnavailable {
                service: "contact_directory".to_string(),
                message,
            },
            EngineError::StoreUnavailable(message) => Self::ServiceUnavailable {
                service: "alert_store".to_string(),
                message,
            },
        }
    }
}

// Helper functions for creating specific errors
impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

// 404 handler
pub async fn handle_404(uri: Uri) -> impl IntoResponse {
    let error_response = ErrorResponse::new(
        "not_found",
        format!("No route found for {}", uri.path()),
        "ROUTE_NOT_FOUND",
    );

    (StatusCode::NOT_FOUND, Json(error_response))
}

pub type AppResult<T> = Result<T, AppError>;

// Request body checks that run before the engine sees anything
pub mod validation {
    use super::*;
    use coastal_core::ThresholdTable;
    use std::collections::BTreeMap;

    pub fn validate_non_empty(value: &str, field_name: &str) -> AppResult<()> {
        if value.trim().is_empty() {
            Err(AppError::validation(format!("{} cannot be empty", field_name)))
        } else {
            Ok(())
        }
    }

    /// Parse `?limit=`. Integers too large for `i64` saturate by sign so the
    /// caller can clamp them; anything that is not an integer is rejected.
    pub fn validate_limit(raw: Option<&str>) -> AppResult<Option<i64>> {
        let raw = match raw.map(str::trim) {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Ok(None),
        };

        let digits = raw
            .strip_prefix('-')
            .or_else(|| raw.strip_prefix('+'))
            .unwrap_or(raw);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AppError::validation(format!(
                "limit must be an integer, got '{}'",
                raw
            )));
        }

        match raw.parse::<i64>() {
            Ok(limit) => Ok(Some(limit)),
            Err(_) if raw.starts_with('-') => Ok(Some(i64::MIN)),
            Err(_) => Ok(Some(i64::MAX)),
        }
    }

    /// A replacement table must name at least one metric; every name and
    /// threshold is then checked by `ThresholdTable` itself.
    pub fn validate_threshold_update(raw: BTreeMap<String, f64>) -> AppResult<ThresholdTable> {
        if raw.is_empty() {
            return Err(AppError::validation(
                "Threshold table must contain at least one metric",
            ));
        }
        Ok(ThresholdTable::try_from(raw)?)
    }
}

/// Logs every request with a fresh trace id and echoes it in `x-trace-id`.
/// Error bodies built while the request runs carry the same id.
pub async fn trace_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    let trace_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(
        trace_id = %trace_id,
        method = %method,
        uri = %uri,
        "Request started"
    );

    let mut response = TRACE_ID.scope(trace_id.clone(), next.run(request)).await;

    let status = response.status();
    let duration = start.elapsed();

    tracing::info!(
        trace_id = %trace_id,
        method = %method,
        uri = %uri,
        status = %status,
        duration_ms = duration.as_millis(),
        "Request completed"
    );

    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert(TRACE_ID_HEADER, value);
    }
    response
}
