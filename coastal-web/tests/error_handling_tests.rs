use axum::{http::StatusCode, response::IntoResponse};
use coastal_core::EngineError;
use coastal_web::error_handling::{AppError, ErrorResponse};

async fn body_of(error: AppError) -> (StatusCode, ErrorResponse) {
    let response = error.into_response();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[test]
fn test_app_error_validation() {
    let error = AppError::validation("Invalid input");

    let response = error.into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[test]
fn test_app_error_from_sqlx() {
    use sqlx::Error as SqlxError;

    let sqlx_error = SqlxError::RowNotFound;
    let app_error: AppError = sqlx_error.into();

    let response = app_error.into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_unknown_metric_lists_available_metrics() {
    let error = AppError::from(EngineError::UnknownMetric {
        metric: "tide".to_string(),
        available: vec!["water_level".to_string(), "wind_speed".to_string()],
    });

    let (status, body) = body_of(error).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.code, "INVALID_INPUT");
    assert_eq!(
        body.message,
        "Unknown metric: tide. Available metrics: water_level, wind_speed"
    );
    let details = body.details.unwrap();
    assert_eq!(
        details["available_metrics"],
        serde_json::json!(["water_level", "wind_speed"])
    );
}

#[tokio::test]
async fn test_invalid_value_is_bad_request() {
    let (status, body) = body_of(AppError::from(EngineError::InvalidValue(f64::INFINITY))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.code, "INVALID_INPUT");
    assert!(body.details.is_none());
}

#[tokio::test]
async fn test_collaborator_failures_are_service_down() {
    let (status, body) = body_of(AppError::from(EngineError::directory("connection refused"))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body.code, "SERVICE_DOWN");
    assert_eq!(body.details.unwrap()["service"], "contact_directory");

    let (status, body) = body_of(AppError::from(EngineError::store("disk full"))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body.details.unwrap()["service"], "alert_store");
    // internal detail stays in the logs
    assert!(!body.message.contains("disk full"));
}

#[cfg(test)]
mod validation_tests {
    use coastal_web::error_handling::validation::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_validate_non_empty_failure() {
        assert!(validate_non_empty("", "metric").is_err());
        assert!(validate_non_empty("   ", "metric").is_err());
        assert!(validate_non_empty("wave_height", "metric").is_ok());
    }

    #[test]
    fn test_threshold_update_rejects_unknown_metric() {
        let raw = BTreeMap::from([("tsunami".to_string(), 1.0)]);
        assert!(validate_threshold_update(raw).is_err());
    }

    #[test]
    fn test_threshold_update_accepts_partial_table() {
        let raw = BTreeMap::from([
            ("wave_height".to_string(), 4.0),
            ("storm_surge".to_string(), 1.5),
        ]);
        let table = validate_threshold_update(raw).unwrap();
        assert_eq!(table.metric_names(), vec!["wave_height", "storm_surge"]);
    }
}
