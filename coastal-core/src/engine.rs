//! Alert evaluation pipeline.
//!
//! One call to [`AlertEngine::evaluate`] moves a reading through
//! `RECEIVED → CLASSIFIED → (DONE | RESOLVING → DISPATCHING → RECORDED → DONE)`.
//! Thresholds are snapshotted once at the start; the contact directory is
//! read once, and only when the reading triggers an alert.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::classifier::{classify, Classification};
use crate::config::{ThresholdRegistry, ThresholdTable};
use crate::directory::ContactDirectory;
use crate::dispatcher::Dispatcher;
use crate::error::EngineResult;
use crate::model::{AlertLogEntry, NewAlertLogEntry, Reading, SeverityTier};
use crate::notifier::NotificationMessage;
use crate::recorder::{AlertStore, LogCounts};
use crate::region::{resolve, RegionSelector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EvaluationStage {
    Received,
    Classified,
    Resolving,
    Dispatching,
    Recorded,
    Done,
}

impl fmt::Display for EvaluationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "RECEIVED",
            Self::Classified => "CLASSIFIED",
            Self::Resolving => "RESOLVING",
            Self::Dispatching => "DISPATCHING",
            Self::Recorded => "RECORDED",
            Self::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// Response for a reading that crossed its threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertDispatched {
    pub alert: bool,
    pub severity: SeverityTier,
    pub location: String,
    /// Contacts with at least one delivered notification.
    pub sent_to: i64,
    pub area_contacts: i64,
    pub total_contacts: i64,
    pub notifications_sent: i64,
    pub message: String,
    pub log_id: i64,
}

/// Response for a reading within safe limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertCleared {
    pub alert: bool,
    pub severity: SeverityTier,
    pub message: String,
    pub log_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EvaluationResponse {
    Dispatched(AlertDispatched),
    Cleared(AlertCleared),
}

impl EvaluationResponse {
    pub fn is_alert(&self) -> bool {
        matches!(self, Self::Dispatched(_))
    }

    pub fn severity(&self) -> SeverityTier {
        match self {
            Self::Dispatched(r) => r.severity,
            Self::Cleared(r) => r.severity,
        }
    }

    pub fn log_id(&self) -> i64 {
        match self {
            Self::Dispatched(r) => r.log_id,
            Self::Cleared(r) => r.log_id,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Dispatched(r) => &r.message,
            Self::Cleared(r) => &r.message,
        }
    }
}

/// Multi-line notification text shared by SMS and e-mail.
pub fn alert_message(classification: &Classification, location_label: &str) -> NotificationMessage {
    let severity = classification.severity;
    let metric = classification.metric.display_name();

    let body = format!(
        "COASTAL THREAT ALERT [{}]\nMetric: {}\nCurrent: {:.2} (Threshold: {:.2})\nLocation: {}\nTake immediate precautions!",
        severity, metric, classification.value, classification.threshold, location_label
    );

    NotificationMessage {
        subject: format!("[{}] Coastal Threat Alert - {}", severity, metric),
        body,
    }
}

fn cleared_message(classification: &Classification) -> String {
    format!(
        "{} at {} is within safe limits",
        classification.metric, classification.value
    )
}

/// Composes classifier, resolver, dispatcher and recorder.
pub struct AlertEngine {
    thresholds: Arc<ThresholdRegistry>,
    directory: Arc<dyn ContactDirectory>,
    store: Arc<dyn AlertStore>,
    dispatcher: Dispatcher,
}

impl AlertEngine {
    pub fn new(
        thresholds: Arc<ThresholdRegistry>,
        directory: Arc<dyn ContactDirectory>,
        store: Arc<dyn AlertStore>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            thresholds,
            directory,
            store,
            dispatcher,
        }
    }

    /// Evaluate one reading.
    ///
    /// Invalid input and an unavailable directory fail before anything is
    /// written. Otherwise exactly one log entry is appended, whatever the
    /// delivery results were.
    pub async fn evaluate(&self, reading: &Reading) -> EngineResult<EvaluationResponse> {
        trace_stage(EvaluationStage::Received, reading);

        let table = self.thresholds.snapshot();
        let classification = classify(&reading.metric, reading.value, &table)?;
        debug!(
            stage = %EvaluationStage::Classified,
            metric = %classification.metric,
            severity = %classification.severity,
            "Reading classified"
        );

        if !classification.is_alert() {
            let message = cleared_message(&classification);
            let entry = self
                .record(&classification, reading, false, 0, 0, message.clone())
                .await?;
            debug!(stage = %EvaluationStage::Done, log_id = entry.id, "No alert");

            return Ok(EvaluationResponse::Cleared(AlertCleared {
                alert: false,
                severity: SeverityTier::Normal,
                message,
                log_id: entry.id,
            }));
        }

        debug!(stage = %EvaluationStage::Resolving, selector = %reading.region_selector, "Resolving targets");
        let contacts = self.directory.list_contacts().await.map_err(|e| {
            error!("Contact directory unavailable: {}", e);
            e
        })?;
        let selector = RegionSelector::parse(&reading.region_selector);
        let targets = resolve(&selector, &contacts);
        if targets.is_empty() {
            warn!(location = %targets.location_label, "No contacts in alert area");
        }

        let notification = alert_message(&classification, &targets.location_label);
        debug!(
            stage = %EvaluationStage::Dispatching,
            targets = targets.len(),
            "Dispatching notifications"
        );
        let summary = self.dispatcher.dispatch(&targets.contacts, &notification).await;

        let entry = self
            .record(
                &classification,
                reading,
                true,
                summary.contacts_notified,
                summary.notifications_sent,
                notification.body.clone(),
            )
            .await?;
        debug!(stage = %EvaluationStage::Recorded, log_id = entry.id, "Alert recorded");

        info!(
            metric = %classification.metric,
            severity = %classification.severity,
            location = %targets.location_label,
            area_contacts = targets.len(),
            notifications_sent = summary.notifications_sent,
            "Alert triggered"
        );
        debug!(stage = %EvaluationStage::Done, log_id = entry.id, "Evaluation complete");

        Ok(EvaluationResponse::Dispatched(AlertDispatched {
            alert: true,
            severity: classification.severity,
            location: targets.location_label,
            sent_to: summary.contacts_notified,
            area_contacts: targets.contacts.len() as i64,
            total_contacts: contacts.len() as i64,
            notifications_sent: summary.notifications_sent,
            message: notification.body,
            log_id: entry.id,
        }))
    }

    async fn record(
        &self,
        classification: &Classification,
        reading: &Reading,
        sent: bool,
        contacts_notified: i64,
        notifications_sent: i64,
        message: String,
    ) -> EngineResult<AlertLogEntry> {
        let entry = NewAlertLogEntry {
            metric: classification.metric,
            value: classification.value,
            threshold: classification.threshold,
            region_selector: reading.region_selector.clone(),
            severity: classification.severity,
            sent,
            contacts_notified,
            notifications_sent,
            message,
            created_at: Utc::now(),
        };

        self.store.append(entry).await.map_err(|e| {
            error!("Failed to record alert log entry: {}", e);
            e
        })
    }

    /// Most recent log entries first; `limit` should come from `clamp_limit`.
    pub async fn recent_logs(&self, limit: usize) -> EngineResult<Vec<AlertLogEntry>> {
        self.store.recent(limit).await
    }

    pub fn thresholds(&self) -> Arc<ThresholdTable> {
        self.thresholds.snapshot()
    }

    /// Swap the threshold table. Evaluations already running keep the old one.
    pub fn reload_thresholds(&self, table: ThresholdTable) {
        self.thresholds.replace(table);
    }

    pub async fn log_counts(&self) -> EngineResult<LogCounts> {
        self.store.counts().await
    }
}

fn trace_stage(stage: EvaluationStage, reading: &Reading) {
    debug!(
        stage = %stage,
        metric = %reading.metric,
        value = reading.value,
        selector = %reading.region_selector,
        "Reading received"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::InMemoryDirectory;
    use crate::error::EngineError;
    use crate::model::{Contact, Metric};
    use crate::notifier::NotifierSet;
    use crate::recorder::InMemoryAlertLog;
    use async_trait::async_trait;
    use std::time::Duration;

    struct BrokenDirectory;

    #[async_trait]
    impl ContactDirectory for BrokenDirectory {
        async fn list_contacts(&self) -> EngineResult<Vec<Contact>> {
            Err(EngineError::directory("connection refused"))
        }
    }

    fn contact(id: i64, phone: Option<&str>, email: Option<&str>, region: &str) -> Contact {
        Contact {
            id,
            name: format!("Contact {}", id),
            phone: phone.map(String::from),
            email: email.map(String::from),
            region: region.to_string(),
        }
    }

    fn kerala_directory() -> Vec<Contact> {
        vec![
            contact(1, Some("+919800000001"), None, "Kerala"),
            contact(2, Some("+919800000002"), Some("two@example.org"), "Kochi, Kerala"),
            contact(3, Some("+919800000003"), None, "Goa"),
        ]
    }

    fn water_table(threshold: f64) -> ThresholdTable {
        ThresholdTable::empty().with(Metric::WaterLevel, threshold).unwrap()
    }

    fn engine_with(
        table: ThresholdTable,
        directory: Arc<dyn ContactDirectory>,
    ) -> (AlertEngine, Arc<InMemoryAlertLog>) {
        let store = Arc::new(InMemoryAlertLog::new());
        let engine = AlertEngine::new(
            Arc::new(ThresholdRegistry::new(table)),
            directory,
            store.clone(),
            Dispatcher::new(NotifierSet::demo(), Duration::from_secs(5)),
        );
        (engine, store)
    }

    #[tokio::test]
    async fn test_kerala_alert_counts() {
        let (engine, store) = engine_with(
            water_table(3.0),
            Arc::new(InMemoryDirectory::new(kerala_directory())),
        );

        let response = engine
            .evaluate(&Reading::new("water_level", 3.5, "Kerala"))
            .await
            .unwrap();

        match response {
            EvaluationResponse::Dispatched(r) => {
                assert!(r.alert);
                assert_eq!(r.severity, SeverityTier::High);
                assert_eq!(r.location, "Kerala");
                assert_eq!(r.area_contacts, 2);
                assert_eq!(r.sent_to, 2);
                assert_eq!(r.total_contacts, 3);
                assert_eq!(r.notifications_sent, 3);
                assert!(r.message.starts_with("COASTAL THREAT ALERT [HIGH]\nMetric: Water Level\n"));
                assert!(r.message.contains("Current: 3.50 (Threshold: 3.00)"));
                assert!(r.message.ends_with("Location: Kerala\nTake immediate precautions!"));
            }
            other => panic!("expected alert, got {:?}", other),
        }

        let logs = store.recent(10).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert!(logs[0].sent);
        assert_eq!(logs[0].contacts_notified, 2);
        assert_eq!(logs[0].notifications_sent, 3);
        assert_eq!(logs[0].region_selector, "Kerala");
    }

    #[tokio::test]
    async fn test_empty_directory_still_alerts_and_logs() {
        let (engine, store) = engine_with(
            ThresholdTable::default(),
            Arc::new(InMemoryDirectory::default()),
        );

        let response = engine
            .evaluate(&Reading::new("wave_height", 9.0, ""))
            .await
            .unwrap();

        match response {
            EvaluationResponse::Dispatched(r) => {
                assert_eq!(r.severity, SeverityTier::Critical);
                assert_eq!(r.location, "All Regions");
                assert_eq!(r.area_contacts, 0);
                assert_eq!(r.sent_to, 0);
                assert_eq!(r.notifications_sent, 0);
            }
            other => panic!("expected alert, got {:?}", other),
        }

        let logs = store.recent(10).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert!(logs[0].sent);
        assert_eq!(logs[0].severity, SeverityTier::Critical);
    }

    #[tokio::test]
    async fn test_threshold_boundaries() {
        let (engine, store) = engine_with(
            water_table(3.0),
            Arc::new(InMemoryDirectory::new(kerala_directory())),
        );

        let at = engine.evaluate(&Reading::new("water_level", 3.0, "")).await.unwrap();
        assert!(!at.is_alert());
        assert_eq!(at.severity(), SeverityTier::Normal);
        assert_eq!(at.message(), "water_level at 3 is within safe limits");

        let high = engine.evaluate(&Reading::new("water_level", 3.5, "")).await.unwrap();
        assert_eq!(high.severity(), SeverityTier::High);

        let critical = engine.evaluate(&Reading::new("water_level", 5.0, "")).await.unwrap();
        assert_eq!(critical.severity(), SeverityTier::Critical);

        let logs = store.recent(10).await.unwrap();
        assert_eq!(logs.len(), 3);
        assert!(!logs[2].sent);
        assert_eq!(logs[2].contacts_notified, 0);
        assert_eq!(logs[2].notifications_sent, 0);
        assert_eq!(logs[2].id, at.log_id());
    }

    #[tokio::test]
    async fn test_invalid_input_writes_nothing() {
        let (engine, store) = engine_with(
            ThresholdTable::default(),
            Arc::new(InMemoryDirectory::new(kerala_directory())),
        );

        let err = engine
            .evaluate(&Reading::new("tide_height", 10.0, ""))
            .await
            .unwrap_err();
        assert!(err.is_invalid_input());

        let err = engine
            .evaluate(&Reading::new("water_level", f64::NAN, ""))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidValue(v) if v.is_nan()));

        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_directory_failure_writes_nothing() {
        let (engine, store) = engine_with(ThresholdTable::default(), Arc::new(BrokenDirectory));

        let err = engine
            .evaluate(&Reading::new("storm_surge", 5.0, "Goa"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::DirectoryUnavailable(_)));
        assert!(store.is_empty().await);

        // no-alert readings never touch the directory
        let ok = engine
            .evaluate(&Reading::new("storm_surge", 1.0, "Goa"))
            .await
            .unwrap();
        assert!(!ok.is_alert());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_evaluations_each_log_once() {
        let (engine, store) = engine_with(
            ThresholdTable::default(),
            Arc::new(InMemoryDirectory::new(kerala_directory())),
        );
        let engine = Arc::new(engine);

        let mut handles = Vec::new();
        for i in 0..20 {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                let value = if i % 2 == 0 { 1.0 } else { 6.0 };
                engine
                    .evaluate(&Reading::new("water_level", value, "Kerala|Goa"))
                    .await
                    .unwrap()
            }));
        }

        let mut log_ids = Vec::new();
        for handle in handles {
            let response = handle.await.unwrap();
            if let EvaluationResponse::Dispatched(ref r) = response {
                assert!(r.notifications_sent <= 2 * r.sent_to);
                assert_eq!(r.area_contacts, 3);
            }
            log_ids.push(response.log_id());
        }
        log_ids.sort_unstable();
        log_ids.dedup();
        assert_eq!(log_ids.len(), 20);

        let counts = store.counts().await.unwrap();
        assert_eq!(counts.total_alerts, 20);
        assert_eq!(counts.alerts_sent, 10);
    }

    #[tokio::test]
    async fn test_reload_applies_to_later_evaluations() {
        let (engine, _store) = engine_with(
            water_table(3.0),
            Arc::new(InMemoryDirectory::new(kerala_directory())),
        );

        let snapshot = engine.thresholds();
        engine.reload_thresholds(water_table(10.0));

        assert_eq!(snapshot.get(Metric::WaterLevel), Some(3.0));
        let response = engine.evaluate(&Reading::new("water_level", 5.0, "")).await.unwrap();
        assert!(!response.is_alert());
    }

    #[test]
    fn test_alert_message_format() {
        let classification = Classification {
            metric: Metric::Rainfall24h,
            value: 180.456,
            threshold: 100.0,
            severity: SeverityTier::Critical,
        };
        let message = alert_message(&classification, "Kerala, Goa");
        assert_eq!(message.subject, "[CRITICAL] Coastal Threat Alert - Rainfall 24H");
        assert_eq!(
            message.body,
            "COASTAL THREAT ALERT [CRITICAL]\nMetric: Rainfall 24H\nCurrent: 180.46 (Threshold: 100.00)\nLocation: Kerala, Goa\nTake immediate precautions!"
        );
    }

    #[test]
    fn test_response_json_shapes() {
        let cleared = EvaluationResponse::Cleared(AlertCleared {
            alert: false,
            severity: SeverityTier::Normal,
            message: "ok".to_string(),
            log_id: 4,
        });
        let json = serde_json::to_value(&cleared).unwrap();
        assert_eq!(json["alert"], false);
        assert_eq!(json["severity"], "NORMAL");
        assert_eq!(json["log_id"], 4);
        assert!(json.get("sent_to").is_none());
    }
}
