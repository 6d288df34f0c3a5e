// Threshold table and notifier configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{EngineError, EngineResult};
use crate::model::Metric;

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Metric → alert threshold.
///
/// Serialized as a plain `{"water_level": 3.5, ...}` map. Decoding rejects
/// unknown metric names and non-finite thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, f64>",
    into = "BTreeMap<String, f64>"
)]
pub struct ThresholdTable {
    entries: BTreeMap<Metric, f64>,
}

impl Default for ThresholdTable {
    fn default() -> Self {
        let entries = BTreeMap::from([
            (Metric::WaterLevel, 3.5),
            (Metric::WindSpeed, 120.0),
            (Metric::Rainfall24h, 100.0),
            (Metric::WaveHeight, 5.0),
            (Metric::StormSurge, 2.0),
        ]);
        Self { entries }
    }
}

impl ThresholdTable {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Builder-style insert, validating the threshold.
    pub fn with(mut self, metric: Metric, threshold: f64) -> EngineResult<Self> {
        self.set(metric, threshold)?;
        Ok(self)
    }

    pub fn set(&mut self, metric: Metric, threshold: f64) -> EngineResult<()> {
        if !threshold.is_finite() {
            return Err(EngineError::InvalidThresholds(format!(
                "threshold for {} must be finite, got {}",
                metric, threshold
            )));
        }
        self.entries.insert(metric, threshold);
        Ok(())
    }

    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.entries.get(&metric).copied()
    }

    /// Threshold for a configured metric, `UnknownMetric` otherwise.
    pub fn threshold_for(&self, metric: Metric) -> EngineResult<f64> {
        self.get(metric).ok_or_else(|| EngineError::UnknownMetric {
            metric: metric.as_str().to_string(),
            available: self.metric_names(),
        })
    }

    pub fn metric_names(&self) -> Vec<String> {
        self.entries.keys().map(|m| m.as_str().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, f64)> + '_ {
        self.entries.iter().map(|(m, t)| (*m, *t))
    }

    /// Load a TOML file with a `[thresholds]` table. Metrics missing from the
    /// file keep their default threshold.
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read thresholds file {}", path.display()))?;
        let file: ThresholdFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse thresholds file {}", path.display()))?;

        let mut table = Self::default();
        for (metric, threshold) in file.thresholds.iter() {
            table.set(metric, threshold)?;
        }
        info!(
            "Loaded {} thresholds from {}",
            file.thresholds.len(),
            path.display()
        );
        Ok(table)
    }
}

impl TryFrom<BTreeMap<String, f64>> for ThresholdTable {
    type Error = EngineError;

    fn try_from(raw: BTreeMap<String, f64>) -> Result<Self, Self::Error> {
        let mut table = Self::empty();
        for (name, threshold) in raw {
            let metric: Metric = name
                .parse()
                .map_err(|e: EngineError| EngineError::InvalidThresholds(e.to_string()))?;
            table.set(metric, threshold)?;
        }
        Ok(table)
    }
}

impl From<ThresholdTable> for BTreeMap<String, f64> {
    fn from(table: ThresholdTable) -> Self {
        table
            .entries
            .into_iter()
            .map(|(m, t)| (m.as_str().to_string(), t))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct ThresholdFile {
    thresholds: ThresholdTable,
}

/// Process-wide holder of the current threshold table.
///
/// Evaluations take an `Arc` snapshot; `replace` swaps the pointer so that
/// in-flight evaluations keep the table they started with.
#[derive(Debug, Default)]
pub struct ThresholdRegistry {
    current: RwLock<Arc<ThresholdTable>>,
}

impl ThresholdRegistry {
    pub fn new(table: ThresholdTable) -> Self {
        Self {
            current: RwLock::new(Arc::new(table)),
        }
    }

    pub fn snapshot(&self) -> Arc<ThresholdTable> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn replace(&self, table: ThresholdTable) {
        let table = Arc::new(table);
        match self.current.write() {
            Ok(mut guard) => *guard = table,
            Err(poisoned) => *poisoned.into_inner() = table,
        }
        info!("Threshold table replaced");
    }
}

// ---------------------------------------------------------------------------
// Notifiers
// ---------------------------------------------------------------------------

pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Credentials for the outbound notification providers. A channel whose
/// credentials are incomplete runs in demo mode.
///
/// Email prefers SMTP; the HTTP mail API is used only when SMTP is not set up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub twilio_from_number: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    /// Defaults to `smtp_username`.
    pub smtp_from: Option<String>,
    pub email_api_url: Option<String>,
    pub email_api_key: Option<String>,
    pub email_from: Option<String>,
    pub send_timeout_secs: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            twilio_account_sid: None,
            twilio_auth_token: None,
            twilio_from_number: None,
            smtp_host: None,
            smtp_port: DEFAULT_SMTP_PORT,
            smtp_username: None,
            smtp_password: None,
            smtp_from: None,
            email_api_url: None,
            email_api_key: None,
            email_from: None,
            send_timeout_secs: 10,
        }
    }
}

impl NotifierConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        config.twilio_account_sid = non_empty_var("TWILIO_ACCOUNT_SID");
        config.twilio_auth_token = non_empty_var("TWILIO_AUTH_TOKEN");
        config.twilio_from_number = non_empty_var("TWILIO_PHONE_NUMBER");
        config.smtp_host = non_empty_var("SMTP_HOST");
        config.smtp_username = non_empty_var("SMTP_USERNAME");
        config.smtp_password = non_empty_var("SMTP_PASSWORD");
        config.smtp_from = non_empty_var("SMTP_FROM");
        if let Some(port) = non_empty_var("SMTP_PORT") {
            match port.parse() {
                Ok(port) => config.smtp_port = port,
                Err(_) => warn!("Ignoring invalid SMTP_PORT value '{}'", port),
            }
        }
        config.email_api_url = non_empty_var("EMAIL_API_URL");
        config.email_api_key = non_empty_var("EMAIL_API_KEY");
        config.email_from = non_empty_var("EMAIL_FROM");

        if let Some(timeout) = non_empty_var("NOTIFY_TIMEOUT_SECS") {
            match timeout.parse() {
                Ok(secs) => config.send_timeout_secs = secs,
                Err(_) => warn!("Ignoring invalid NOTIFY_TIMEOUT_SECS value '{}'", timeout),
            }
        }

        config
    }

    pub fn sms_configured(&self) -> bool {
        self.twilio_account_sid.is_some()
            && self.twilio_auth_token.is_some()
            && self.twilio_from_number.is_some()
    }

    pub fn smtp_configured(&self) -> bool {
        self.smtp_host.is_some() && self.smtp_username.is_some() && self.smtp_password.is_some()
    }

    pub fn mail_api_configured(&self) -> bool {
        self.email_api_url.is_some() && self.email_api_key.is_some() && self.email_from.is_some()
    }

    pub fn email_configured(&self) -> bool {
        self.smtp_configured() || self.mail_api_configured()
    }

    /// Sender address for SMTP mail.
    pub fn smtp_sender(&self) -> Option<&str> {
        self.smtp_from
            .as_deref()
            .or(self.smtp_username.as_deref())
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
