// Core data types shared by the engine, the stores and the web layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// A monitored physical quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    WaterLevel,
    WindSpeed,
    #[serde(rename = "rainfall_24h")]
    Rainfall24h,
    WaveHeight,
    StormSurge,
}

impl Metric {
    /// Wire name, e.g. `water_level`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WaterLevel => "water_level",
            Self::WindSpeed => "wind_speed",
            Self::Rainfall24h => "rainfall_24h",
            Self::WaveHeight => "wave_height",
            Self::StormSurge => "storm_surge",
        }
    }

    /// Human readable name used in notification text.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::WaterLevel => "Water Level",
            Self::WindSpeed => "Wind Speed",
            Self::Rainfall24h => "Rainfall 24H",
            Self::WaveHeight => "Wave Height",
            Self::StormSurge => "Storm Surge",
        }
    }

    pub fn all() -> &'static [Metric] {
        &[
            Self::WaterLevel,
            Self::WindSpeed,
            Self::Rainfall24h,
            Self::WaveHeight,
            Self::StormSurge,
        ]
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::all()
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| EngineError::UnknownMetric {
                metric: s.to_string(),
                available: Metric::all().iter().map(|m| m.as_str().to_string()).collect(),
            })
    }
}

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Severity tiers, in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SeverityTier {
    Normal,
    High,
    Critical,
}

impl SeverityTier {
    /// HIGH and CRITICAL always dispatch.
    pub fn is_alert(&self) -> bool {
        *self != SeverityTier::Normal
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for SeverityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeverityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NORMAL" => Ok(Self::Normal),
            "HIGH" => Ok(Self::High),
            "CRITICAL" => Ok(Self::Critical),
            other => Err(format!("unknown severity tier '{}'", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// A sensor reading submitted for evaluation.
///
/// `metric` is kept as the raw caller string so that an unknown name is
/// reported as `UnknownMetric` by the classifier instead of failing to decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub metric: String,
    pub value: f64,
    #[serde(default, alias = "location", deserialize_with = "null_as_empty")]
    pub region_selector: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Reading {
    pub fn new(metric: impl Into<String>, value: f64, region_selector: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            value,
            region_selector: region_selector.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Contacts
// ---------------------------------------------------------------------------

/// A notification recipient owned by the external contact directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub region: String,
}

impl Contact {
    /// Phone number usable for SMS, if any.
    pub fn sms_address(&self) -> Option<&str> {
        non_blank(self.phone.as_deref())
    }

    /// E-mail address, if any.
    pub fn email_address(&self) -> Option<&str> {
        non_blank(self.email.as_deref())
    }

    /// Channels this contact can be reached on, with their addresses.
    pub fn channels(&self) -> Vec<(Channel, &str)> {
        let mut channels = Vec::with_capacity(2);
        if let Some(phone) = self.sms_address() {
            channels.push((Channel::Sms, phone));
        }
        if let Some(email) = self.email_address() {
            channels.push((Channel::Email, email));
        }
        channels
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Sms,
    Email,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Sms => write!(f, "sms"),
            Channel::Email => write!(f, "email"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum DeliveryStatus {
    Delivered,
    Failed(String),
}

/// Result of one (contact, channel) send attempt. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub contact_id: i64,
    pub channel: Channel,
    pub status: DeliveryStatus,
}

impl DispatchOutcome {
    pub fn is_delivered(&self) -> bool {
        self.status == DeliveryStatus::Delivered
    }
}

// ---------------------------------------------------------------------------
// Alert log
// ---------------------------------------------------------------------------

/// An alert log row before the store assigns its id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAlertLogEntry {
    pub metric: Metric,
    pub value: f64,
    pub threshold: f64,
    pub region_selector: String,
    pub severity: SeverityTier,
    pub sent: bool,
    pub contacts_notified: i64,
    pub notifications_sent: i64,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Immutable record of one evaluated reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertLogEntry {
    pub id: i64,
    pub metric: Metric,
    pub value: f64,
    pub threshold: f64,
    pub region_selector: String,
    pub severity: SeverityTier,
    pub sent: bool,
    pub contacts_notified: i64,
    pub notifications_sent: i64,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl AlertLogEntry {
    pub fn from_new(id: i64, entry: NewAlertLogEntry) -> Self {
        Self {
            id,
            metric: entry.metric,
            value: entry.value,
            threshold: entry.threshold,
            region_selector: entry.region_selector,
            severity: entry.severity,
            sent: entry.sent,
            contacts_notified: entry.contacts_notified,
            notifications_sent: entry.notifications_sent,
            message: entry.message,
            created_at: entry.created_at,
        }
    }
}
