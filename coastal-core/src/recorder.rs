// Append-only alert history

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::EngineResult;
use crate::model::{AlertLogEntry, NewAlertLogEntry};

/// Page size when the caller gives no limit.
pub const DEFAULT_LOG_LIMIT: usize = 100;
/// Upper bound on a single history query.
pub const MAX_LOG_LIMIT: usize = 1000;

/// Clamp a caller supplied limit to `[0, MAX_LOG_LIMIT]`.
pub fn clamp_limit(requested: Option<i64>) -> usize {
    match requested {
        None => DEFAULT_LOG_LIMIT,
        Some(n) if n <= 0 => 0,
        Some(n) => (n as u64).min(MAX_LOG_LIMIT as u64) as usize,
    }
}

/// Totals reported by the stats endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogCounts {
    pub total_alerts: i64,
    pub alerts_sent: i64,
}

/// Durable alert history. Entries are never updated or deleted.
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Append one entry and return it with its assigned id. Appends are
    /// serialized by the implementation.
    async fn append(&self, entry: NewAlertLogEntry) -> EngineResult<AlertLogEntry>;

    /// Most recent entries first. `limit` is already clamped by the caller.
    async fn recent(&self, limit: usize) -> EngineResult<Vec<AlertLogEntry>>;

    async fn counts(&self) -> EngineResult<LogCounts>;
}

/// In-process alert log.
///
/// Appends take the write lock, so ids are assigned in append order and an
/// entry is either fully visible or absent. Readers clone `Arc`s out of the
/// lock and never observe a partial write.
#[derive(Debug, Default)]
pub struct InMemoryAlertLog {
    entries: RwLock<Vec<Arc<AlertLogEntry>>>,
}

impl InMemoryAlertLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl AlertStore for InMemoryAlertLog {
    async fn append(&self, entry: NewAlertLogEntry) -> EngineResult<AlertLogEntry> {
        let mut entries = self.entries.write().await;
        let id = entries.len() as i64 + 1;
        let stored = Arc::new(AlertLogEntry::from_new(id, entry));
        entries.push(Arc::clone(&stored));
        Ok(stored.as_ref().clone())
    }

    async fn recent(&self, limit: usize) -> EngineResult<Vec<AlertLogEntry>> {
        let snapshot: Vec<Arc<AlertLogEntry>> = {
            let entries = self.entries.read().await;
            entries.iter().rev().take(limit).cloned().collect()
        };
        Ok(snapshot.into_iter().map(|e| e.as_ref().clone()).collect())
    }

    async fn counts(&self) -> EngineResult<LogCounts> {
        let entries = self.entries.read().await;
        Ok(LogCounts {
            total_alerts: entries.len() as i64,
            alerts_sent: entries.iter().filter(|e| e.sent).count() as i64,
        })
    }
}
