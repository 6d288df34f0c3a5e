use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coastal_core::{
    AlertLogEntry, AlertStore, Contact, ContactDirectory, EngineError, EngineResult, LogCounts,
    NewAlertLogEntry,
};
use sqlx::{migrate::MigrateDatabase, sqlite::SqlitePoolOptions, FromRow, Pool, Sqlite};
use std::time::Duration;

/// SQLite-backed contact directory and alert log.
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = if is_in_memory(database_url) {
            // Every connection to :memory: is a separate database, so keep exactly one
            // and never let the pool recycle it.
            let url = if database_url == ":memory:" {
                "sqlite::memory:"
            } else {
                database_url
            };
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .max_lifetime(None::<Duration>)
                .idle_timeout(None::<Duration>)
                .connect(url)
                .await?
        } else {
            // Ensure parent directory exists
            if let Some(db_path) = database_url.strip_prefix("sqlite://") {
                if let Some(parent) = std::path::Path::new(db_path).parent() {
                    std::fs::create_dir_all(parent)?;
                }
            }

            if !Sqlite::database_exists(database_url).await? {
                tracing::info!("Creating database at {}", database_url);
                Sqlite::create_database(database_url).await?;
            }

            SqlitePoolOptions::new()
                .max_connections(10)
                .min_connections(1)
                .max_lifetime(Some(Duration::from_secs(30 * 60)))
                .idle_timeout(Some(Duration::from_secs(10 * 60)))
                .acquire_timeout(Duration::from_secs(30))
                .connect(database_url)
                .await?
        };

        Ok(Self { pool })
    }

    pub async fn create_tables(&self) -> Result<()> {
        let pool = self.pool();

        // Owned by the external contact service; created here so a fresh install starts empty.
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS contacts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                phone TEXT,
                email TEXT,
                region TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS alert_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                metric TEXT NOT NULL,
                value REAL NOT NULL,
                threshold REAL NOT NULL,
                region_selector TEXT NOT NULL DEFAULT '',
                severity TEXT NOT NULL,
                sent INTEGER NOT NULL DEFAULT 0,
                contacts_notified INTEGER NOT NULL DEFAULT 0,
                notifications_sent INTEGER NOT NULL DEFAULT 0,
                message TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_contacts_region ON contacts(region)")
            .execute(pool)
            .await?;

        tracing::info!("Database tables created successfully");
        Ok(())
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn count_contacts(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM contacts")
            .fetch_one(self.pool())
            .await
    }
}

#[derive(Debug, FromRow)]
struct ContactRow {
    id: i64,
    name: String,
    phone: Option<String>,
    email: Option<String>,
    region: String,
}

impl From<ContactRow> for Contact {
    fn from(row: ContactRow) -> Self {
        Contact {
            id: row.id,
            name: row.name,
            phone: row.phone,
            email: row.email,
            region: row.region,
        }
    }
}

#[derive(Debug, FromRow)]
struct AlertLogRow {
    id: i64,
    metric: String,
    value: f64,
    threshold: f64,
    region_selector: String,
    severity: String,
    sent: bool,
    contacts_notified: i64,
    notifications_sent: i64,
    message: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<AlertLogRow> for AlertLogEntry {
    type Error = EngineError;

    fn try_from(row: AlertLogRow) -> Result<Self, Self::Error> {
        let metric = row
            .metric
            .parse()
            .map_err(|_| EngineError::store(format!("alert log {} has unknown metric '{}'", row.id, row.metric)))?;
        let severity = row
            .severity
            .parse()
            .map_err(|e: String| EngineError::store(format!("alert log {}: {}", row.id, e)))?;

        Ok(AlertLogEntry {
            id: row.id,
            metric,
            value: row.value,
            threshold: row.threshold,
            region_selector: row.region_selector,
            severity,
            sent: row.sent,
            contacts_notified: row.contacts_notified,
            notifications_sent: row.notifications_sent,
            message: row.message,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl ContactDirectory for Database {
    async fn list_contacts(&self) -> EngineResult<Vec<Contact>> {
        let rows = sqlx::query_as::<_, ContactRow>(
            "SELECT id, name, phone, email, region FROM contacts ORDER BY id",
        )
        .fetch_all(self.pool())
        .await
        .map_err(|e| EngineError::directory(e.to_string()))?;

        Ok(rows.into_iter().map(Contact::from).collect())
    }
}

#[async_trait]
impl AlertStore for Database {
    async fn append(&self, entry: NewAlertLogEntry) -> EngineResult<AlertLogEntry> {
        let result = sqlx::query(
            "INSERT INTO alert_logs
                (metric, value, threshold, region_selector, severity, sent,
                 contacts_notified, notifications_sent, message, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.metric.as_str())
        .bind(entry.value)
        .bind(entry.threshold)
        .bind(&entry.region_selector)
        .bind(entry.severity.as_str())
        .bind(entry.sent)
        .bind(entry.contacts_notified)
        .bind(entry.notifications_sent)
        .bind(&entry.message)
        .bind(entry.created_at)
        .execute(self.pool())
        .await
        .map_err(|e| EngineError::store(e.to_string()))?;

        Ok(AlertLogEntry::from_new(result.last_insert_rowid(), entry))
    }

    async fn recent(&self, limit: usize) -> EngineResult<Vec<AlertLogEntry>> {
        let rows = sqlx::query_as::<_, AlertLogRow>(
            "SELECT id, metric, value, threshold, region_selector, severity, sent,
                    contacts_notified, notifications_sent, message, created_at
             FROM alert_logs ORDER BY id DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(self.pool())
        .await
        .map_err(|e| EngineError::store(e.to_string()))?;

        rows.into_iter().map(AlertLogEntry::try_from).collect()
    }

    async fn counts(&self) -> EngineResult<LogCounts> {
        let (total_alerts, alerts_sent): (i64, Option<i64>) =
            sqlx::query_as("SELECT COUNT(*), SUM(sent) FROM alert_logs")
                .fetch_one(self.pool())
                .await
                .map_err(|e| EngineError::store(e.to_string()))?;

        Ok(LogCounts {
            total_alerts,
            alerts_sent: alerts_sent.unwrap_or(0),
        })
    }
}
