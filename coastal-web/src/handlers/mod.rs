pub mod alerts;

pub use alerts::{evaluate_alert, get_stats, get_thresholds, list_alert_logs, update_thresholds};
