// Coastal Alert core library
// Threshold evaluation, region resolution and notification fan-out for coastal threat alerts

pub mod classifier;
pub mod config;
pub mod directory;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod model;
pub mod notifier;
pub mod recorder;
pub mod region;

// Re-export commonly used types
pub use classifier::{classify, Classification};
pub use config::{NotifierConfig, ThresholdRegistry, ThresholdTable};
pub use directory::{ContactDirectory, InMemoryDirectory};
pub use dispatcher::{DispatchSummary, Dispatcher};
pub use engine::{AlertCleared, AlertDispatched, AlertEngine, EvaluationResponse};
pub use error::{DeliveryError, EngineError, EngineResult};
pub use model::{
    AlertLogEntry, Channel, Contact, DeliveryStatus, DispatchOutcome, Metric, NewAlertLogEntry,
    Reading, SeverityTier,
};
pub use notifier::{LogNotifier, NotificationMessage, Notifier, NotifierSet};
#[cfg(feature = "smtp")]
pub use notifier::SmtpEmailNotifier;
pub use recorder::{clamp_limit, AlertStore, InMemoryAlertLog, LogCounts};
pub use region::{resolve, RegionSelector, ResolvedTargets};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
