// Outbound notification channels.
//
// Architecture:
// - mod.rs: Notifier trait, message type, demo (log-only) notifier, per-channel set
// - twilio.rs: SMS through the Twilio Messages REST API
// - smtp.rs: e-mail over SMTP (STARTTLS + login)
// - email.rs: e-mail through an HTTP mail API, used when SMTP is not configured

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::config::NotifierConfig;
use crate::error::DeliveryError;
use crate::model::Channel;

#[cfg(feature = "http-notifiers")]
pub mod email;
#[cfg(feature = "smtp")]
pub mod smtp;
#[cfg(feature = "http-notifiers")]
pub mod twilio;

#[cfg(feature = "http-notifiers")]
pub use email::HttpEmailNotifier;
#[cfg(feature = "smtp")]
pub use smtp::SmtpEmailNotifier;
#[cfg(feature = "http-notifiers")]
pub use twilio::TwilioSmsNotifier;

/// Text of one alert notification. SMS sends only the body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub subject: String,
    pub body: String,
}

/// A single delivery channel back-end.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send `message` to `address`. One call is one attempt; there are no
    /// retries at this layer.
    async fn send(&self, address: &str, message: &NotificationMessage) -> Result<(), DeliveryError>;

    fn provider_name(&self) -> &str;
}

/// Demo-mode notifier: logs the message and reports it delivered.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    channel: Channel,
}

impl LogNotifier {
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, address: &str, message: &NotificationMessage) -> Result<(), DeliveryError> {
        match self.channel {
            Channel::Sms => info!(to = %address, "[DEMO] SMS: {}", message.body),
            Channel::Email => info!(
                to = %address,
                subject = %message.subject,
                "[DEMO] EMAIL: {}",
                message.body
            ),
        }
        Ok(())
    }

    fn provider_name(&self) -> &str {
        "demo"
    }
}

/// One notifier per channel.
#[derive(Clone)]
pub struct NotifierSet {
    pub sms: Arc<dyn Notifier>,
    pub email: Arc<dyn Notifier>,
}

impl NotifierSet {
    pub fn new(sms: Arc<dyn Notifier>, email: Arc<dyn Notifier>) -> Self {
        Self { sms, email }
    }

    /// Both channels in demo mode.
    pub fn demo() -> Self {
        Self::new(
            Arc::new(LogNotifier::new(Channel::Sms)),
            Arc::new(LogNotifier::new(Channel::Email)),
        )
    }

    /// Real providers where credentials are complete, demo mode elsewhere.
    pub fn from_config(config: &NotifierConfig) -> Self {
        #[allow(unused_mut)]
        let mut set = Self::demo();

        #[cfg(feature = "http-notifiers")]
        {
            if let Some(sms) = TwilioSmsNotifier::from_config(config) {
                info!("SMS channel using Twilio");
                set.sms = Arc::new(sms);
            }
            if let Some(email) = HttpEmailNotifier::from_config(config) {
                info!("Email channel using HTTP mail API");
                set.email = Arc::new(email);
            }
        }

        // SMTP takes precedence over the HTTP mail API
        #[cfg(feature = "smtp")]
        {
            if let Some(email) = SmtpEmailNotifier::from_config(config) {
                info!("Email channel using SMTP relay {:?}", config.smtp_host);
                set.email = Arc::new(email);
            }
        }

        if !config.sms_configured() {
            info!("SMS channel running in demo mode");
        }
        if !config.email_configured() {
            info!("Email channel running in demo mode");
        }

        set
    }

    pub fn for_channel(&self, channel: Channel) -> Arc<dyn Notifier> {
        match channel {
            Channel::Sms => Arc::clone(&self.sms),
            Channel::Email => Arc::clone(&self.email),
        }
    }
}

impl std::fmt::Debug for NotifierSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifierSet")
            .field("sms", &self.sms.provider_name())
            .field("email", &self.email.provider_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_demo_notifier_always_delivers() {
        let set = NotifierSet::demo();
        let message = NotificationMessage {
            subject: "[HIGH] Coastal Threat Alert - Water Level".to_string(),
            body: "body".to_string(),
        };
        assert!(set.sms.send("+15550100", &message).await.is_ok());
        assert!(set.email.send("a@example.org", &message).await.is_ok());
        assert_eq!(set.for_channel(Channel::Sms).provider_name(), "demo");
    }

    #[cfg(feature = "smtp")]
    #[tokio::test]
    async fn test_from_config_prefers_smtp_for_email() {
        let config = NotifierConfig {
            smtp_host: Some("localhost".to_string()),
            smtp_username: Some("alerts@example.org".to_string()),
            smtp_password: Some("secret".to_string()),
            email_api_url: Some("http://127.0.0.1:9/send".to_string()),
            email_api_key: Some("key".to_string()),
            email_from: Some("alerts@example.org".to_string()),
            ..NotifierConfig::default()
        };
        let set = NotifierSet::from_config(&config);
        assert_eq!(set.email.provider_name(), "smtp");
        assert_eq!(set.sms.provider_name(), "demo");
    }

    #[test]
    fn test_from_config_without_credentials_is_demo() {
        let set = NotifierSet::from_config(&NotifierConfig::default());
        assert_eq!(set.sms.provider_name(), "demo");
        assert_eq!(set.email.provider_name(), "demo");
    }
}
