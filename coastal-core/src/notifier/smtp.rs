use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{debug, warn};

use super::{NotificationMessage, Notifier};
use crate::config::NotifierConfig;
use crate::error::DeliveryError;

/// Plain-text e-mail over SMTP with STARTTLS and login credentials.
///
/// A connection is opened per message; nothing is pooled.
pub struct SmtpEmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmailNotifier {
    pub fn new(
        host: &str,
        port: u16,
        username: String,
        password: String,
        from: Mailbox,
    ) -> Result<Self, DeliveryError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
            .port(port)
            .credentials(Credentials::new(username, password))
            .build();

        Ok(Self { transport, from })
    }

    /// `None` when SMTP credentials are incomplete or unusable.
    pub fn from_config(config: &NotifierConfig) -> Option<Self> {
        let (host, username, password) = match (
            &config.smtp_host,
            &config.smtp_username,
            &config.smtp_password,
        ) {
            (Some(host), Some(username), Some(password)) => (host, username, password),
            _ => return None,
        };

        let sender = config.smtp_sender()?;
        let from: Mailbox = match sender.parse() {
            Ok(from) => from,
            Err(e) => {
                warn!("Invalid SMTP sender address '{}': {}", sender, e);
                return None;
            }
        };

        match Self::new(host, config.smtp_port, username.clone(), password.clone(), from) {
            Ok(notifier) => Some(notifier),
            Err(e) => {
                warn!("Could not set up SMTP relay {}: {}", host, e);
                None
            }
        }
    }

    fn build_message(&self, address: &str, message: &NotificationMessage) -> Result<Message, DeliveryError> {
        let to: Mailbox = address
            .parse()
            .map_err(|_| DeliveryError::InvalidAddress(address.to_string()))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .map_err(|e| DeliveryError::Other(e.to_string()))
    }
}

#[async_trait]
impl Notifier for SmtpEmailNotifier {
    async fn send(&self, address: &str, message: &NotificationMessage) -> Result<(), DeliveryError> {
        let email = self.build_message(address, message)?;
        self.transport.send(email).await?;

        debug!(to = %address, "Email accepted by SMTP relay");
        Ok(())
    }

    fn provider_name(&self) -> &str {
        "smtp"
    }
}
