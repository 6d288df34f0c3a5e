use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use super::{NotificationMessage, Notifier};
use crate::config::NotifierConfig;
use crate::error::DeliveryError;

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// SMS delivery through the Twilio Messages API.
pub struct TwilioSmsNotifier {
    client: Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

impl TwilioSmsNotifier {
    pub fn new(account_sid: String, auth_token: String, from_number: String) -> Self {
        Self {
            client: Client::new(),
            base_url: TWILIO_API_BASE.to_string(),
            account_sid,
            auth_token,
            from_number,
        }
    }

    /// `None` unless SID, token and sender number are all configured.
    pub fn from_config(config: &NotifierConfig) -> Option<Self> {
        match (
            &config.twilio_account_sid,
            &config.twilio_auth_token,
            &config.twilio_from_number,
        ) {
            (Some(sid), Some(token), Some(from)) => {
                Some(Self::new(sid.clone(), token.clone(), from.clone()))
            }
            _ => None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/Accounts/{}/Messages.json",
            self.base_url.trim_end_matches('/'),
            self.account_sid
        )
    }
}

#[async_trait]
impl Notifier for TwilioSmsNotifier {
    async fn send(&self, address: &str, message: &NotificationMessage) -> Result<(), DeliveryError> {
        let params = [
            ("To", address),
            ("From", self.from_number.as_str()),
            ("Body", message.body.as_str()),
        ];

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(to = %address, status = status.as_u16(), "Twilio rejected SMS");
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(to = %address, "SMS accepted by Twilio");
        Ok(())
    }

    fn provider_name(&self) -> &str {
        "twilio"
    }
}
