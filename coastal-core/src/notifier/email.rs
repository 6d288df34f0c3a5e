use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use super::{NotificationMessage, Notifier};
use crate::config::NotifierConfig;
use crate::error::DeliveryError;

/// E-mail delivery through an HTTP mail API (bearer-token JSON POST).
pub struct HttpEmailNotifier {
    client: Client,
    api_url: String,
    api_key: String,
    from: String,
}

#[derive(Debug, Serialize)]
struct MailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl HttpEmailNotifier {
    pub fn new(api_url: String, api_key: String, from: String) -> Self {
        Self {
            client: Client::new(),
            api_url,
            api_key,
            from,
        }
    }

    pub fn from_config(config: &NotifierConfig) -> Option<Self> {
        match (&config.email_api_url, &config.email_api_key, &config.email_from) {
            (Some(url), Some(key), Some(from)) => {
                Some(Self::new(url.clone(), key.clone(), from.clone()))
            }
            _ => None,
        }
    }
}

#[async_trait]
impl Notifier for HttpEmailNotifier {
    async fn send(&self, address: &str, message: &NotificationMessage) -> Result<(), DeliveryError> {
        if !address.contains('@') {
            return Err(DeliveryError::InvalidAddress(address.to_string()));
        }

        let request = MailRequest {
            from: &self.from,
            to: address,
            subject: &message.subject,
            text: &message.body,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(to = %address, status = status.as_u16(), "Mail API rejected message");
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(to = %address, "Email accepted by mail API");
        Ok(())
    }

    fn provider_name(&self) -> &str {
        "http-mail"
    }
}
