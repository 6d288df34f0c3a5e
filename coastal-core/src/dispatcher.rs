// Notification fan-out: one task per (contact, channel), all joined before returning.

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::error::DeliveryError;
use crate::model::{Channel, Contact, DeliveryStatus, DispatchOutcome};
use crate::notifier::{NotificationMessage, Notifier, NotifierSet};

/// Aggregate of one fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSummary {
    pub outcomes: Vec<DispatchOutcome>,
    /// Distinct contacts with at least one delivered channel.
    pub contacts_notified: i64,
    /// Delivered (contact, channel) attempts.
    pub notifications_sent: i64,
    pub failed_attempts: i64,
}

impl DispatchSummary {
    fn from_outcomes(mut outcomes: Vec<DispatchOutcome>, lost_tasks: i64) -> Self {
        outcomes.sort_by_key(|o| (o.contact_id, o.channel == Channel::Email));

        let delivered: Vec<&DispatchOutcome> = outcomes.iter().filter(|o| o.is_delivered()).collect();
        let contacts: HashSet<i64> = delivered.iter().map(|o| o.contact_id).collect();
        let notifications_sent = delivered.len() as i64;
        let failed_attempts = (outcomes.len() - delivered.len()) as i64 + lost_tasks;

        Self {
            contacts_notified: contacts.len() as i64,
            notifications_sent,
            failed_attempts,
            outcomes,
        }
    }
}

/// Best-effort, concurrent delivery of one message to many contacts.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    notifiers: NotifierSet,
    send_timeout: Duration,
}

impl Dispatcher {
    pub fn new(notifiers: NotifierSet, send_timeout: Duration) -> Self {
        Self {
            notifiers,
            send_timeout,
        }
    }

    /// Send `message` to every contact on every channel it has an address
    /// for. Individual failures, timeouts and panics are recorded as failed
    /// outcomes; this never returns an error. All attempts have finished when
    /// it returns.
    pub async fn dispatch(&self, contacts: &[Contact], message: &NotificationMessage) -> DispatchSummary {
        let message = Arc::new(message.clone());
        let mut tasks = JoinSet::new();

        for contact in contacts {
            for (channel, address) in contact.channels() {
                let notifier = self.notifiers.for_channel(channel);
                let message = Arc::clone(&message);
                let address = address.to_string();
                let contact_id = contact.id;
                let send_timeout = self.send_timeout;

                tasks.spawn(async move {
                    let status = attempt(notifier, &address, &message, send_timeout).await;
                    if let DeliveryStatus::Failed(ref reason) = status {
                        warn!(contact_id, %channel, "Notification failed: {}", reason);
                    } else {
                        debug!(contact_id, %channel, "Notification delivered");
                    }
                    DispatchOutcome {
                        contact_id,
                        channel,
                        status,
                    }
                });
            }
        }

        let mut outcomes = Vec::with_capacity(tasks.len());
        let mut lost_tasks = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    error!("Notification task did not complete: {}", e);
                    lost_tasks += 1;
                }
            }
        }

        let summary = DispatchSummary::from_outcomes(outcomes, lost_tasks);
        info!(
            contacts = contacts.len(),
            contacts_notified = summary.contacts_notified,
            notifications_sent = summary.notifications_sent,
            failed = summary.failed_attempts,
            "Dispatch complete"
        );
        summary
    }
}

async fn attempt(
    notifier: Arc<dyn Notifier>,
    address: &str,
    message: &NotificationMessage,
    send_timeout: Duration,
) -> DeliveryStatus {
    let send = AssertUnwindSafe(notifier.send(address, message)).catch_unwind();

    match timeout(send_timeout, send).await {
        Ok(Ok(Ok(()))) => DeliveryStatus::Delivered,
        Ok(Ok(Err(e))) => DeliveryStatus::Failed(e.to_string()),
        Ok(Err(_panic)) => DeliveryStatus::Failed(format!(
            "{} notifier panicked",
            notifier.provider_name()
        )),
        Err(_) => DeliveryStatus::Failed(
            DeliveryError::Timeout(send_timeout.as_millis() as u64).to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingNotifier {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingNotifier {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl Notifier for CountingNotifier {
        async fn send(&self, _address: &str, _message: &NotificationMessage) -> Result<(), DeliveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(DeliveryError::Other("provider down".to_string()))
            } else {
                Ok(())
            }
        }

        fn provider_name(&self) -> &str {
            "counting"
        }
    }

    struct SlowNotifier;

    #[async_trait]
    impl Notifier for SlowNotifier {
        async fn send(&self, _address: &str, _message: &NotificationMessage) -> Result<(), DeliveryError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }

        fn provider_name(&self) -> &str {
            "slow"
        }
    }

    struct PanickingNotifier;

    #[async_trait]
    impl Notifier for PanickingNotifier {
        async fn send(&self, _address: &str, _message: &NotificationMessage) -> Result<(), DeliveryError> {
            panic!("provider bug");
        }

        fn provider_name(&self) -> &str {
            "panicking"
        }
    }

    fn contact(id: i64, phone: Option<&str>, email: Option<&str>) -> Contact {
        Contact {
            id,
            name: format!("Contact {}", id),
            phone: phone.map(String::from),
            email: email.map(String::from),
            region: "Kerala".to_string(),
        }
    }

    fn message() -> NotificationMessage {
        NotificationMessage {
            subject: "[HIGH] Coastal Threat Alert - Water Level".to_string(),
            body: "COASTAL THREAT ALERT [HIGH]".to_string(),
        }
    }

    #[tokio::test]
    async fn test_one_attempt_per_available_channel() {
        let sms = CountingNotifier::new(false);
        let email = CountingNotifier::new(false);
        let dispatcher = Dispatcher::new(
            NotifierSet::new(sms.clone(), email.clone()),
            Duration::from_secs(5),
        );

        let contacts = vec![
            contact(1, Some("+910000000001"), None),
            contact(2, Some("+910000000002"), Some("two@example.org")),
        ];
        let summary = dispatcher.dispatch(&contacts, &message()).await;

        assert_eq!(sms.calls.load(Ordering::SeqCst), 2);
        assert_eq!(email.calls.load(Ordering::SeqCst), 1);
        assert_eq!(summary.notifications_sent, 3);
        assert_eq!(summary.contacts_notified, 2);
        assert_eq!(summary.failed_attempts, 0);
        assert_eq!(summary.outcomes.len(), 3);
    }

    #[tokio::test]
    async fn test_channel_failure_does_not_block_others() {
        let dispatcher = Dispatcher::new(
            NotifierSet::new(CountingNotifier::new(false), CountingNotifier::new(true)),
            Duration::from_secs(5),
        );

        let contacts = vec![
            contact(1, None, Some("one@example.org")),
            contact(2, Some("+910000000002"), Some("two@example.org")),
        ];
        let summary = dispatcher.dispatch(&contacts, &message()).await;

        assert_eq!(summary.notifications_sent, 1);
        assert_eq!(summary.contacts_notified, 1);
        assert_eq!(summary.failed_attempts, 2);
        assert!(summary.notifications_sent <= 2 * summary.contacts_notified);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let dispatcher = Dispatcher::new(
            NotifierSet::new(Arc::new(SlowNotifier), CountingNotifier::new(false)),
            Duration::from_millis(50),
        );

        let contacts = vec![contact(1, Some("+910000000001"), Some("one@example.org"))];
        let summary = dispatcher.dispatch(&contacts, &message()).await;

        assert_eq!(summary.notifications_sent, 1);
        assert_eq!(summary.contacts_notified, 1);
        let sms = summary
            .outcomes
            .iter()
            .find(|o| o.channel == Channel::Sms)
            .unwrap();
        assert_eq!(
            sms.status,
            DeliveryStatus::Failed("Timed out after 50 ms".to_string())
        );
    }

    #[tokio::test]
    async fn test_panicking_notifier_is_contained() {
        let dispatcher = Dispatcher::new(
            NotifierSet::new(Arc::new(PanickingNotifier), CountingNotifier::new(false)),
            Duration::from_secs(5),
        );

        let contacts = vec![
            contact(1, Some("+910000000001"), None),
            contact(2, None, Some("two@example.org")),
        ];
        let summary = dispatcher.dispatch(&contacts, &message()).await;

        assert_eq!(summary.notifications_sent, 1);
        assert_eq!(summary.contacts_notified, 1);
        assert_eq!(summary.failed_attempts, 1);
    }

    #[tokio::test]
    async fn test_no_contacts_means_no_attempts() {
        let dispatcher = Dispatcher::new(NotifierSet::demo(), Duration::from_secs(5));
        let summary = dispatcher.dispatch(&[], &message()).await;
        assert_eq!(summary, DispatchSummary::default());
    }

    #[tokio::test]
    async fn test_outcomes_are_ordered_by_contact_then_channel() {
        let dispatcher = Dispatcher::new(NotifierSet::demo(), Duration::from_secs(5));
        let contacts = vec![
            contact(9, Some("+910000000009"), Some("nine@example.org")),
            contact(3, Some("+910000000003"), None),
        ];
        let summary = dispatcher.dispatch(&contacts, &message()).await;
        let order: Vec<(i64, Channel)> = summary
            .outcomes
            .iter()
            .map(|o| (o.contact_id, o.channel))
            .collect();
        assert_eq!(
            order,
            vec![(3, Channel::Sms), (9, Channel::Sms), (9, Channel::Email)]
        );
    }
}
