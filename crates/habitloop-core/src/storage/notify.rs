use async_trait::async_trait;

use super::Notifier;
use crate::error::Result;
use crate::events::PushNotification;

/// Notifier that only records deliveries in the log.
///
/// Used by the CLI and in deployments where push delivery is wired up
/// elsewhere.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn broadcast(&self, notification: &PushNotification) -> Result<()> {
        tracing::info!(
            challenge_id = %notification.challenge_id,
            recipients = notification.recipients.len(),
            title = %notification.title,
            "push notification"
        );
        Ok(())
    }
}
