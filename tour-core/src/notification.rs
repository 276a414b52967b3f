use async_trait::async_trait;
use tour_shared::models::events::Notification;

pub use tour_shared::models::events::NotificationKind;

/// Delivery backend for booking notifications (mail relay, push, broker topic).
/// Called from the background dispatcher only; an error here is logged and dropped.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(
        &self,
        notification: &Notification,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Sink that only writes the notification to the trace log. Used when no broker is configured.
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn deliver(
        &self,
        notification: &Notification,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::info!(
            kind = ?notification.kind,
            subscription_id = %notification.subscription_id,
            client_id = %notification.client_id,
            "Notification for '{}' delivered to log sink",
            notification.excursion_title
        );
        Ok(())
    }
}
