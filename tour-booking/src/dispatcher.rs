use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tour_catalog::Excursion;
use tour_core::NotificationSink;
use tour_shared::models::events::{Notification, NotificationKind};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::Subscription;

/// Fire-and-forget handle the engine uses to request notifications. Enqueueing never
/// blocks and never fails the booking operation that triggered it.
#[derive(Clone)]
pub struct NotificationQueue {
    tx: mpsc::UnboundedSender<Notification>,
}

impl NotificationQueue {
    /// A queue plus the receiving end, for callers that drive delivery themselves.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn enqueue(&self, notification: Notification) {
        let kind = notification.kind;
        let subscription_id = notification.subscription_id;
        if self.tx.send(notification).is_err() {
            warn!(
                "Notification dispatcher is gone, dropping {:?} for subscription {}",
                kind, subscription_id
            );
        }
    }
}

pub fn notification(
    kind: NotificationKind,
    excursion: &Excursion,
    subscription: &Subscription,
) -> Notification {
    Notification {
        id: Uuid::new_v4(),
        kind,
        subscription_id: subscription.id,
        excursion_id: excursion.id,
        client_id: subscription.client_id,
        excursion_title: excursion.title.clone(),
        departure_at: excursion.departure_at,
        amount_cents: subscription.amount_paid_cents,
        created_at: Utc::now(),
    }
}

/// Spawn the background worker that drains the queue into `sink`.
/// The worker exits once every `NotificationQueue` clone has been dropped.
pub fn spawn_notification_worker(
    sink: Arc<dyn NotificationSink>,
) -> (NotificationQueue, JoinHandle<()>) {
    let (queue, rx) = NotificationQueue::channel();
    let handle = tokio::spawn(run_worker(rx, sink));
    (queue, handle)
}

async fn run_worker(mut rx: mpsc::UnboundedReceiver<Notification>, sink: Arc<dyn NotificationSink>) {
    info!("Notification dispatcher started");

    while let Some(notification) = rx.recv().await {
        if let Err(e) = sink.deliver(&notification).await {
            error!(
                "Failed to deliver {:?} for subscription {}: {}",
                notification.kind, notification.subscription_id, e
            );
        }
    }

    info!("Notification dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink {
        delivered: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl NotificationSink for CountingSink {
        async fn deliver(
            &self,
            _notification: &Notification,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            self.delivered.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err("smtp relay unavailable".into());
            }
            Ok(())
        }
    }

    fn sample(kind: NotificationKind) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            kind,
            subscription_id: Uuid::new_v4(),
            excursion_id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            excursion_title: "Bonito snorkeling".to_string(),
            departure_at: Utc::now(),
            amount_cents: 42_000,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_worker_drains_queue_and_survives_failures() {
        let sink = Arc::new(CountingSink {
            delivered: AtomicUsize::new(0),
            fail: true,
        });
        let (queue, handle) = spawn_notification_worker(sink.clone());

        queue.enqueue(sample(NotificationKind::EnrollmentConfirmation));
        queue.enqueue(sample(NotificationKind::PaymentConfirmation));
        queue.enqueue(sample(NotificationKind::EnrollmentConfirmation));
        drop(queue);

        handle.await.unwrap();
        assert_eq!(sink.delivered.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_enqueue_after_worker_stopped_does_not_panic() {
        let (queue, rx) = NotificationQueue::channel();
        drop(rx);
        queue.enqueue(sample(NotificationKind::PaymentConfirmation));
    }
}
