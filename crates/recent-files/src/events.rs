//! In-process change notifications

use crate::types::DocumentRecord;
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum RecentFilesEvent {
    /// The registry changed; `files` is the full list, most recent first
    RegistryChanged { files: Vec<DocumentRecord> },
    ThumbnailUpdated {
        fingerprint: String,
        thumbnail: String,
    },
    /// A front end should open this document
    OpenRequested { record: DocumentRecord },
}

/// Fire-and-forget fan-out to subscribers, in registration order.
///
/// Subscribers whose receiver was dropped are pruned on the next publish.
#[derive(Default)]
pub struct Notifier {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<RecentFilesEvent>>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<RecentFilesEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(tx);
        rx
    }

    pub fn publish(&self, event: RecentFilesEvent) {
        let mut subscribers = self.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        debug!(subscribers = subscribers.len(), "Published recent files event");
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::UnboundedSender<RecentFilesEvent>>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_subscriber_receives_event() {
        let notifier = Notifier::new();
        let mut first = notifier.subscribe();
        let mut second = notifier.subscribe();

        notifier.publish(RecentFilesEvent::RegistryChanged { files: Vec::new() });

        assert_eq!(
            first.try_recv().unwrap(),
            RecentFilesEvent::RegistryChanged { files: Vec::new() }
        );
        assert!(second.try_recv().is_ok());
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let notifier = Notifier::new();
        let kept = notifier.subscribe();
        drop(notifier.subscribe());

        notifier.publish(RecentFilesEvent::ThumbnailUpdated {
            fingerprint: "fp".to_string(),
            thumbnail: "data:image/jpeg;base64,AAAA".to_string(),
        });

        assert_eq!(notifier.subscriber_count(), 1);
        drop(kept);
    }

    #[test]
    fn test_events_arrive_in_publish_order() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();

        for fingerprint in ["a", "b", "c"] {
            notifier.publish(RecentFilesEvent::ThumbnailUpdated {
                fingerprint: fingerprint.to_string(),
                thumbnail: String::new(),
            });
        }

        let order: Vec<String> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|event| match event {
                RecentFilesEvent::ThumbnailUpdated { fingerprint, .. } => fingerprint,
                other => panic!("unexpected event {:?}", other),
            })
            .collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }
}
