use std::sync::Arc;

use protocol::ClipboardUpdate;
use tokio::sync::broadcast;

/// Default number of updates a slow subscriber may fall behind by.
pub const DEFAULT_CAPACITY: usize = 64;

/// Fan-out of clipboard changes to every connected client.
#[derive(Clone)]
pub struct ClipboardBroadcaster {
    sender: Arc<broadcast::Sender<ClipboardUpdate>>,
}

impl ClipboardBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClipboardUpdate> {
        self.sender.subscribe()
    }

    pub fn publish(&self, update: ClipboardUpdate) {
        // Ignore errors when there are no active subscribers
        let _ = self.sender.send(update);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ClipboardBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_all_subscribers() {
        let broadcaster = ClipboardBroadcaster::new(8);
        let mut first = broadcaster.subscribe();
        let mut second = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 2);

        broadcaster.publish(ClipboardUpdate::new("hello"));

        assert_eq!(first.recv().await.unwrap().text, "hello");
        assert_eq!(second.recv().await.unwrap().text, "hello");
    }

    #[test]
    fn test_publish_without_subscribers() {
        let broadcaster = ClipboardBroadcaster::default();
        broadcaster.publish(ClipboardUpdate::new("nobody listening"));
        assert_eq!(broadcaster.subscriber_count(), 0);
    }
}
