//! Mock bus for unit tests that need a [`Bus`] collaborator without standing
//! up [`InProcessBus`]'s subscription machinery.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Bus, BusError, BusResult, Handler};

/// Records every `publish`/`request` payload instead of delivering it
/// anywhere. `request` never has a reply to return, so it always fails with
/// [`BusError::NoSubscriber`]; `subscribe` is unsupported, matching the real
/// bus's single in-process fan-out not being reproducible on a recorder.
#[derive(Default)]
pub struct MockBus {
    published: RwLock<Vec<(String, Vec<u8>)>>,
    fail_on_publish: RwLock<bool>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_publish(&self, fail: bool) {
        *self.fail_on_publish.write().await = fail;
    }

    pub async fn published_count(&self) -> usize {
        self.published.read().await.len()
    }

    pub async fn take_published(&self) -> Vec<(String, Vec<u8>)> {
        std::mem::take(&mut *self.published.write().await)
    }
}

#[async_trait]
impl Bus for MockBus {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> BusResult<()> {
        if *self.fail_on_publish.read().await {
            return Err(BusError::Closed);
        }
        self.published.write().await.push((subject.to_string(), payload));
        Ok(())
    }

    async fn request(&self, subject: &str, _payload: Vec<u8>, _timeout: Duration) -> BusResult<Vec<u8>> {
        Err(BusError::NoSubscriber(subject.to_string()))
    }

    async fn subscribe(&self, _pattern: &str, _handler: Arc<dyn Handler>) -> BusResult<()> {
        Err(BusError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_is_recorded() {
        let bus = MockBus::new();
        bus.publish("node.x.points", b"payload".to_vec()).await.unwrap();

        assert_eq!(bus.published_count().await, 1);
        let published = bus.take_published().await;
        assert_eq!(published[0].0, "node.x.points");
        assert_eq!(published[0].1, b"payload".to_vec());
        assert_eq!(bus.published_count().await, 0);
    }

    #[tokio::test]
    async fn publish_can_be_made_to_fail() {
        let bus = MockBus::new();
        bus.set_fail_on_publish(true).await;

        let err = bus.publish("node.x.points", vec![]).await.unwrap_err();
        assert!(matches!(err, BusError::Closed));
        assert_eq!(bus.published_count().await, 0);
    }

    #[tokio::test]
    async fn request_has_no_subscriber() {
        let bus = MockBus::new();
        let err = bus
            .request("node.x", vec![], Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, BusError::NoSubscriber(subject) if subject == "node.x"));
    }

    struct DummyHandler;
    impl Handler for DummyHandler {
        fn handle(&self, _subject: String, _payload: Vec<u8>) -> super::super::ReplyFuture {
            Box::pin(async { Vec::new() })
        }
    }

    #[tokio::test]
    async fn subscribe_is_not_supported() {
        let bus = MockBus::new();
        let err = bus
            .subscribe("node.*.points", Arc::new(DummyHandler))
            .await
            .unwrap_err();
        assert!(matches!(err, BusError::Closed));
    }
}
