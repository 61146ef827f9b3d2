//! The in-process [`Bus`] implementation: one unbounded mpsc queue per
//! subscription, drained by a dedicated background task, giving
//! `.`-delimited multi-segment subject matching plus request/reply on top
//! of plain publish/subscribe.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, warn};

use super::subject::matches;
use super::{Bus, BusError, BusResult, Handler};

/// One delivery queued for a subscription: the subject it was published
/// on, the payload, and (for `request`) a channel to carry the reply back.
struct Envelope {
    subject: String,
    payload: Vec<u8>,
    reply: Option<oneshot::Sender<Vec<u8>>>,
}

struct Subscription {
    pattern: String,
    sender: mpsc::UnboundedSender<Envelope>,
}

/// Tokio-channel-backed bus. Each subscription owns one unbounded queue
/// drained by a single background task, so deliveries to that subscriber
/// happen in publication order.
#[derive(Default)]
pub struct InProcessBus {
    subscriptions: RwLock<Vec<Subscription>>,
}

impl InProcessBus {
    pub fn new() -> Self {
        Self::default()
    }

    async fn matching(&self, subject: &str) -> Vec<mpsc::UnboundedSender<Envelope>> {
        self.subscriptions
            .read()
            .await
            .iter()
            .filter(|s| matches(subject, &s.pattern))
            .map(|s| s.sender.clone())
            .collect()
    }
}

#[async_trait]
impl Bus for InProcessBus {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> BusResult<()> {
        let targets = self.matching(subject).await;
        for sender in targets {
            let envelope = Envelope {
                subject: subject.to_string(),
                payload: payload.clone(),
                reply: None,
            };
            if sender.send(envelope).is_err() {
                debug!(subject, "dropped publish: subscriber queue closed");
            }
        }
        Ok(())
    }

    async fn request(
        &self,
        subject: &str,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> BusResult<Vec<u8>> {
        let targets = self.matching(subject).await;
        let sender = targets
            .into_iter()
            .next()
            .ok_or_else(|| BusError::NoSubscriber(subject.to_string()))?;

        let (tx, rx) = oneshot::channel();
        let envelope = Envelope {
            subject: subject.to_string(),
            payload,
            reply: Some(tx),
        };
        sender.send(envelope).map_err(|_| BusError::Closed)?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(BusError::Closed),
            Err(_) => Err(BusError::Timeout),
        }
    }

    async fn subscribe(&self, pattern: &str, handler: Arc<dyn Handler>) -> BusResult<()> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Envelope>();

        tokio::spawn(async move {
            while let Some(envelope) = receiver.recv().await {
                let reply = handler.handle(envelope.subject, envelope.payload).await;
                if let Some(tx) = envelope.reply {
                    if tx.send(reply).is_err() {
                        warn!("request reply dropped: caller stopped waiting");
                    }
                }
            }
        });

        self.subscriptions.write().await.push(Subscription {
            pattern: pattern.to_string(),
            sender,
        });
        Ok(())
    }
}
