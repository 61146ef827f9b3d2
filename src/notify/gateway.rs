//! Outbound delivery gateway: an external collaborator the core
//! describes only via the interface it presents to it — device-facing
//! transports and other out-of-scope collaborators are reached only
//! through interfaces like this one: a trait plus an inert default
//! implementation standing in for a business service this crate never
//! implements itself.

use async_trait::async_trait;
use tracing::info;

use super::Message;

/// Channel a message-service node can deliver over ("phone ->
/// twilio, email -> smtp").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Phone,
    Email,
}

/// Sends a rendered [`Message`] out of process. Actually dispatching to
/// Twilio/SMTP is out of this CORE's scope; [`LoggingGateway`]
/// is the only implementation this crate ships.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send(&self, channel: Channel, message: &Message);
}

/// Default gateway: logs the message it would have sent. Stands in for
/// the real Twilio/SMTP integrations this crate does not implement.
#[derive(Default)]
pub struct LoggingGateway;

#[async_trait]
impl NotificationGateway for LoggingGateway {
    async fn send(&self, channel: Channel, message: &Message) {
        info!(
            channel = ?channel,
            user_id = %message.user_id,
            subject = %message.subject,
            "would dispatch message"
        );
    }
}
