//! Notification fan-out: user discovery and message-service
//! discovery via the same dual-direction tree walk, then outbound
//! delivery.

pub mod fanout;
pub mod gateway;

use uuid::Uuid;

pub use gateway::{LoggingGateway, NotificationGateway};

/// A user-directed notification, published on `node.<id>.not` as the
/// wire type `Notification`.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub source_node_id: Uuid,
    pub subject: String,
    pub body: String,
}

/// A rendered message addressed to one user, published on
/// `node.<userID>.msg` (`Message`).
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: Uuid,
    pub user_id: Uuid,
    pub parent_id: Uuid,
    pub notification_id: Uuid,
    pub email: String,
    pub phone: String,
    pub subject: String,
    pub body: String,
}
