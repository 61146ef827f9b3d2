//! In-process subject-addressed message bus: the only
//! integration seam between producers, the store service, the rule
//! engine, and notification fan-out.
//!
//! This module contains:
//! - [`Subject`]: `.`-delimited subject strings with single-segment `*` matching
//! - [`Bus`] trait: publish/request/subscribe
//! - [`InProcessBus`]: the one production implementation
//! - [`MockBus`]: a publish recorder for unit tests

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

mod in_process;
mod mock;
mod subject;

pub use in_process::InProcessBus;
pub use mock::MockBus;
pub use subject::Subject;

/// Result type for bus operations.
pub type BusResult<T> = std::result::Result<T, BusError>;

/// Errors surfaced by the bus: a timed-out request plus bus-local
/// delivery failures.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("request timed out")]
    Timeout,

    #[error("no subscriber for subject {0}")]
    NoSubscriber(String),

    #[error("bus closed")]
    Closed,
}

/// A boxed future returning a reply payload.
pub type ReplyFuture = Pin<Box<dyn Future<Output = Vec<u8>> + Send>>;

/// A subject handler. Returns the reply payload: empty for ACK, non-empty
/// for a human-readable error string ("Error-reply convention").
/// `Bus::publish` ignores the return value; `Bus::request` returns it to
/// the caller.
pub trait Handler: Send + Sync {
    fn handle(&self, subject: String, payload: Vec<u8>) -> ReplyFuture;
}

/// Subject-addressed request/reply + publish broker.
#[async_trait]
pub trait Bus: Send + Sync {
    /// Fire-and-forget publish; does not wait for any subscriber.
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> BusResult<()>;

    /// Publish and await exactly one subscriber's reply, bounded by
    /// `timeout` ("All request/reply calls accept an explicit
    /// timeout").
    async fn request(&self, subject: &str, payload: Vec<u8>, timeout: Duration) -> BusResult<Vec<u8>>;

    /// Register a handler for every subject matching `pattern`; `*`
    /// matches exactly one `.`-delimited segment.
    async fn subscribe(
        &self,
        pattern: &str,
        handler: std::sync::Arc<dyn Handler>,
    ) -> BusResult<()>;
}

/// Subject constants, as patterns for
/// [`Bus::subscribe`].
pub mod subjects {
    pub const NODE_POINTS: &str = "node.*.points";
    pub const EDGE_POINTS: &str = "node.*.*.points";
    pub const NODE_READ: &str = "node.*";
    pub const NODE_CHILDREN: &str = "node.*.children";
    pub const NODE_NOT: &str = "node.*.not";
    pub const NODE_MSG: &str = "node.*.msg";
    pub const AUTH_USER: &str = "auth.user";

    pub fn node_points(id: &str) -> String {
        format!("node.{id}.points")
    }

    pub fn edge_points(parent: &str, child: &str) -> String {
        format!("node.{parent}.{child}.points")
    }

    pub fn node_read(id: &str) -> String {
        format!("node.{id}")
    }

    pub fn node_children(id: &str) -> String {
        format!("node.{id}.children")
    }

    pub fn node_not(id: &str) -> String {
        format!("node.{id}.not")
    }

    pub fn node_msg(id: &str) -> String {
        format!("node.{id}.msg")
    }
}
