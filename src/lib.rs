//! Simple IoT core: the node/point data model, the message-bus-backed
//! store, the rule engine, and the notification fan-out that together
//! make up a single-process IoT fleet runtime.
//!
//! Module layout mirrors the component breakdown:
//! [`model`] (Point/Edge/Node), [`store`] (the persistent tree),
//! [`bus`] (the in-process pub/sub broker), [`service`] (the store
//! service and schedule sweeper), [`tree`] (upstream propagation),
//! [`rule`] (the rule engine), and [`notify`] (notification fan-out).

pub mod bus;
pub mod config;
pub mod model;
pub mod notify;
pub mod proto;
pub mod proto_ext;
pub mod rule;
pub mod service;
pub mod store;
pub mod tree;
