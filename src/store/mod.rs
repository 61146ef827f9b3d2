//! Persistent node/point/edge storage.
//!
//! This module contains:
//! - [`Kv`]: the abstract ordered key-value store the CORE treats persistence as
//! - [`NodeStore`] trait: the node/point/edge tree operations built on top of it
//! - [`KvNodeStore`]: the concrete implementation, backed by any [`Kv`]
//! - [`SledKv`] / [`MemoryKv`]: production and test `Kv` backends

use thiserror::Error;

mod keys;
pub mod kv;
pub mod memory_kv;
mod node_store;
pub mod sled_kv;

pub use kv::{Kv, KvOp};
pub use memory_kv::MemoryKv;
pub use node_store::{Descendants, KvNodeStore, NodeStore};
pub use sled_kv::SledKv;

/// Result type for node store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by the node store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("decode error: {0}")]
    Decode(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("edge would close a cycle: {parent} -> {child}")]
    Cycle { parent: String, child: String },

    #[error("store io error: {0}")]
    Io(String),

    #[error("auth failed")]
    Auth,
}
