//! Abstract ordered KV store: the core treats persistence as
//! an opaque key→value store offering snapshots, sorted iteration, and
//! atomic batches. [`SledKv`] and [`MemoryKv`] are the two implementations.

use super::StoreResult;

/// One operation inside an atomic [`Kv::apply_batch`] call.
#[derive(Debug, Clone)]
pub enum KvOp {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

/// An embedded, ordered key-value store.
///
/// Implementations: [`super::sled_kv::SledKv`] (persistent, production),
/// [`super::memory_kv::MemoryKv`] (in-memory, for tests).
pub trait Kv: Send + Sync {
    /// Point lookup.
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    /// Sorted iteration over every key beginning with `prefix`; the
    /// breadth-first descendant walk relies on ordered prefix scans like
    /// this one.
    fn scan_prefix(&self, prefix: &[u8]) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Apply every operation in `ops` atomically: either all are visible to
    /// subsequent reads, or none are.
    fn apply_batch(&self, ops: Vec<KvOp>) -> StoreResult<()>;
}

#[cfg(test)]
pub(crate) fn assert_kv_contract(kv: &dyn Kv) {
    kv.apply_batch(vec![
        KvOp::Put(b"a/1".to_vec(), b"one".to_vec()),
        KvOp::Put(b"a/2".to_vec(), b"two".to_vec()),
        KvOp::Put(b"b/1".to_vec(), b"other".to_vec()),
    ])
    .unwrap();

    assert_eq!(kv.get(b"a/1").unwrap(), Some(b"one".to_vec()));
    assert_eq!(kv.get(b"missing").unwrap(), None);

    let scanned = kv.scan_prefix(b"a/").unwrap();
    assert_eq!(
        scanned,
        vec![
            (b"a/1".to_vec(), b"one".to_vec()),
            (b"a/2".to_vec(), b"two".to_vec()),
        ]
    );

    kv.apply_batch(vec![KvOp::Delete(b"a/1".to_vec())]).unwrap();
    assert_eq!(kv.get(b"a/1").unwrap(), None);
}
