//! Persistent [`Kv`] backend over `sled`, the embedded ordered KV store
//! grounded in the retrieval pack (see DESIGN.md). `sled::Tree` already
//! provides sorted iteration and `sled::Batch` already provides atomic
//! multi-key writes, so this is a thin adapter.

use super::kv::{Kv, KvOp};
use super::{StoreError, StoreResult};

pub struct SledKv {
    db: sled::Db,
}

impl SledKv {
    pub fn open(path: impl AsRef<std::path::Path>) -> StoreResult<Self> {
        let db = sled::open(path).map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(Self { db })
    }

    #[cfg(test)]
    pub fn temporary() -> StoreResult<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(Self { db })
    }
}

impl Kv for SledKv {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        self.db
            .get(key)
            .map(|opt| opt.map(|ivec| ivec.to_vec()))
            .map_err(|e| StoreError::Io(e.to_string()))
    }

    fn scan_prefix(&self, prefix: &[u8]) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        self.db
            .scan_prefix(prefix)
            .map(|res| {
                res.map(|(k, v)| (k.to_vec(), v.to_vec()))
                    .map_err(|e| StoreError::Io(e.to_string()))
            })
            .collect()
    }

    fn apply_batch(&self, ops: Vec<KvOp>) -> StoreResult<()> {
        let mut batch = sled::Batch::default();
        for op in ops {
            match op {
                KvOp::Put(k, v) => batch.insert(k, v),
                KvOp::Delete(k) => batch.remove(k),
            }
        }
        self.db
            .apply_batch(batch)
            .map_err(|e| StoreError::Io(e.to_string()))?;
        // sled flushes lazily in the background; only atomicity of the
        // batch is required here, not durability-on-return, so no explicit
        // flush here.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::kv::assert_kv_contract;
    use super::*;

    #[test]
    fn sled_kv_satisfies_contract() {
        assert_kv_contract(&SledKv::temporary().unwrap());
    }
}
