//! In-memory [`Kv`] backend for tests: a `RwLock`-guarded sorted map
//! standing in for [`super::sled_kv::SledKv`].

use std::collections::BTreeMap;
use std::sync::RwLock;

use super::kv::{Kv, KvOp};
use super::StoreResult;

#[derive(Default)]
pub struct MemoryKv {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Kv for MemoryKv {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.data.read().unwrap().get(key).cloned())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let data = self.data.read().unwrap();
        Ok(data
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn apply_batch(&self, ops: Vec<KvOp>) -> StoreResult<()> {
        let mut data = self.data.write().unwrap();
        for op in ops {
            match op {
                KvOp::Put(k, v) => {
                    data.insert(k, v);
                }
                KvOp::Delete(k) => {
                    data.remove(&k);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::kv::assert_kv_contract;
    use super::*;

    #[test]
    fn memory_kv_satisfies_contract() {
        assert_kv_contract(&MemoryKv::new());
    }
}
