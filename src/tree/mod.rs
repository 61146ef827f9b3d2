//! Upstream propagation: the root-ward walk that re-evaluates
//! ancestor rules for every point write and repairs orphaned devices.
//! Never walks in-memory parent/child pointers —
//! every hop re-queries the store.

use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use crate::bus::Bus;
use crate::model::{point_types, NodeType, Point, ROOT_NODE_ID};
use crate::rule::RuleEngine;
use crate::store::{NodeStore, StoreResult};

/// Database-sink forwarding ("For each database-sink
/// node descendant of N, forward points to the sink"). The sink itself —
/// time-series export to an external analytics store — is out of this
/// CORE's scope; this trait is the interface the core presents
/// to it.
#[async_trait::async_trait]
pub trait DbSink: Send + Sync {
    async fn forward(&self, sink_node_id: Uuid, source_node_id: Uuid, points: &[Point]);
}

/// Default sink: logs what it would forward. Mirrors
/// [`crate::notify::LoggingGateway`]'s role for the other out-of-scope
/// outbound collaborator.
#[derive(Default)]
pub struct LoggingDbSink;

#[async_trait::async_trait]
impl DbSink for LoggingDbSink {
    async fn forward(&self, sink_node_id: Uuid, source_node_id: Uuid, points: &[Point]) {
        tracing::debug!(
            sink = %sink_node_id,
            source = %source_node_id,
            count = points.len(),
            "would forward points to db sink"
        );
    }
}

/// Walk upward from `current_node_id` (initially the node that was just
/// written) toward the root, invoking the rule engine and db-sink
/// forwarding at every ancestor.
///
/// `source_node_id` is the node the points actually landed on; it stays
/// fixed across the whole walk while `current_node_id` advances toward
/// the root.
pub async fn propagate_upstream(
    store: &Arc<dyn NodeStore>,
    bus: &Arc<dyn Bus>,
    rule_engine: &RuleEngine,
    db_sink: &Arc<dyn DbSink>,
    source_node_id: Uuid,
    points: &[Point],
    now: i64,
) -> StoreResult<()> {
    let mut visited = HashSet::new();
    let mut current = source_node_id;

    loop {
        if !visited.insert(current) {
            break;
        }

        rule_engine
            .evaluate_children_of(current, now)
            .await
            .map_err(|e| crate::store::StoreError::Io(e.to_string()))?;

        for sink in store
            .descendants(current, Some(NodeType::Db.as_str()), false, false)
            .await?
        {
            db_sink.forward(sink.id, source_node_id, points).await;
        }

        if current == source_node_id {
            repair_orphan_if_device(store, bus, current).await?;
        }

        match store.primary_parent(current).await? {
            Some(parent) => current = parent,
            None => break,
        }
    }

    Ok(())
}

/// When the traversal's cursor is back at the source node and it's a
/// `device` with every parent edge tombstoned, restore its most recent
/// (tombstoned) parent, or attach it to root if it never had one.
/// Applied only here, during upstream propagation reaching the source,
/// not on direct edge-point writes.
async fn repair_orphan_if_device(
    store: &Arc<dyn NodeStore>,
    _bus: &Arc<dyn Bus>,
    node_id: Uuid,
) -> StoreResult<()> {
    let node = store.node(node_id).await?;
    if node.node_type != NodeType::Device {
        return Ok(());
    }

    let live_parents = store.edges_up(node_id, false).await?;
    if !live_parents.is_empty() {
        return Ok(());
    }

    let all_parents = store.edges_up(node_id, true).await?;
    let restore_to = all_parents
        .iter()
        .max_by_key(|(_, edge)| {
            edge.points
                .get(&(point_types::TOMBSTONE.to_string(), String::new()))
                .map(|p| p.time)
                .unwrap_or(i64::MIN)
        })
        .map(|(parent_id, _)| *parent_id);

    let restore_to = restore_to.unwrap_or(ROOT_NODE_ID);

    let now = chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or(0);
    store
        .merge_edge_points(
            node_id,
            restore_to,
            vec![Point::new(point_types::TOMBSTONE, "", now).with_value(0.0)],
        )
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::InProcessBus;
    use crate::store::{KvNodeStore, MemoryKv};
    use proptest::prelude::*;

    fn rt() -> tokio::runtime::Runtime {
        tokio::runtime::Runtime::new().unwrap()
    }

    proptest! {
        /// A chain of parent edges of any length always terminates the
        /// upstream walk — the visited-set cycle guard never lets the
        /// traversal spin ("traversals carry a
        /// visited set").
        #[test]
        fn propagate_upstream_always_terminates(len in 1usize..12) {
            rt().block_on(async {
                let store: Arc<dyn NodeStore> = Arc::new(KvNodeStore::new(Arc::new(MemoryKv::new())));
                let bus: Arc<dyn Bus> = Arc::new(InProcessBus::new());
                let db_sink: Arc<dyn DbSink> = Arc::new(LoggingDbSink::default());
                let rule_engine = RuleEngine::new(store.clone(), bus.clone());

                let nodes: Vec<Uuid> = (0..len).map(|_| Uuid::new_v4()).collect();
                for (i, id) in nodes.iter().enumerate() {
                    store
                        .merge_points(*id, vec![Point::new(point_types::VALUE, "", 1).with_value(i as f64)])
                        .await
                        .unwrap();
                }
                for w in nodes.windows(2) {
                    let (parent, child) = (w[0], w[1]);
                    store.merge_edge_points(child, parent, vec![]).await.unwrap();
                }

                let leaf = *nodes.last().unwrap();
                let points = vec![Point::new(point_types::VALUE, "", 2).with_value(1.0)];
                let result = propagate_upstream(&store, &bus, &rule_engine, &db_sink, leaf, &points, 2).await;
                prop_assert!(result.is_ok());
                Ok(())
            })?;
        }
    }
}
