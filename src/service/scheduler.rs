//! Schedule sweeper: runs every few seconds (configurable), iterates
//! root-descended rule and group nodes, and invokes the rule engine with
//! a synthetic `trigger` point so time-windowed conditions advance even
//! in the absence of external input. Runs as its own periodic task,
//! checking a stop channel on each iteration for graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::bus::Bus;
use crate::model::{point_types, NodeType, Point, ROOT_NODE_ID};
use crate::rule::RuleEngine;
use crate::store::{NodeStore, StoreResult};
use crate::tree::{self, DbSink};

/// Spawns the sweeper as a background task. Returns the task handle and a
/// sender that stops the loop when sent `true` (or dropped).
pub fn spawn(
    store: Arc<dyn NodeStore>,
    bus: Arc<dyn Bus>,
    rule_engine: Arc<RuleEngine>,
    db_sink: Arc<dyn DbSink>,
    tick: Duration,
) -> (JoinHandle<()>, watch::Sender<bool>) {
    let (stop_tx, mut stop_rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = sweep_once(&store, &bus, &rule_engine, &db_sink).await {
                        tracing::warn!(error = %e, "schedule sweep failed");
                    }
                }
                _ = stop_rx.changed() => {
                    if *stop_rx.borrow() {
                        break;
                    }
                }
            }
        }
    });

    (handle, stop_tx)
}

/// One sweep: find every `rule`- or `group`-typed node reachable from the
/// root, stamp a synthetic `trigger` point on it, and walk upstream from
/// it exactly as a real point write would — this both
/// re-evaluates a group's direct rule children and, for a rule node
/// itself, re-evaluates the rule via its parent's context on the way up,
/// so hysteresis-bearing conditions (`minActive`) advance even without
/// external input.
async fn sweep_once(
    store: &Arc<dyn NodeStore>,
    bus: &Arc<dyn Bus>,
    rule_engine: &RuleEngine,
    db_sink: &Arc<dyn DbSink>,
) -> StoreResult<()> {
    let now = now_nanos();
    let candidates = store.descendants(ROOT_NODE_ID, None, true, false).await?;

    for node in candidates {
        if !matches!(node.node_type, NodeType::Rule | NodeType::Group) {
            continue;
        }
        let trigger = vec![Point::new(point_types::TRIGGER, "", now)];
        store.merge_points(node.id, trigger.clone()).await?;
        tree::propagate_upstream(store, bus, rule_engine, db_sink, node.id, &trigger, now).await?;
    }

    Ok(())
}

fn now_nanos() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::InProcessBus;
    use crate::store::{KvNodeStore, MemoryKv};
    use crate::tree::LoggingDbSink;
    use uuid::Uuid;

    #[tokio::test]
    async fn sweep_advances_hysteresis_without_external_input() {
        let store: Arc<dyn NodeStore> = Arc::new(KvNodeStore::new(Arc::new(MemoryKv::new())));
        let bus: Arc<dyn Bus> = Arc::new(InProcessBus::new());
        let db_sink: Arc<dyn DbSink> = Arc::new(LoggingDbSink::default());
        let rule_engine = Arc::new(RuleEngine::new(store.clone(), bus.clone()));

        let device = Uuid::new_v4();
        let rule = Uuid::new_v4();
        let condition = Uuid::new_v4();

        store
            .merge_points(device, vec![Point::new(point_types::VALUE, "", 1).with_value(15.0)])
            .await
            .unwrap();
        store
            .merge_points(rule, vec![Point::new(point_types::NODE_TYPE, "", 1).with_text("rule")])
            .await
            .unwrap();
        store.merge_edge_points(device, ROOT_NODE_ID, vec![]).await.unwrap();
        store.merge_edge_points(rule, device, vec![]).await.unwrap();

        store
            .merge_points(
                condition,
                vec![
                    Point::new(point_types::NODE_TYPE, "", 1).with_text("condition"),
                    Point::new("pointType", "", 1).with_text(point_types::VALUE),
                    Point::new("valueType", "", 1).with_text("number"),
                    Point::new("operator", "", 1).with_text(">"),
                    Point::new("valueNumber", "", 1).with_value(10.0),
                    Point::new("minActive", "", 1).with_value(0.02),
                ],
            )
            .await
            .unwrap();
        store.merge_edge_points(condition, rule, vec![]).await.unwrap();

        let (_handle, stop) = spawn(
            store.clone(),
            bus.clone(),
            rule_engine.clone(),
            db_sink.clone(),
            Duration::from_millis(5),
        );

        tokio::time::sleep(Duration::from_millis(150)).await;
        let _ = stop.send(true);

        let cond = store.node(condition).await.unwrap();
        assert_eq!(cond.value(point_types::ACTIVE, ""), Some(1.0));
    }
}
