//! End-to-end scenarios, each wiring a real `InProcessBus` +
//! `SledKv`-backed (in a `tempfile::tempdir()`) `NodeStore` +
//! `StoreService` together rather than mocking the backend.

use std::sync::Arc;
use std::time::Duration;

use prost::Message as _;
use uuid::Uuid;

use simple_iot::bus::{subjects, Bus, InProcessBus};
use simple_iot::model::{point_types, Point};
use simple_iot::proto;
use simple_iot::proto_ext;
use simple_iot::service::StoreService;
use simple_iot::store::{KvNodeStore, NodeStore, SledKv, StoreError};

fn harness() -> (Arc<dyn NodeStore>, Arc<dyn Bus>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let kv = SledKv::open(dir.path()).unwrap();
    let store: Arc<dyn NodeStore> = Arc::new(KvNodeStore::new(Arc::new(kv)));
    let bus: Arc<dyn Bus> = Arc::new(InProcessBus::new());
    (store, bus, dir)
}

fn now_nanos() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap()
}

async fn publish_points(bus: &Arc<dyn Bus>, node: Uuid, points: Vec<Point>) -> Vec<u8> {
    bus.request(
        &subjects::node_points(&node.to_string()),
        proto_ext::encode_points(&points),
        Duration::from_secs(1),
    )
    .await
    .unwrap()
}

async fn read_node(bus: &Arc<dyn Bus>, node: Uuid) -> proto::NodesRequest {
    let reply = bus
        .request(&subjects::node_read(&node.to_string()), b"all".to_vec(), Duration::from_secs(1))
        .await
        .unwrap();
    proto::NodesRequest::decode(reply.as_slice()).unwrap()
}

/// Scenario 1: write-then-read.
#[tokio::test]
async fn write_then_read() {
    let (store, bus, _dir) = harness();
    let service = StoreService::new(store, bus.clone());
    let (_sweeper, stop) = service.run(Duration::from_secs(3600)).await.unwrap();

    let node = Uuid::new_v4();
    let reply = publish_points(
        &bus,
        node,
        vec![Point::new(point_types::VALUE, "", now_nanos()).with_value(3.14)],
    )
    .await;
    assert!(reply.is_empty());

    let response = read_node(&bus, node).await;
    assert_eq!(response.nodes.len(), 1);
    assert_eq!(response.nodes[0].id, node.to_string());
    assert_eq!(response.nodes[0].points[0].value, 3.14);

    let _ = stop.send(true);
}

/// Scenario 2: LWW — an older timestamp never overwrites a newer one,
/// even when it arrives second.
#[tokio::test]
async fn lww_keeps_later_write() {
    let (store, bus, _dir) = harness();
    let service = StoreService::new(store, bus.clone());
    let (_sweeper, stop) = service.run(Duration::from_secs(3600)).await.unwrap();

    let node = Uuid::new_v4();
    let later = now_nanos();
    let earlier = later - 1_000_000_000;

    publish_points(&bus, node, vec![Point::new(point_types::VALUE, "", later).with_value(1.0)]).await;
    publish_points(&bus, node, vec![Point::new(point_types::VALUE, "", earlier).with_value(2.0)]).await;

    let response = read_node(&bus, node).await;
    assert_eq!(response.nodes[0].points[0].value, 1.0);

    let _ = stop.send(true);
}

/// Scenario 3: a simple rule fires exactly once per activation edge and
/// does not re-fire while already active.
#[tokio::test]
async fn simple_rule_fires_on_activation_edge() {
    let (store, bus, _dir) = harness();
    let service = StoreService::new(store.clone(), bus.clone());
    let (_sweeper, stop) = service.run(Duration::from_secs(3600)).await.unwrap();

    let device = Uuid::new_v4();
    let rule = Uuid::new_v4();
    let condition = Uuid::new_v4();
    let action = Uuid::new_v4();
    let target = Uuid::new_v4();

    store
        .merge_points(device, vec![Point::new(point_types::NODE_TYPE, "", 1).with_text("device")])
        .await
        .unwrap();
    store
        .merge_points(rule, vec![Point::new(point_types::NODE_TYPE, "", 1).with_text("rule")])
        .await
        .unwrap();
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
                Point::new("minActive", "", 1).with_value(0.0),
            ],
        )
        .await
        .unwrap();
    store.merge_edge_points(condition, rule, vec![]).await.unwrap();

    store
        .merge_points(
            action,
            vec![
                Point::new(point_types::NODE_TYPE, "", 1).with_text("action"),
                Point::new("nodeID", "", 1).with_text(target.to_string()),
                Point::new("pointType", "", 1).with_text(point_types::VALUE),
                Point::new("valueNumber", "", 1).with_value(1.0),
                Point::new("repeatPeriod", "", 1).with_value(0.0),
            ],
        )
        .await
        .unwrap();
    store.merge_edge_points(action, rule, vec![]).await.unwrap();

    // Below threshold: no activation, no action.
    publish_points(&bus, device, vec![Point::new(point_types::VALUE, "", now_nanos()).with_value(5.0)]).await;
    let target_node = read_node(&bus, target).await;
    assert!(target_node.nodes.is_empty() || target_node.nodes[0].points.is_empty());

    // Crosses threshold: activates, action fires once.
    publish_points(&bus, device, vec![Point::new(point_types::VALUE, "", now_nanos()).with_value(15.0)]).await;
    let target_node = read_node(&bus, target).await;
    assert_eq!(target_node.nodes[0].points[0].value, 1.0);

    // Reset the sink point (a real, later timestamp so it actually
    // supersedes the action's own wall-clock-stamped write) to detect a
    // re-fire.
    store
        .merge_points(target, vec![Point::new(point_types::VALUE, "", now_nanos()).with_value(0.0)])
        .await
        .unwrap();

    // Still above threshold, no new activation edge: action does not re-fire.
    publish_points(&bus, device, vec![Point::new(point_types::VALUE, "", now_nanos()).with_value(16.0)]).await;
    let target_node = read_node(&bus, target).await;
    assert_eq!(target_node.nodes[0].points[0].value, 0.0);

    let _ = stop.send(true);
}

/// Scenario 4: hysteresis — a condition with `minActive` only goes active
/// after the predicate has held continuously, in real elapsed time, for
/// that long (the rule engine measures `minActive` against wall-clock
/// time at the moment each write propagates, not against point
/// timestamps).
#[tokio::test]
async fn hysteresis_requires_sustained_satisfaction() {
    let (store, bus, _dir) = harness();
    let service = StoreService::new(store.clone(), bus.clone());
    let (_sweeper, stop) = service.run(Duration::from_secs(3600)).await.unwrap();

    let device = Uuid::new_v4();
    let rule = Uuid::new_v4();
    let condition = Uuid::new_v4();
    let action = Uuid::new_v4();
    let target = Uuid::new_v4();

    store
        .merge_points(device, vec![Point::new(point_types::NODE_TYPE, "", 1).with_text("device")])
        .await
        .unwrap();
    store
        .merge_points(rule, vec![Point::new(point_types::NODE_TYPE, "", 1).with_text("rule")])
        .await
        .unwrap();
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
                Point::new("minActive", "", 1).with_value(0.05),
            ],
        )
        .await
        .unwrap();
    store.merge_edge_points(condition, rule, vec![]).await.unwrap();
    store
        .merge_points(
            action,
            vec![
                Point::new(point_types::NODE_TYPE, "", 1).with_text("action"),
                Point::new("nodeID", "", 1).with_text(target.to_string()),
                Point::new("pointType", "", 1).with_text(point_types::VALUE),
                Point::new("valueNumber", "", 1).with_value(1.0),
            ],
        )
        .await
        .unwrap();
    store.merge_edge_points(action, rule, vec![]).await.unwrap();

    // A condition's `active` point is only ever written once it *changes*
    // value, so "still inactive" shows up as no point at all (defaults to
    // 0.0) until the sustained-satisfaction deadline is crossed.
    publish_points(&bus, device, vec![Point::new(point_types::VALUE, "", now_nanos()).with_value(15.0)]).await;
    let cond = store.node(condition).await.unwrap();
    assert_eq!(cond.value(point_types::ACTIVE, "").unwrap_or(0.0), 0.0);

    // Another satisfied sample before minActive (50ms) elapses: still inactive.
    tokio::time::sleep(Duration::from_millis(20)).await;
    publish_points(&bus, device, vec![Point::new(point_types::VALUE, "", now_nanos()).with_value(15.0)]).await;
    let cond = store.node(condition).await.unwrap();
    assert_eq!(cond.value(point_types::ACTIVE, "").unwrap_or(0.0), 0.0);

    // Past minActive: now active, action fires.
    tokio::time::sleep(Duration::from_millis(60)).await;
    publish_points(&bus, device, vec![Point::new(point_types::VALUE, "", now_nanos()).with_value(15.0)]).await;
    let cond = store.node(condition).await.unwrap();
    assert_eq!(cond.value(point_types::ACTIVE, "").unwrap_or(0.0), 1.0);

    let target_node = read_node(&bus, target).await;
    assert_eq!(target_node.nodes[0].points[0].value, 1.0);

    let _ = stop.send(true);
}

/// Scenario 5: notification fan-out to every user in a group, each
/// republish producing a fresh message id.
#[tokio::test]
async fn notification_fanout_reaches_every_group_user() {
    let (store, bus, _dir) = harness();
    let service = StoreService::new(store.clone(), bus.clone());
    let (_sweeper, stop) = service.run(Duration::from_secs(3600)).await.unwrap();

    let group = Uuid::new_v4();
    let user1 = Uuid::new_v4();
    let user2 = Uuid::new_v4();

    store
        .merge_points(group, vec![Point::new(point_types::NODE_TYPE, "", 1).with_text("group")])
        .await
        .unwrap();
    store
        .merge_points(
            user1,
            vec![
                Point::new(point_types::NODE_TYPE, "", 1).with_text("user"),
                Point::new(point_types::EMAIL, "", 1).with_text("u1@example.com"),
            ],
        )
        .await
        .unwrap();
    store.merge_edge_points(user1, group, vec![]).await.unwrap();
    store
        .merge_points(
            user2,
            vec![
                Point::new(point_types::NODE_TYPE, "", 1).with_text("user"),
                Point::new(point_types::EMAIL, "", 1).with_text("u2@example.com"),
            ],
        )
        .await
        .unwrap();
    store.merge_edge_points(user2, group, vec![]).await.unwrap();

    let mut u1_sub = subscribe_msg(&bus, user1).await;
    let mut u2_sub = subscribe_msg(&bus, user2).await;

    let notification = simple_iot::notify::Notification {
        id: Uuid::new_v4(),
        source_node_id: group,
        subject: "alert".to_string(),
        body: "first".to_string(),
    };
    bus.publish(
        &subjects::node_not(&group.to_string()),
        proto_ext::encode_notification(&notification),
    )
    .await
    .unwrap();

    let first_u1 = u1_sub.recv().await.unwrap();
    let first_u2 = u2_sub.recv().await.unwrap();
    assert_ne!(first_u1.id, first_u2.id);

    // Republish: both users get a fresh message id.
    let notification2 = simple_iot::notify::Notification {
        id: Uuid::new_v4(),
        ..notification
    };
    bus.publish(
        &subjects::node_not(&group.to_string()),
        proto_ext::encode_notification(&notification2),
    )
    .await
    .unwrap();

    let second_u1 = u1_sub.recv().await.unwrap();
    assert_ne!(second_u1.id, first_u1.id);

    let _ = stop.send(true);
}

/// Subscribes a raw listener on `node.<id>.msg` and decodes every
/// delivered `Message`, since the production subscription for this
/// subject lives inside [`StoreService`] and isn't reusable by tests.
async fn subscribe_msg(
    bus: &Arc<dyn Bus>,
    user: Uuid,
) -> tokio::sync::mpsc::UnboundedReceiver<simple_iot::notify::Message> {
    use simple_iot::bus::{Handler, ReplyFuture};

    struct Collector(tokio::sync::mpsc::UnboundedSender<simple_iot::notify::Message>);
    impl Handler for Collector {
        fn handle(&self, _subject: String, payload: Vec<u8>) -> ReplyFuture {
            let tx = self.0.clone();
            Box::pin(async move {
                if let Ok(msg) = proto_ext::decode_message(&payload) {
                    let _ = tx.send(msg);
                }
                Vec::new()
            })
        }
    }

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    bus.subscribe(&subjects::node_msg(&user.to_string()), Arc::new(Collector(tx)))
        .await
        .unwrap();
    rx
}

/// Scenario 6: cycle rejection — the store refuses an edge write that
/// would close a cycle, and leaves existing state untouched.
#[tokio::test]
async fn cycle_rejected_and_store_unchanged() {
    let (store, bus, _dir) = harness();
    let service = StoreService::new(store.clone(), bus.clone());
    let (_sweeper, stop) = service.run(Duration::from_secs(3600)).await.unwrap();

    let p = Uuid::new_v4();
    let child = Uuid::new_v4();
    store
        .merge_points(p, vec![Point::new(point_types::NODE_TYPE, "", 1).with_text("device")])
        .await
        .unwrap();
    store
        .merge_points(child, vec![Point::new(point_types::NODE_TYPE, "", 1).with_text("device")])
        .await
        .unwrap();
    store.merge_edge_points(child, p, vec![]).await.unwrap();

    let reply = bus
        .request(
            &subjects::edge_points(&child.to_string(), &p.to_string()),
            proto_ext::encode_points(&[Point::new(point_types::TOMBSTONE, "", 0)]),
            Duration::from_secs(1),
        )
        .await
        .unwrap();
    assert!(!reply.is_empty(), "cycle attempt should reply with an error string");

    let err = store
        .merge_edge_points(p, child, vec![Point::new(point_types::TOMBSTONE, "", 0)])
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Cycle { .. }));

    // Original edge is untouched.
    let parents = store.edges_up(child, false).await.unwrap();
    assert_eq!(parents.len(), 1);
    assert_eq!(parents[0].0, p);

    let _ = stop.send(true);
}
