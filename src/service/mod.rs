//! Store service: owns the store, subscribes to every bus
//! subject, applies mutations, and triggers upstream propagation.
//! Construction is a straight line: build storage, build the bus, build
//! the service, subscribe, serve.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

mod handlers;
pub mod metrics;
pub mod scheduler;

use crate::bus::{subjects, Bus, BusResult, Handler, ReplyFuture};
use crate::model::Point;
use crate::notify::{LoggingGateway, NotificationGateway};
use crate::rule::RuleEngine;
use crate::store::NodeStore;
use crate::tree::{self, DbSink, LoggingDbSink};
use metrics::ServiceMetrics;

/// The running store service: a process-scoped singleton created at
/// startup and torn down on shutdown ("Global state"), but
/// structured as an injected `Arc<Self>` rather than module-level state
/// so tests can instantiate multiple isolated instances.
pub struct StoreService {
    store: Arc<dyn NodeStore>,
    bus: Arc<dyn Bus>,
    rule_engine: RuleEngine,
    db_sink: Arc<dyn DbSink>,
    gateway: Arc<dyn NotificationGateway>,
    service_metrics: ServiceMetrics,
}

/// Wraps a closure as a [`Handler`], so `run` can register one
/// subscription per subject pattern without a distinct struct per
/// handler (same shape as the bus module's own test `Echo`/`Recorder`
/// handlers).
struct RouteHandler<F>(F);

impl<F> Handler for RouteHandler<F>
where
    F: Fn(String, Vec<u8>) -> ReplyFuture + Send + Sync,
{
    fn handle(&self, subject: String, payload: Vec<u8>) -> ReplyFuture {
        (self.0)(subject, payload)
    }
}

/// Whether a reply represents success, for metrics only. The
/// empty/non-empty error convention only applies to the write-style
/// subjects; read-style subjects always reply with an encoded
/// `NodesRequest` and signal failure through its `error` field instead.
fn reply_ok(pattern: &str, reply: &[u8]) -> bool {
    if pattern == subjects::NODE_READ || pattern == subjects::NODE_CHILDREN {
        use prost::Message as _;
        crate::proto::NodesRequest::decode(reply)
            .map(|r| r.error.is_empty())
            .unwrap_or(false)
    } else {
        reply.is_empty()
    }
}

impl StoreService {
    pub fn new(store: Arc<dyn NodeStore>, bus: Arc<dyn Bus>) -> Arc<Self> {
        Self::with_collaborators(
            store,
            bus,
            Arc::new(LoggingDbSink::default()),
            Arc::new(LoggingGateway::default()),
        )
    }

    pub fn with_collaborators(
        store: Arc<dyn NodeStore>,
        bus: Arc<dyn Bus>,
        db_sink: Arc<dyn DbSink>,
        gateway: Arc<dyn NotificationGateway>,
    ) -> Arc<Self> {
        let rule_engine = RuleEngine::new(store.clone(), bus.clone());
        Arc::new(Self {
            store,
            bus,
            rule_engine,
            db_sink,
            gateway,
            service_metrics: ServiceMetrics::new(),
        })
    }

    /// Current pending-message depth ("surfaces pending-queue
    /// depth").
    pub fn pending(&self) -> i64 {
        self.service_metrics.pending()
    }

    /// Subscribe to every subject in the taxonomy table and spawn the
    /// schedule sweeper. Returns the sweeper's join handle and stop
    /// sender so callers can shut it down.
    pub async fn run(
        self: &Arc<Self>,
        schedule_tick: Duration,
    ) -> BusResult<(JoinHandle<()>, watch::Sender<bool>)> {
        macro_rules! register {
            ($pattern:expr, $handler:path) => {{
                let service = self.clone();
                let pattern = $pattern;
                let handler: Arc<dyn Handler> =
                    Arc::new(RouteHandler(move |subject: String, payload: Vec<u8>| -> ReplyFuture {
                        let service = service.clone();
                        Box::pin(async move {
                            let started = service.service_metrics.start(&subject);
                            let reply = $handler(&service, &subject, payload).await;
                            service
                                .service_metrics
                                .finish(&subject, started, reply_ok(pattern, &reply));
                            reply
                        }) as Pin<Box<dyn Future<Output = Vec<u8>> + Send>>
                    }));
                self.bus.subscribe($pattern, handler).await?;
            }};
        }

        register!(subjects::NODE_POINTS, handlers::node_points);
        register!(subjects::EDGE_POINTS, handlers::edge_points);
        register!(subjects::NODE_READ, handlers::node_read);
        register!(subjects::NODE_CHILDREN, handlers::node_children);
        register!(subjects::NODE_NOT, handlers::node_not);
        register!(subjects::NODE_MSG, handlers::node_msg);
        register!(subjects::AUTH_USER, handlers::auth_user);

        let sweeper = scheduler::spawn(
            self.store.clone(),
            self.bus.clone(),
            Arc::new(RuleEngine::new(self.store.clone(), self.bus.clone())),
            self.db_sink.clone(),
            schedule_tick,
        );
        Ok(sweeper)
    }

    /// Upstream propagation after a successful point/edge-point merge
    ///. Logged, not replied — the triggering
    /// mutation has already succeeded ("Propagation policy").
    async fn propagate(&self, node_id: Uuid, points: &[Point]) {
        let now = chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0);
        if let Err(e) = tree::propagate_upstream(
            &self.store,
            &self.bus,
            &self.rule_engine,
            &self.db_sink,
            node_id,
            points,
            now,
        )
        .await
        {
            tracing::warn!(node = %node_id, error = %e, "upstream propagation failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::InProcessBus;
    use crate::model::point_types;
    use crate::proto_ext;
    use crate::store::{KvNodeStore, MemoryKv};
    use prost::Message as _;
    use std::time::Duration as StdDuration;

    fn service() -> (Arc<StoreService>, Arc<dyn Bus>) {
        let store: Arc<dyn NodeStore> = Arc::new(KvNodeStore::new(Arc::new(MemoryKv::new())));
        let bus: Arc<dyn Bus> = Arc::new(InProcessBus::new());
        (StoreService::new(store, bus.clone()), bus)
    }

    #[tokio::test]
    async fn write_then_read_round_trip() {
        let (service, bus) = service();
        let (_sweeper, stop) = service.run(StdDuration::from_secs(3600)).await.unwrap();

        let id = Uuid::new_v4();
        let points = vec![Point::new(point_types::VALUE, "", 1).with_value(3.14)];
        let reply = bus
            .request(
                &subjects::node_points(&id.to_string()),
                proto_ext::encode_points(&points),
                StdDuration::from_secs(1),
            )
            .await
            .unwrap();
        assert!(reply.is_empty());

        let read_reply = bus
            .request(
                &subjects::node_read(&id.to_string()),
                b"all".to_vec(),
                StdDuration::from_secs(1),
            )
            .await
            .unwrap();
        let decoded = crate::proto::NodesRequest::decode(read_reply.as_slice()).unwrap();
        assert_eq!(decoded.nodes.len(), 1);
        assert_eq!(decoded.nodes[0].id, id.to_string());
        assert_eq!(decoded.nodes[0].points[0].value, 3.14);

        let _ = stop.send(true);
    }
}
