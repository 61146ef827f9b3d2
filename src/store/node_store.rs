//! [`NodeStore`]: the node/point/edge tree built atop an abstract [`Kv`],
//! generic over any [`Kv`] implementation rather than tied to one
//! database.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use prost::Message as _;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::keys;
use super::kv::{Kv, KvOp};
use super::{StoreError, StoreResult};
use crate::model::{EdgePointSet, Node, NodeType, Point, PointSet};
use crate::proto;

/// A node plus the id of the parent edge it was reached through, returned
/// by [`NodeStore::descendants`]'s breadth-first walk.
pub type Descendants = Vec<Node>;

/// The node/point/edge tree operations the store service and rule/notify
/// layers call through ("Operations").
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Merge points into a node, creating it if absent. `node_type_hint`
    /// seeds the node's type when the node doesn't exist yet and the
    /// caller co-submitted a `nodeType` point ("creates node
    /// record if absent with a default type inferred from a co-submitted
    /// nodeType point when present").
    async fn merge_points(&self, node_id: Uuid, points: Vec<Point>) -> StoreResult<()>;

    /// Merge edge points for the `(parent_id, node_id)` relation, creating
    /// the edge record on first write. Rejects with [`StoreError::Cycle`]
    /// if the edge would make `parent_id` reachable from itself.
    async fn merge_edge_points(
        &self,
        node_id: Uuid,
        parent_id: Uuid,
        points: Vec<Point>,
    ) -> StoreResult<()>;

    /// Read one node by id.
    async fn node(&self, id: Uuid) -> StoreResult<Node>;

    /// Read one parent edge's point set.
    async fn node_edge(&self, id: Uuid, parent: Uuid) -> StoreResult<EdgePointSet>;

    /// Breadth-first descendant enumeration from `id`, optionally filtered
    /// by node type, optionally recursive, optionally including
    /// tombstoned edges.
    async fn descendants(
        &self,
        id: Uuid,
        type_filter: Option<&str>,
        recursive: bool,
        include_tombstoned: bool,
    ) -> StoreResult<Descendants>;

    /// Parent edges of `id`: `(parent_id, edge_points)` pairs.
    async fn edges_up(
        &self,
        id: Uuid,
        include_tombstoned: bool,
    ) -> StoreResult<Vec<(Uuid, EdgePointSet)>>;

    /// The primary (last non-tombstoned) parent edge of `id`, if any
    /// ("the primary parent is the last non-tombstoned edge").
    async fn primary_parent(&self, id: Uuid) -> StoreResult<Option<Uuid>>;

    /// Look up a user-typed node by email/password (`UserCheck`).
    /// Password comparison is bytewise; hashing/issuing tokens is an
    /// external auth collaborator, out of this CORE's scope.
    async fn user_check(&self, email: &str, pass: &str) -> StoreResult<Option<Uuid>>;
}

/// The concrete [`NodeStore`], generic over any [`Kv`] backend.
pub struct KvNodeStore {
    kv: Arc<dyn Kv>,
    /// Serializes every mutating write so the store sees a linear history
    /// ("serializes all mutating writes through a single
    /// lock").
    write_lock: Mutex<()>,
}

impl KvNodeStore {
    pub fn new(kv: Arc<dyn Kv>) -> Self {
        Self {
            kv,
            write_lock: Mutex::new(()),
        }
    }

    fn decode_point(bytes: &[u8]) -> StoreResult<Point> {
        let wire =
            proto::Point::decode(bytes).map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(Point::from(&wire))
    }

    fn encode_point(point: &Point) -> Vec<u8> {
        proto::Point::from(point).encode_to_vec()
    }

    fn load_point_set(&self, prefix: Vec<u8>) -> StoreResult<PointSet> {
        let mut set = PointSet::new();
        for (_, value) in self.kv.scan_prefix(&prefix)? {
            let point = Self::decode_point(&value)?;
            let slot = (point.point_type.clone(), point.key.clone());
            set.insert(slot, point);
        }
        Ok(set)
    }

    fn node_type(&self, id: Uuid) -> StoreResult<NodeType> {
        match self.kv.get(&keys::node_meta(&id.to_string()))? {
            Some(bytes) => {
                let s = String::from_utf8_lossy(&bytes);
                let type_str = s.split('\t').next().unwrap_or("");
                Ok(NodeType::from(type_str))
            }
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    fn node_exists(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.kv.get(&keys::node_meta(&id.to_string()))?.is_some())
    }

    fn children_ids(&self, parent_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let prefix = keys::edges_from_parent_prefix(&parent_id.to_string());
        let mut ids = Vec::new();
        for (key, _) in self.kv.scan_prefix(&prefix)? {
            // edges/<parent>/<child>/meta
            let s = String::from_utf8_lossy(&key);
            if let Some(child) = s.split('/').nth(2) {
                if let Ok(uuid) = Uuid::parse_str(child) {
                    ids.push(uuid);
                }
            }
        }
        Ok(ids)
    }

    /// Children of `parent_id` reachable through a non-tombstoned edge,
    /// or all children when `include_tombstoned` is set.
    fn live_children(&self, parent_id: Uuid, include_tombstoned: bool) -> StoreResult<Vec<Uuid>> {
        let mut out = Vec::new();
        for child_id in self.children_ids(parent_id)? {
            let edge = self.edge_point_set(parent_id, child_id)?;
            if include_tombstoned || !edge.is_tombstoned() {
                out.push(child_id);
            }
        }
        Ok(out)
    }

    /// True if `needle` is reachable by walking downward (parent -> child)
    /// from `start` ("Cycle guard on edge write: starting from
    /// the proposed child, DFS downward; reject if the proposed parent is
    /// reachable").
    fn reachable_downward(&self, start: Uuid, needle: Uuid) -> StoreResult<bool> {
        let mut visited = HashSet::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            if current == needle {
                return Ok(true);
            }
            for child in self.children_ids(current)? {
                stack.push(child);
            }
        }
        Ok(false)
    }

    fn edge_point_set(&self, parent_id: Uuid, child_id: Uuid) -> StoreResult<EdgePointSet> {
        let prefix = keys::edge_point_prefix(&parent_id.to_string(), &child_id.to_string());
        let points = self.load_point_set(prefix)?;
        Ok(EdgePointSet { points })
    }
}

#[async_trait]
impl NodeStore for KvNodeStore {
    async fn merge_points(&self, node_id: Uuid, points: Vec<Point>) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;

        let mut ops = Vec::new();
        let existing = self.load_point_set(keys::point_prefix(&node_id.to_string()))?;

        if !self.node_exists(node_id)? {
            let node_type = points
                .iter()
                .find(|p| p.point_type == crate::model::point_types::NODE_TYPE)
                .map(|p| NodeType::from(p.text.as_str()))
                .unwrap_or(NodeType::Other(String::new()));
            ops.push(KvOp::Put(
                keys::node_meta(&node_id.to_string()),
                format!("{}\t{}", node_type.as_str(), chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0))
                    .into_bytes(),
            ));
        }

        for point in points {
            let slot = (point.point_type.clone(), point.key.clone());
            let should_apply = match existing.get(&slot) {
                Some(current) => point.supersedes(current),
                None => true,
            };
            if should_apply {
                ops.push(KvOp::Put(
                    keys::point(&node_id.to_string(), &point.point_type, &point.key),
                    Self::encode_point(&point),
                ));
            }
        }

        self.kv.apply_batch(ops)
    }

    async fn merge_edge_points(
        &self,
        node_id: Uuid,
        parent_id: Uuid,
        points: Vec<Point>,
    ) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;

        if self.node_exists(node_id)? && self.reachable_downward(node_id, parent_id)? {
            return Err(StoreError::Cycle {
                parent: parent_id.to_string(),
                child: node_id.to_string(),
            });
        }

        let mut ops = Vec::new();
        let existing = self.edge_point_set(parent_id, node_id)?;

        let edge_meta_key = keys::edge_meta(&parent_id.to_string(), &node_id.to_string());
        if self.kv.get(&edge_meta_key)?.is_none() {
            ops.push(KvOp::Put(edge_meta_key, b"1".to_vec()));
            ops.push(KvOp::Put(
                keys::edges_by_child(&node_id.to_string(), &parent_id.to_string()),
                b"1".to_vec(),
            ));
        }

        for point in points {
            let slot = (point.point_type.clone(), point.key.clone());
            let should_apply = match existing.points.get(&slot) {
                Some(current) => point.supersedes(current),
                None => true,
            };
            if should_apply {
                ops.push(KvOp::Put(
                    keys::edge_point(
                        &parent_id.to_string(),
                        &node_id.to_string(),
                        &point.point_type,
                        &point.key,
                    ),
                    Self::encode_point(&point),
                ));
            }
        }

        self.kv.apply_batch(ops)
    }

    async fn node(&self, id: Uuid) -> StoreResult<Node> {
        let node_type = self.node_type(id)?;
        let points = self.load_point_set(keys::point_prefix(&id.to_string()))?;
        Ok(Node {
            id,
            node_type,
            points,
        })
    }

    async fn node_edge(&self, id: Uuid, parent: Uuid) -> StoreResult<EdgePointSet> {
        self.edge_point_set(parent, id)
    }

    async fn descendants(
        &self,
        id: Uuid,
        type_filter: Option<&str>,
        recursive: bool,
        include_tombstoned: bool,
    ) -> StoreResult<Descendants> {
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        visited.insert(id);

        let mut queue: VecDeque<Uuid> = self
            .live_children(id, include_tombstoned)?
            .into_iter()
            .collect();

        while let Some(child_id) = queue.pop_front() {
            if !visited.insert(child_id) {
                continue;
            }

            let node = self.node(child_id).await?;
            let type_matches = type_filter
                .map(|t| node.node_type.as_str() == t)
                .unwrap_or(true);
            if type_matches {
                out.push(node);
            }

            if recursive {
                for grandchild in self.live_children(child_id, include_tombstoned)? {
                    queue.push_back(grandchild);
                }
            }
        }

        Ok(out)
    }

    async fn edges_up(
        &self,
        id: Uuid,
        include_tombstoned: bool,
    ) -> StoreResult<Vec<(Uuid, EdgePointSet)>> {
        self.edges_up_sync(id, include_tombstoned)
    }

    async fn primary_parent(&self, id: Uuid) -> StoreResult<Option<Uuid>> {
        let parents = self.edges_up_sync(id, false)?;
        Ok(parents.last().map(|(p, _)| *p))
    }

    async fn user_check(&self, email: &str, pass: &str) -> StoreResult<Option<Uuid>> {
        let prefix = keys::node_meta_prefix();
        for (key, _) in self.kv.scan_prefix(&prefix)? {
            let id_str = keys::last_segment(&key);
            let Ok(id) = Uuid::parse_str(id_str) else {
                continue;
            };
            let Ok(node_type) = self.node_type(id) else {
                continue;
            };
            if node_type != NodeType::User {
                continue;
            }
            let node = self.node(id).await?;
            let node_email = node.text(crate::model::point_types::EMAIL, "").unwrap_or("");
            let node_pass = node.text(crate::model::point_types::PASS, "").unwrap_or("");
            if node_email == email && node_pass == pass {
                return Ok(Some(id));
            }
        }
        Ok(None)
    }
}

impl KvNodeStore {
    fn edges_up_sync(
        &self,
        id: Uuid,
        include_tombstoned: bool,
    ) -> StoreResult<Vec<(Uuid, EdgePointSet)>> {
        let prefix = keys::edges_by_child_prefix(&id.to_string());
        let mut out = Vec::new();
        for (key, _) in self.kv.scan_prefix(&prefix)? {
            let parent_str = keys::last_segment(&key);
            let Ok(parent_id) = Uuid::parse_str(parent_str) else {
                continue;
            };
            let edge = self.edge_point_set(parent_id, id)?;
            if include_tombstoned || !edge.is_tombstoned() {
                out.push((parent_id, edge));
            }
        }
        Ok(out)
    }

}
