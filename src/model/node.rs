//! Node primitive and the node type taxonomy.

use std::collections::BTreeMap;

use uuid::Uuid;

use super::point::{types, EdgePoint, Point};

/// The sentinel parent id for the tree root, carried at the wire level.
/// The root node itself simply has no parent edge in the store; this
/// constant documents that wire-level sentinel rather than naming a
/// storage key.
pub const ROOT_PARENT: &str = "root";

/// The well-known id of the tree's singular root node, which always
/// exists and cannot be deleted. Fixed rather than generated so orphan
/// repair and bootstrap have a stable attachment point without a
/// separate directory lookup.
pub const ROOT_NODE_ID: Uuid = Uuid::nil();

/// Node type discriminator. An additive catch-all keeps unrecognized future
/// types round-tripping instead of erroring, so new node types don't break
/// existing deployments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeType {
    Device,
    Group,
    User,
    Rule,
    Condition,
    Action,
    ActionInactive,
    MsgService,
    Db,
    Variable,
    SignalGenerator,
    Modbus,
    ModbusIo,
    SerialDev,
    OneWire,
    OneWireIo,
    Upstream,
    Jwt,
    Other(String),
}

impl NodeType {
    pub fn as_str(&self) -> &str {
        match self {
            NodeType::Device => "device",
            NodeType::Group => "group",
            NodeType::User => "user",
            NodeType::Rule => "rule",
            NodeType::Condition => "condition",
            NodeType::Action => "action",
            NodeType::ActionInactive => "actionInactive",
            NodeType::MsgService => "msgService",
            NodeType::Db => "db",
            NodeType::Variable => "variable",
            NodeType::SignalGenerator => "signalGenerator",
            NodeType::Modbus => "modbus",
            NodeType::ModbusIo => "modbusIo",
            NodeType::SerialDev => "serialDev",
            NodeType::OneWire => "oneWire",
            NodeType::OneWireIo => "oneWireIO",
            NodeType::Upstream => "upstream",
            NodeType::Jwt => "jwt",
            NodeType::Other(s) => s,
        }
    }
}

impl From<&str> for NodeType {
    fn from(s: &str) -> Self {
        match s {
            "device" => NodeType::Device,
            "group" => NodeType::Group,
            "user" => NodeType::User,
            "rule" => NodeType::Rule,
            "condition" => NodeType::Condition,
            "action" => NodeType::Action,
            "actionInactive" => NodeType::ActionInactive,
            "msgService" => NodeType::MsgService,
            "db" => NodeType::Db,
            "variable" => NodeType::Variable,
            "signalGenerator" => NodeType::SignalGenerator,
            "modbus" => NodeType::Modbus,
            "modbusIo" => NodeType::ModbusIo,
            "serialDev" => NodeType::SerialDev,
            "oneWire" => NodeType::OneWire,
            "oneWireIO" => NodeType::OneWireIo,
            "upstream" => NodeType::Upstream,
            "jwt" => NodeType::Jwt,
            other => NodeType::Other(other.to_string()),
        }
    }
}

/// A node's point set, keyed by `(type, key)` for O(log n) merge lookups.
/// `BTreeMap` also gives deterministic iteration order, which the rule
/// engine's tie-breaking ("condition node ID lexicographic sort")
/// and notification dedup both rely on elsewhere.
pub type PointSet = BTreeMap<(String, String), Point>;

/// A node's points under one particular parent edge.
#[derive(Debug, Clone, Default)]
pub struct EdgePointSet {
    pub points: BTreeMap<(String, String), Point>,
}

impl EdgePointSet {
    /// Merge one edge point by LWW; returns true if it was applied.
    pub fn merge(&mut self, edge_point: EdgePoint) -> bool {
        let slot = (
            edge_point.point.point_type.clone(),
            edge_point.point.key.clone(),
        );
        match self.points.get(&slot) {
            Some(existing) if !edge_point.point.supersedes(existing) => false,
            _ => {
                self.points.insert(slot, edge_point.point);
                true
            }
        }
    }

    /// An edge is tombstoned if its `tombstone` point type carries a
    /// non-zero value ("Edge Point type `tombstone` with
    /// non-zero value removes the relation").
    pub fn is_tombstoned(&self) -> bool {
        self.points
            .get(&(types::TOMBSTONE.to_string(), String::new()))
            .map(|p| p.value != 0.0)
            .unwrap_or(false)
    }
}

/// A node: a UUID identity, a type, and a merged point set. Parent edges are
/// NOT embedded here — they live in the store's `edges/` and `edgePoints/`
/// keyspaces, since a node may have more than one parent and the
/// tree walker always consults the store directly rather than in-memory
/// pointers.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: Uuid,
    pub node_type: NodeType,
    pub points: PointSet,
}

impl Node {
    pub fn new(id: Uuid, node_type: NodeType) -> Self {
        Self {
            id,
            node_type,
            points: PointSet::new(),
        }
    }

    /// Merge one point by LWW ("merge by last-writer-wins on
    /// time"); returns true if the point replaced or created a slot.
    pub fn merge(&mut self, point: Point) -> bool {
        let slot = (point.point_type.clone(), point.key.clone());
        match self.points.get(&slot) {
            Some(existing) if !point.supersedes(existing) => false,
            _ => {
                self.points.insert(slot, point);
                true
            }
        }
    }

    pub fn get(&self, point_type: &str, key: &str) -> Option<&Point> {
        self.points.get(&(point_type.to_string(), key.to_string()))
    }

    pub fn value(&self, point_type: &str, key: &str) -> Option<f64> {
        self.get(point_type, key).map(|p| p.value)
    }

    pub fn text(&self, point_type: &str, key: &str) -> Option<&str> {
        self.get(point_type, key).map(|p| p.text.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_is_idempotent() {
        let mut node = Node::new(Uuid::new_v4(), NodeType::Device);
        let p = Point::new("value", "", 5).with_value(3.14);

        assert!(node.merge(p.clone()));
        assert!(!node.merge(p.clone()));
        assert!(!node.merge(p));
        assert_eq!(node.value("value", ""), Some(3.14));
    }

    #[test]
    fn node_type_round_trips_through_str() {
        for s in ["device", "rule", "condition", "oneWireIO", "somethingNew"] {
            assert_eq!(NodeType::from(s).as_str(), s);
        }
    }
}
