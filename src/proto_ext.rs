//! Conversions between the domain model ([`crate::model`]) and the
//! generated wire types ([`crate::proto`]). Named `XyzExt` per the
//! convention of small one-method extension traits over generated types,
//! rather than inherent methods on types this crate doesn't own.

use prost::Message as _;
use uuid::Uuid;

use crate::model::{EdgePoint, Node, NodeType, Point};
use crate::notify::{Message, Notification};
use crate::proto;
use crate::store::{StoreError, StoreResult};

impl From<&Point> for proto::Point {
    fn from(p: &Point) -> Self {
        proto::Point {
            time_unix_nanos: p.time,
            r#type: p.point_type.clone(),
            key: p.key.clone(),
            value: p.value,
            text: p.text.clone(),
            tombstone: if p.tombstone { 1 } else { 0 },
        }
    }
}

impl From<&proto::Point> for Point {
    fn from(p: &proto::Point) -> Self {
        Point {
            time: p.time_unix_nanos,
            point_type: p.r#type.clone(),
            key: p.key.clone(),
            value: p.value,
            text: p.text.clone(),
            tombstone: p.tombstone != 0,
        }
    }
}

/// Extension trait assembling a wire [`proto::Node`] from a domain [`Node`]
/// plus its per-parent edge point sets, projecting store-internal state
/// into one wire envelope on demand.
pub trait NodeExt {
    fn to_wire(&self, edge_points: &[(String, Vec<Point>)]) -> proto::Node;
}

impl NodeExt for Node {
    fn to_wire(&self, edge_points: &[(String, Vec<Point>)]) -> proto::Node {
        let mut wire_edge_points = Vec::new();
        for (parent, points) in edge_points {
            for point in points {
                wire_edge_points.push(proto::EdgePoint {
                    parent: parent.clone(),
                    point: Some(proto::Point::from(point)),
                });
            }
        }

        proto::Node {
            id: self.id.to_string(),
            r#type: self.node_type.as_str().to_string(),
            points: self.points.values().map(proto::Point::from).collect(),
            edge_points: wire_edge_points,
        }
    }
}

/// Extension trait reconstructing enough domain state from a wire
/// [`proto::Node`] to merge it back into the store.
pub trait ProtoNodeExt {
    fn node_id(&self) -> Result<Uuid, uuid::Error>;
    fn domain_points(&self) -> Vec<Point>;
    fn domain_node_type(&self) -> NodeType;
}

impl ProtoNodeExt for proto::Node {
    fn node_id(&self) -> Result<Uuid, uuid::Error> {
        Uuid::parse_str(&self.id)
    }

    fn domain_points(&self) -> Vec<Point> {
        self.points.iter().map(Point::from).collect()
    }

    fn domain_node_type(&self) -> NodeType {
        NodeType::from(self.r#type.as_str())
    }
}

impl From<&EdgePoint> for proto::Point {
    fn from(ep: &EdgePoint) -> Self {
        proto::Point::from(&ep.point)
    }
}

/// Encode/decode helpers for the bus payloads named in the subject
/// taxonomy: thin wrappers over the generated `prost`
/// types so handlers never construct wire messages by hand.
pub fn encode_points(points: &[Point]) -> Vec<u8> {
    proto::Points {
        points: points.iter().map(proto::Point::from).collect(),
    }
    .encode_to_vec()
}

pub fn decode_points(bytes: &[u8]) -> StoreResult<Vec<Point>> {
    let wire = proto::Points::decode(bytes).map_err(|e| StoreError::Decode(e.to_string()))?;
    Ok(wire.points.iter().map(Point::from).collect())
}

impl From<&Notification> for proto::Notification {
    fn from(n: &Notification) -> Self {
        proto::Notification {
            id: n.id.to_string(),
            source_node_id: n.source_node_id.to_string(),
            subject: n.subject.clone(),
            body: n.body.clone(),
        }
    }
}

pub fn encode_notification(n: &Notification) -> Vec<u8> {
    proto::Notification::from(n).encode_to_vec()
}

pub fn decode_notification(bytes: &[u8]) -> StoreResult<Notification> {
    let wire =
        proto::Notification::decode(bytes).map_err(|e| StoreError::Decode(e.to_string()))?;
    Ok(Notification {
        id: parse_uuid_or_nil(&wire.id),
        source_node_id: parse_uuid_or_nil(&wire.source_node_id),
        subject: wire.subject,
        body: wire.body,
    })
}

impl From<&Message> for proto::Message {
    fn from(m: &Message) -> Self {
        proto::Message {
            id: m.id.to_string(),
            user_id: m.user_id.to_string(),
            parent_id: m.parent_id.to_string(),
            notification_id: m.notification_id.to_string(),
            email: m.email.clone(),
            phone: m.phone.clone(),
            subject: m.subject.clone(),
            body: m.body.clone(),
        }
    }
}

pub fn encode_message(m: &Message) -> Vec<u8> {
    proto::Message::from(m).encode_to_vec()
}

pub fn decode_message(bytes: &[u8]) -> StoreResult<Message> {
    let wire = proto::Message::decode(bytes).map_err(|e| StoreError::Decode(e.to_string()))?;
    Ok(Message {
        id: parse_uuid_or_nil(&wire.id),
        user_id: parse_uuid_or_nil(&wire.user_id),
        parent_id: parse_uuid_or_nil(&wire.parent_id),
        notification_id: parse_uuid_or_nil(&wire.notification_id),
        email: wire.email,
        phone: wire.phone,
        subject: wire.subject,
        body: wire.body,
    })
}

pub fn encode_nodes_request(nodes: &[proto::Node], error: &str) -> Vec<u8> {
    proto::NodesRequest {
        nodes: nodes.to_vec(),
        error: error.to_string(),
    }
    .encode_to_vec()
}

pub fn decode_children_request(bytes: &[u8]) -> StoreResult<proto::ChildrenRequest> {
    proto::ChildrenRequest::decode(bytes).map_err(|e| StoreError::Decode(e.to_string()))
}

pub fn decode_user_login(bytes: &[u8]) -> StoreResult<proto::UserLogin> {
    proto::UserLogin::decode(bytes).map_err(|e| StoreError::Decode(e.to_string()))
}

fn parse_uuid_or_nil(s: &str) -> Uuid {
    Uuid::parse_str(s).unwrap_or(Uuid::nil())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_round_trips_through_wire_form() {
        let p = Point::new("value", "temp", 42).with_value(3.5).with_text("ok");
        let wire = proto::Point::from(&p);
        let back = Point::from(&wire);
        assert_eq!(p, back);
    }

    #[test]
    fn node_to_wire_carries_points_and_edge_points() {
        let id = Uuid::new_v4();
        let mut node = Node::new(id, NodeType::Device);
        node.merge(Point::new("value", "", 1).with_value(1.0));

        let wire = node.to_wire(&[("parent-1".to_string(), vec![Point::new("tombstone", "", 2)])]);

        assert_eq!(wire.id, id.to_string());
        assert_eq!(wire.r#type, "device");
        assert_eq!(wire.points.len(), 1);
        assert_eq!(wire.edge_points.len(), 1);
        assert_eq!(wire.edge_points[0].parent, "parent-1");
    }
}
