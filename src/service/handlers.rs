//! Per-subject message handling: decode, apply, propagate, reply. Each
//! function here is the body of one bus subscription, wrapped into a
//! [`crate::bus::Handler`] by [`super::StoreService::run`].

use uuid::Uuid;

use crate::model::{point_types, Point};
use crate::proto_ext::{self, NodeExt as _};
use crate::store::StoreError;

use super::StoreService;

/// Error-reply convention: empty reply means success; any non-empty
/// reply is a human-readable error string.
pub const ACK: &[u8] = &[];

fn err_reply(e: impl std::fmt::Display) -> Vec<u8> {
    e.to_string().into_bytes()
}

fn segments(subject: &str) -> Vec<&str> {
    subject.split('.').collect()
}

fn parse_uuid_segment(parts: &[&str], index: usize) -> Result<Uuid, Vec<u8>> {
    parts
        .get(index)
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| err_reply(StoreError::Decode("malformed subject".to_string())))
}

/// `node.<id>.points`: merge points into a node and propagate upstream
///.
pub async fn node_points(service: &StoreService, subject: &str, payload: Vec<u8>) -> Vec<u8> {
    let parts = segments(subject);
    let node_id = match parse_uuid_segment(&parts, 1) {
        Ok(id) => id,
        Err(reply) => return reply,
    };

    let points = match proto_ext::decode_points(&payload) {
        Ok(p) => p,
        Err(e) => return err_reply(e),
    };

    if let Err(e) = service.store.merge_points(node_id, points.clone()).await {
        return err_reply(e);
    }

    service.propagate(node_id, &points).await;
    ACK.to_vec()
}

/// `node.<parent>.<child>.points`: merge edge points and propagate
/// upstream from the child.
pub async fn edge_points(service: &StoreService, subject: &str, payload: Vec<u8>) -> Vec<u8> {
    let parts = segments(subject);
    let parent_id = match parse_uuid_segment(&parts, 1) {
        Ok(id) => id,
        Err(reply) => return reply,
    };
    let child_id = match parse_uuid_segment(&parts, 2) {
        Ok(id) => id,
        Err(reply) => return reply,
    };

    let points = match proto_ext::decode_points(&payload) {
        Ok(p) => p,
        Err(e) => return err_reply(e),
    };

    if let Err(e) = service
        .store
        .merge_edge_points(child_id, parent_id, points.clone())
        .await
    {
        return err_reply(e);
    }

    service.propagate(child_id, &points).await;
    ACK.to_vec()
}

/// `node.<id>`: read one node. Payload is the parent id to scope edge
/// points to, or `"all"` for every parent edge.
pub async fn node_read(service: &StoreService, subject: &str, payload: Vec<u8>) -> Vec<u8> {
    let parts = segments(subject);
    let node_id = match parse_uuid_segment(&parts, 1) {
        Ok(id) => id,
        Err(_) => return proto_ext::encode_nodes_request(&[], "malformed subject"),
    };

    let scope = String::from_utf8_lossy(&payload).trim().to_string();

    let node = match service.store.node(node_id).await {
        Ok(n) => n,
        Err(e) => return proto_ext::encode_nodes_request(&[], &e.to_string()),
    };

    let parents = match service.store.edges_up(node_id, false).await {
        Ok(p) => p,
        Err(e) => return proto_ext::encode_nodes_request(&[], &e.to_string()),
    };

    let edge_points: Vec<(String, Vec<Point>)> = parents
        .into_iter()
        .filter(|(parent_id, _)| scope == "all" || scope.is_empty() || parent_id.to_string() == scope)
        .map(|(parent_id, edge)| (parent_id.to_string(), edge.points.into_values().collect()))
        .collect();

    let wire = node.to_wire(&edge_points);
    proto_ext::encode_nodes_request(&[wire], "")
}

/// `node.<id>.children`: enumerate descendants, optionally type-filtered,
/// optionally recursive, optionally including tombstoned ones.
pub async fn node_children(service: &StoreService, subject: &str, payload: Vec<u8>) -> Vec<u8> {
    let parts = segments(subject);
    let node_id = match parse_uuid_segment(&parts, 1) {
        Ok(id) => id,
        Err(_) => return proto_ext::encode_nodes_request(&[], "malformed subject"),
    };

    let request = match proto_ext::decode_children_request(&payload) {
        Ok(r) => r,
        Err(e) => return proto_ext::encode_nodes_request(&[], &e.to_string()),
    };

    let type_filter = if request.r#type.is_empty() {
        None
    } else {
        Some(request.r#type.as_str())
    };

    let children = match service
        .store
        .descendants(node_id, type_filter, request.recursive, request.include_tombstoned)
        .await
    {
        Ok(c) => c,
        Err(e) => return proto_ext::encode_nodes_request(&[], &e.to_string()),
    };

    let wire: Vec<_> = children.iter().map(|n| n.to_wire(&[])).collect();
    proto_ext::encode_nodes_request(&wire, "")
}

/// `node.<id>.not`: trigger a user-directed notification.
pub async fn node_not(service: &StoreService, subject: &str, payload: Vec<u8>) -> Vec<u8> {
    let parts = segments(subject);
    let target_id = match parse_uuid_segment(&parts, 1) {
        Ok(id) => id,
        Err(reply) => return reply,
    };

    let notification = match proto_ext::decode_notification(&payload) {
        Ok(n) => n,
        Err(e) => return err_reply(e),
    };

    match crate::notify::fanout::handle_notification(
        service.store.as_ref(),
        service.bus.as_ref(),
        target_id,
        &notification,
    )
    .await
    {
        Ok(()) => ACK.to_vec(),
        Err(e) => err_reply(e),
    }
}

/// `node.<id>.msg`: deliver a rendered message to message-service
/// descendants/ancestors.
pub async fn node_msg(service: &StoreService, subject: &str, payload: Vec<u8>) -> Vec<u8> {
    let parts = segments(subject);
    let target_id = match parse_uuid_segment(&parts, 1) {
        Ok(id) => id,
        Err(reply) => return reply,
    };

    let message = match proto_ext::decode_message(&payload) {
        Ok(m) => m,
        Err(e) => return err_reply(e),
    };

    match crate::notify::fanout::handle_message(
        service.store.as_ref(),
        &service.gateway,
        target_id,
        &message,
    )
    .await
    {
        Ok(()) => ACK.to_vec(),
        Err(e) => err_reply(e),
    }
}

/// `auth.user`: log in. Failure replies with an empty payload rather
/// than disclosing the cause, applied symmetrically to decode failures
/// too, so a malformed request can't be distinguished from bad
/// credentials.
pub async fn auth_user(service: &StoreService, _subject: &str, payload: Vec<u8>) -> Vec<u8> {
    let Ok(login) = proto_ext::decode_user_login(&payload) else {
        return ACK.to_vec();
    };

    match service.store.user_check(&login.email, &login.pass).await {
        Ok(Some(user_id)) => {
            proto_ext::encode_points(&[Point::new(point_types::NODE_TYPE, "userID", 0)
                .with_text(user_id.to_string())])
        }
        _ => ACK.to_vec(),
    }
}
