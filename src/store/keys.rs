//! Keyspace layout: byte-key encoders for the four logical
//! families the node store persists, plus the reverse edge index.
//!
//! Keys are ASCII with `/` separators; node/parent/child ids are UUID
//! strings (no `/`), and point `type`/`key` tags are short ASCII tokens by
//! convention, so no escaping is performed.

pub fn node_meta(id: &str) -> Vec<u8> {
    format!("nodes/{id}").into_bytes()
}

pub fn node_meta_prefix() -> Vec<u8> {
    b"nodes/".to_vec()
}

pub fn point(node_id: &str, point_type: &str, key: &str) -> Vec<u8> {
    format!("points/{node_id}/{point_type}/{key}").into_bytes()
}

pub fn point_prefix(node_id: &str) -> Vec<u8> {
    format!("points/{node_id}/").into_bytes()
}

pub fn edge_meta(parent_id: &str, child_id: &str) -> Vec<u8> {
    format!("edges/{parent_id}/{child_id}/meta").into_bytes()
}

pub fn edges_from_parent_prefix(parent_id: &str) -> Vec<u8> {
    format!("edges/{parent_id}/").into_bytes()
}

pub fn edge_point(parent_id: &str, child_id: &str, point_type: &str, key: &str) -> Vec<u8> {
    format!("edgePoints/{parent_id}/{child_id}/{point_type}/{key}").into_bytes()
}

pub fn edge_point_prefix(parent_id: &str, child_id: &str) -> Vec<u8> {
    format!("edgePoints/{parent_id}/{child_id}/").into_bytes()
}

pub fn edges_by_child(child_id: &str, parent_id: &str) -> Vec<u8> {
    format!("edgesByChild/{child_id}/{parent_id}").into_bytes()
}

pub fn edges_by_child_prefix(child_id: &str) -> Vec<u8> {
    format!("edgesByChild/{child_id}/").into_bytes()
}

/// Pull the last `/`-delimited segment out of a scanned key — used to
/// recover an id after a prefix scan.
pub fn last_segment(key: &[u8]) -> &str {
    let s = std::str::from_utf8(key).unwrap_or("");
    s.rsplit('/').next().unwrap_or("")
}
