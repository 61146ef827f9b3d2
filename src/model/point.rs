//! Point and EdgePoint primitives.

use std::cmp::Ordering;

/// A timestamped, tag-indexed telemetry sample.
///
/// Time ties are broken by `(type, key)` lexicographic order so merges stay
/// deterministic even when two writers stamp the same nanosecond.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub time: i64,
    pub point_type: String,
    pub key: String,
    pub value: f64,
    pub text: String,
    pub tombstone: bool,
}

impl Point {
    pub fn new(point_type: impl Into<String>, key: impl Into<String>, time: i64) -> Self {
        Self {
            time,
            point_type: point_type.into(),
            key: key.into(),
            value: 0.0,
            text: String::new(),
            tombstone: false,
        }
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = value;
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn tombstoned(mut self) -> Self {
        self.tombstone = true;
        self
    }

    /// The `(type, key)` slot identity this point occupies.
    pub fn slot(&self) -> (&str, &str) {
        (&self.point_type, &self.key)
    }

    /// True as a boolean-typed point (`value != 0`), for `valueType: onOff` conditions.
    pub fn is_on(&self) -> bool {
        self.value != 0.0
    }

    /// Order two points contending for the same slot: strictly greater time
    /// wins; equal time keeps the existing point (last-write-wins).
    pub fn supersedes(&self, existing: &Point) -> bool {
        match self.time.cmp(&existing.time) {
            Ordering::Greater => true,
            _ => false,
        }
    }
}

/// A point scoped to a parent -> child relation rather than to a node
/// directly. Structurally identical to [`Point`]; kept as a distinct type so
/// callers can't accidentally write an edge point into the node point set.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgePoint {
    pub point: Point,
}

impl EdgePoint {
    pub fn new(point: Point) -> Self {
        Self { point }
    }
}

/// Well-known point types used by the store, rule engine, and tree walker.
/// Not exhaustive — nodes may carry arbitrary point types; these are simply
/// the ones the CORE itself reads or writes.
pub mod types {
    pub const NODE_TYPE: &str = "nodeType";
    pub const DESCRIPTION: &str = "description";
    pub const TOMBSTONE: &str = "tombstone";
    pub const VALUE: &str = "value";
    pub const TRIGGER: &str = "trigger";
    pub const ACTIVE: &str = "active";
    pub const ACTIVE_START: &str = "activeStart";
    pub const LAST_SENT: &str = "lastSent";
    pub const ERROR: &str = "error";
    pub const EMAIL: &str = "email";
    pub const PASS: &str = "pass";
    pub const PHONE: &str = "phone";
    pub const SERVICE: &str = "service";
}
