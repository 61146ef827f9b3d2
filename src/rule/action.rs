//! Action node: an effect (set point or emit notification) with a
//! repeat-period rate limit.

use std::time::Duration;

use uuid::Uuid;

use super::RuleError;
use crate::model::{Node, Point};

/// A typed view over a generic `action`/`actionInactive`-type [`Node`]'s
/// point set, mirroring [`super::condition::Condition`]'s constructor
/// style.
pub struct Action {
    pub id: Uuid,
    pub node_id: Uuid,
    pub point_type: String,
    pub point_key: String,
    pub value_number: f64,
    pub value_text: String,
    pub repeat_period: Duration,
}

impl Action {
    pub fn from_node(node: &Node) -> Result<Self, RuleError> {
        let err = |msg: &str| RuleError::MalformedAction(node.id, msg.to_string());

        let node_id_str = node.text("nodeID", "").unwrap_or("none");
        let node_id = if node_id_str == "none" {
            Uuid::nil()
        } else {
            Uuid::parse_str(node_id_str).map_err(|_| err("invalid nodeID"))?
        };

        let point_type = node.text("pointType", "").unwrap_or("").to_string();
        if point_type.is_empty() && node_id_str != "none" {
            return Err(err("missing pointType"));
        }

        let point_key = node.text("pointKey", "").unwrap_or("").to_string();
        let value_number = node.value("valueNumber", "").unwrap_or(0.0);
        let value_text = node.text("valueText", "").unwrap_or("").to_string();
        let repeat_period_secs = node.value("repeatPeriod", "").unwrap_or(0.0).max(0.0);

        Ok(Self {
            id: node.id,
            node_id,
            point_type,
            point_key,
            value_number,
            value_text,
            repeat_period: Duration::from_secs_f64(repeat_period_secs),
        })
    }

    /// A `none` target or a `notification` point type routes through
    /// `node.<rule>.not` instead of setting a point.
    pub fn is_notification(&self) -> bool {
        self.node_id.is_nil() || self.point_type == "notification"
    }

    /// The point this action publishes on `node.<nodeID>.points`, stamped
    /// with `now`.
    pub fn target_point(&self, now: i64) -> Point {
        let mut point = Point::new(self.point_type.clone(), self.point_key.clone(), now)
            .with_value(self.value_number);
        if !self.value_text.is_empty() {
            point = point.with_text(self.value_text.clone());
        }
        point
    }
}
