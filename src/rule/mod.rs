//! Rule engine: condition evaluation with timing, action
//! dispatch with rate-limiting, active/inactive edge detection.
//!
//! Conditions and actions are plain constructors that project specific
//! `(type,key)` slots off a generic [`crate::model::Node`]'s point set,
//! not a trait hierarchy.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

pub mod action;
pub mod condition;

pub use action::Action;
pub use condition::Condition;

use crate::bus::{subjects, Bus};
use crate::model::{point_types, Node, NodeType, Point};
use crate::store::NodeStore;

/// Result type for rule engine operations.
pub type RuleResult<T> = std::result::Result<T, RuleError>;

/// Errors surfaced by condition/action evaluation: dispatch failures
/// plus malformed condition/action qualifiers on a node's point set.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("malformed condition {0}: {1}")]
    MalformedCondition(Uuid, String),

    #[error("malformed action {0}: {1}")]
    MalformedAction(Uuid, String),

    #[error("action dispatch failed: {0}")]
    Dispatch(String),
}

/// Evaluates every `rule`-typed direct child of `parent_id` against the
/// current store state and dispatches actions on activation edges.
///
/// Invoked once per ancestor during upstream propagation, and once per
/// rule/group node by the schedule sweeper with a synthetic
/// `trigger` point so time-windowed conditions (`minActive`) advance even
/// without external input.
pub struct RuleEngine {
    store: Arc<dyn NodeStore>,
    bus: Arc<dyn Bus>,
}

impl RuleEngine {
    pub fn new(store: Arc<dyn NodeStore>, bus: Arc<dyn Bus>) -> Self {
        Self { store, bus }
    }

    /// Evaluate every rule that is a direct child of `parent_id`. `now`
    /// is the instant (nanoseconds, matching [`Point::time`]) against
    /// which `minActive` hysteresis is measured.
    pub async fn evaluate_children_of(&self, parent_id: Uuid, now: i64) -> RuleResult<()> {
        let rules = self
            .store
            .descendants(parent_id, Some(NodeType::Rule.as_str()), false, false)
            .await
            .map_err(|e| RuleError::Dispatch(e.to_string()))?;

        for rule in rules {
            self.evaluate_rule(&rule, now).await?;
        }
        Ok(())
    }

    async fn evaluate_rule(&self, rule: &Node, now: i64) -> RuleResult<()> {
        let conditions = self
            .store
            .descendants(rule.id, Some(NodeType::Condition.as_str()), false, false)
            .await
            .map_err(|e| RuleError::Dispatch(e.to_string()))?;

        // Tie-breaking: fixed evaluation order by condition node id,
        // lexicographic, for deterministic replay.
        let mut conditions = conditions;
        conditions.sort_by_key(|n| n.id);

        // An empty `nodeID` qualifier defaults to the rule's
        // own parent — the node whose points are actually propagating
        // through this rule.
        let default_scope = self
            .store
            .primary_parent(rule.id)
            .await
            .map_err(|e| RuleError::Dispatch(e.to_string()))?
            .unwrap_or(rule.id);

        let mut all_active = !conditions.is_empty();
        for condition_node in &conditions {
            let active = self
                .evaluate_condition(default_scope, condition_node, now)
                .await;
            all_active &= active;
        }

        let was_active = rule.value(point_types::ACTIVE, "").unwrap_or(0.0) != 0.0;
        if all_active == was_active {
            return Ok(());
        }

        self.store
            .merge_points(
                rule.id,
                vec![Point::new(point_types::ACTIVE, "", now).with_value(if all_active {
                    1.0
                } else {
                    0.0
                })],
            )
            .await
            .map_err(|e| RuleError::Dispatch(e.to_string()))?;

        if all_active {
            self.dispatch_edge(rule.id, NodeType::Action, NodeType::ActionInactive, now)
                .await?;
        } else {
            self.dispatch_edge(rule.id, NodeType::ActionInactive, NodeType::Action, now)
                .await?;
        }
        Ok(())
    }

    /// One condition's predicate evaluation plus `minActive` hysteresis.
    /// A malformed condition is treated as inactive and tagged with an
    /// error point, without aborting sibling conditions.
    async fn evaluate_condition(&self, default_scope: Uuid, node: &Node, now: i64) -> bool {
        let condition = match Condition::from_node(node, default_scope) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(condition = %node.id, error = %e, "malformed condition");
                let _ = self
                    .store
                    .merge_points(
                        node.id,
                        vec![Point::new(point_types::ERROR, "", now).with_text(e.to_string())],
                    )
                    .await;
                return false;
            }
        };

        let satisfied = self.predicate_satisfied(&condition).await;
        let active_start = node
            .get(point_types::ACTIVE_START, "")
            .filter(|p| !p.tombstone)
            .map(|p| p.time);

        let (active, next_start) = if satisfied {
            let start = active_start.unwrap_or(now);
            let elapsed_nanos = (now - start).max(0);
            let satisfied_for = Duration::from_nanos(elapsed_nanos as u64);
            (satisfied_for >= condition.min_active, Some(start))
        } else {
            (false, None)
        };

        let mut points = Vec::new();
        if next_start != active_start {
            match next_start {
                Some(start) => points.push(Point::new(point_types::ACTIVE_START, "", start)),
                None => points.push(
                    Point::new(point_types::ACTIVE_START, "", now)
                        .tombstoned(),
                ),
            }
        }
        if node.value(point_types::ACTIVE, "").unwrap_or(0.0) != (active as i32 as f64) {
            points.push(Point::new(point_types::ACTIVE, "", now).with_value(if active {
                1.0
            } else {
                0.0
            }));
        }
        if !points.is_empty() {
            let _ = self.store.merge_points(node.id, points).await;
        }

        active
    }

    async fn predicate_satisfied(&self, condition: &Condition) -> bool {
        let target = match self.store.node(condition.node_id).await {
            Ok(n) => n,
            Err(_) => return false,
        };
        condition.evaluate(&target)
    }

    /// Fire every action in `fire_group` (rate-limited by `repeatPeriod`)
    /// and reset every action in `reset_group` so it can fire on the next
    /// transition ("Action dispatch").
    async fn dispatch_edge(
        &self,
        rule_id: Uuid,
        fire_group: NodeType,
        reset_group: NodeType,
        now: i64,
    ) -> RuleResult<()> {
        let fire_nodes = self
            .store
            .descendants(rule_id, Some(fire_group.as_str()), false, false)
            .await
            .map_err(|e| RuleError::Dispatch(e.to_string()))?;
        for action_node in fire_nodes {
            self.fire_action(rule_id, &action_node, now).await?;
        }

        let reset_nodes = self
            .store
            .descendants(rule_id, Some(reset_group.as_str()), false, false)
            .await
            .map_err(|e| RuleError::Dispatch(e.to_string()))?;
        for action_node in reset_nodes {
            self.store
                .merge_points(
                    action_node.id,
                    vec![Point::new(point_types::LAST_SENT, "", now).tombstoned()],
                )
                .await
                .map_err(|e| RuleError::Dispatch(e.to_string()))?;
        }
        Ok(())
    }

    async fn fire_action(&self, rule_id: Uuid, node: &Node, now: i64) -> RuleResult<()> {
        let action = match Action::from_node(node) {
            Ok(a) => a,
            Err(e) => {
                tracing::warn!(action = %node.id, error = %e, "malformed action");
                return Ok(());
            }
        };

        let last_sent = node
            .get(point_types::LAST_SENT, "")
            .filter(|p| !p.tombstone)
            .map(|p| p.time);
        let elapsed_nanos = last_sent.map(|t| (now - t).max(0)).unwrap_or(i64::MAX);
        let repeat_period_nanos = (action.repeat_period.as_nanos() as i64).max(0);
        if last_sent.is_some() && elapsed_nanos < repeat_period_nanos {
            return Ok(());
        }

        if action.is_notification() {
            let notification = crate::notify::Notification {
                id: Uuid::new_v4(),
                source_node_id: rule_id,
                subject: action.point_type.clone(),
                body: action.value_text.clone(),
            };
            let payload = crate::proto_ext::encode_notification(&notification);
            self.bus
                .publish(&subjects::node_not(&rule_id.to_string()), payload)
                .await
                .map_err(|e| RuleError::Dispatch(e.to_string()))?;
        } else {
            let point = action.target_point(now);
            let payload = crate::proto_ext::encode_points(std::slice::from_ref(&point));
            self.bus
                .publish(&subjects::node_points(&action.node_id.to_string()), payload)
                .await
                .map_err(|e| RuleError::Dispatch(e.to_string()))?;
        }

        self.store
            .merge_points(
                node.id,
                vec![Point::new(point_types::LAST_SENT, "", now)],
            )
            .await
            .map_err(|e| RuleError::Dispatch(e.to_string()))?;
        Ok(())
    }
}
