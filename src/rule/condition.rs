//! Condition node: a predicate over descendant points with optional
//! sustain duration.

use std::time::Duration;

use uuid::Uuid;

use super::RuleError;
use crate::model::Node;

/// The kind of value a condition/action compares, mirroring the point's
/// own typing (number vs. text vs. boolean-as-number).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Number,
    Text,
    OnOff,
}

impl ValueType {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "number" => Some(Self::Number),
            "text" => Some(Self::Text),
            "onOff" => Some(Self::OnOff),
            _ => None,
        }
    }
}

/// Comparison operator; the legal set depends on [`ValueType`]: number
/// accepts `>`,`<`,`=`,`!=`; text accepts `=`,`!=`,`contains`; on/off
/// accepts `on`,`off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    GreaterThan,
    LessThan,
    Equal,
    NotEqual,
    Contains,
    On,
    Off,
}

impl Operator {
    fn parse(value_type: ValueType, s: &str) -> Option<Self> {
        match (value_type, s) {
            (ValueType::Number, ">") => Some(Self::GreaterThan),
            (ValueType::Number, "<") => Some(Self::LessThan),
            (ValueType::Number, "=") => Some(Self::Equal),
            (ValueType::Number, "!=") => Some(Self::NotEqual),
            (ValueType::Text, "=") => Some(Self::Equal),
            (ValueType::Text, "!=") => Some(Self::NotEqual),
            (ValueType::Text, "contains") => Some(Self::Contains),
            (ValueType::OnOff, "on") => Some(Self::On),
            (ValueType::OnOff, "off") => Some(Self::Off),
            _ => None,
        }
    }
}

/// A typed view over a generic `condition`-type [`Node`]'s point set:
/// no inheritance, just a constructor reading specific `(type,key)`
/// slots on demand.
pub struct Condition {
    pub id: Uuid,
    pub node_id: Uuid,
    pub point_type: String,
    pub point_key: String,
    pub value_type: ValueType,
    pub operator: Operator,
    pub value_number: f64,
    pub value_text: String,
    pub min_active: Duration,
}

impl Condition {
    /// Build a condition from its node, defaulting an empty `nodeID`
    /// qualifier to `default_node_id` ("empty = any descendant
    /// of the rule's parent in the propagation path").
    pub fn from_node(node: &Node, default_node_id: Uuid) -> Result<Self, RuleError> {
        let err = |msg: &str| RuleError::MalformedCondition(node.id, msg.to_string());

        let node_id = match node.text("nodeID", "").unwrap_or("") {
            "" => default_node_id,
            s => Uuid::parse_str(s).map_err(|_| err("invalid nodeID"))?,
        };
        let point_type = node.text("pointType", "").unwrap_or("").to_string();
        let point_key = node.text("pointKey", "").unwrap_or("").to_string();

        let value_type = ValueType::parse(node.text("valueType", "").unwrap_or(""))
            .ok_or_else(|| err("missing or invalid valueType"))?;
        let operator = Operator::parse(value_type, node.text("operator", "").unwrap_or(""))
            .ok_or_else(|| err("operator does not match valueType"))?;

        let value_number = node.value("valueNumber", "").unwrap_or(0.0);
        let value_text = node.text("valueText", "").unwrap_or("").to_string();
        let min_active_secs = node.value("minActive", "").unwrap_or(0.0).max(0.0);

        Ok(Self {
            id: node.id,
            node_id,
            point_type,
            point_key,
            value_type,
            operator,
            value_number,
            value_text,
            min_active: Duration::from_secs_f64(min_active_secs),
        })
    }

    /// Evaluate the predicate against `target`'s current point state
    /// (does not account for `minActive` — the caller layers hysteresis
    /// on top using persisted `activeStart`).
    pub fn evaluate(&self, target: &Node) -> bool {
        let Some(point) = target.get(&self.point_type, &self.point_key) else {
            return false;
        };

        match self.value_type {
            ValueType::Number => match self.operator {
                Operator::GreaterThan => point.value > self.value_number,
                Operator::LessThan => point.value < self.value_number,
                Operator::Equal => point.value == self.value_number,
                Operator::NotEqual => point.value != self.value_number,
                _ => false,
            },
            ValueType::Text => match self.operator {
                Operator::Equal => point.text == self.value_text,
                Operator::NotEqual => point.text != self.value_text,
                Operator::Contains => point.text.contains(&self.value_text),
                _ => false,
            },
            ValueType::OnOff => match self.operator {
                Operator::On => point.is_on(),
                Operator::Off => !point.is_on(),
                _ => false,
            },
        }
    }
}
