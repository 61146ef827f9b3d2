//! Node-and-point data model.

mod node;
mod point;

pub use node::{EdgePointSet, Node, NodeType, PointSet, ROOT_NODE_ID, ROOT_PARENT};
pub use point::{types as point_types, EdgePoint, Point};
