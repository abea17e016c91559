use crate::types::NodeContent;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Arena index of a node inside its owning graph. Ids are only meaningful
/// within one graph and may be remapped by structural edits; never hold one
/// across a mutating operation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// One step of a candidate pipeline: operation content plus the ordered list
/// of input nodes ("parents"). A node without parents is a primary node; it
/// consumes raw task data. Nodes with parents are secondary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub(crate) id: NodeId,
    pub content: NodeContent,
    pub(crate) parents: Vec<NodeId>,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parents(&self) -> &[NodeId] {
        &self.parents
    }

    pub fn is_primary(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn operation_name(&self) -> &str {
        &self.content.name
    }
}
