use crate::error::{EvoGraphError, Result};
use crate::graph::node::{Node, NodeId};
use crate::types::NodeContent;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Directed acyclic graph of operations, stored as an arena of nodes.
///
/// Edges point from a node to its parents (inputs). The root is the unique
/// node that no other node consumes. Structural edits (`update_node`,
/// `update_subtree`, `delete_node`, `delete_subtree`) are transactional:
/// they are applied to a scratch copy first, and if the result would break
/// acyclicity or the single-root property the original graph is left
/// untouched and a `Structural` error is returned.
///
/// `NodeId`s are arena indices and may be remapped by deletions; they must
/// not be held across mutating calls.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Graph {
    nodes: Vec<Node>,
}

impl Graph {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Single-node graph, the smallest valid pipeline.
    pub fn single(content: NodeContent) -> Self {
        let mut graph = Self::new();
        // cannot fail: no parents to resolve
        let _ = graph.add_node(content, &[]);
        graph
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| EvoGraphError::Structural(format!("unknown node {}", id)))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        (0..self.nodes.len()).map(NodeId).collect()
    }

    /// Append a node consuming the given parents. Construction is bottom-up,
    /// so a freshly added node never closes a cycle; parents must already
    /// exist in the arena.
    pub fn add_node(&mut self, content: NodeContent, parents: &[NodeId]) -> Result<NodeId> {
        for (i, parent) in parents.iter().enumerate() {
            if parent.0 >= self.nodes.len() {
                return Err(EvoGraphError::Structural(format!(
                    "parent {} does not exist",
                    parent
                )));
            }
            if parents[..i].contains(parent) {
                return Err(EvoGraphError::Structural(format!(
                    "duplicate parent {}",
                    parent
                )));
            }
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            id,
            content,
            parents: parents.to_vec(),
        });
        Ok(id)
    }

    /// Rewire a node's inputs. Fails without modifying the graph if a parent
    /// is missing, the node would consume itself, or a cycle would appear.
    pub fn set_parents(&mut self, id: NodeId, parents: Vec<NodeId>) -> Result<()> {
        self.node(id)?;
        for (i, parent) in parents.iter().enumerate() {
            if parent.0 >= self.nodes.len() {
                return Err(EvoGraphError::Structural(format!(
                    "parent {} does not exist",
                    parent
                )));
            }
            if *parent == id {
                return Err(EvoGraphError::Structural(format!(
                    "node {} cannot be its own parent",
                    id
                )));
            }
            if parents[..i].contains(parent) {
                return Err(EvoGraphError::Structural(format!(
                    "duplicate parent {}",
                    parent
                )));
            }
        }
        let previous = std::mem::replace(&mut self.nodes[id.0].parents, parents);
        if self.has_cycle() {
            self.nodes[id.0].parents = previous;
            return Err(EvoGraphError::Structural(format!(
                "rewiring {} would create a cycle",
                id
            )));
        }
        Ok(())
    }

    /// Replace a node's content in place, preserving all edges.
    pub fn update_node(&mut self, id: NodeId, content: NodeContent) -> Result<()> {
        self.node(id)?;
        self.nodes[id.0].content = content;
        Ok(())
    }

    /// Replace the subtree rooted at `old` with the given replacement graph.
    /// The replacement's root takes `old`'s place for every consumer; nodes
    /// of the old subtree that are not shared with the rest of the graph are
    /// dropped.
    pub fn update_subtree(&mut self, old: NodeId, replacement: &Graph) -> Result<()> {
        self.node(old)?;
        let repl_root = replacement.root()?;
        let original_root = self.root()?;

        let mut candidate = self.clone();
        let offset = candidate.nodes.len();
        for node in &replacement.nodes {
            let remapped: Vec<NodeId> = node.parents.iter().map(|p| NodeId(p.0 + offset)).collect();
            candidate.nodes.push(Node {
                id: NodeId(node.id.0 + offset),
                content: node.content.clone(),
                parents: remapped,
            });
        }
        let grafted_root = NodeId(repl_root.0 + offset);
        for node in candidate.nodes.iter_mut() {
            for parent in node.parents.iter_mut() {
                if *parent == old {
                    *parent = grafted_root;
                }
            }
        }
        let intended_root = if old == original_root {
            grafted_root
        } else {
            original_root
        };
        candidate.prune_unreachable(intended_root)?;
        candidate.check_invariants()?;
        *self = candidate;
        Ok(())
    }

    /// Delete a node, splicing its children directly onto its parents.
    pub fn delete_node(&mut self, id: NodeId) -> Result<()> {
        self.node(id)?;
        self.root()?;

        let mut candidate = self.clone();
        let spliced = candidate.nodes[id.0].parents.clone();
        for node in candidate.nodes.iter_mut() {
            if let Some(pos) = node.parents.iter().position(|p| *p == id) {
                node.parents.remove(pos);
                let mut insert_at = pos;
                for parent in &spliced {
                    if !node.parents.contains(parent) {
                        node.parents.insert(insert_at, *parent);
                        insert_at += 1;
                    }
                }
            }
        }
        candidate.remove_nodes(&HashSet::from([id]))?;
        candidate.check_invariants()?;
        *self = candidate;
        Ok(())
    }

    /// Delete a node together with every ancestor used by nothing else.
    pub fn delete_subtree(&mut self, id: NodeId) -> Result<()> {
        self.node(id)?;
        let root = self.root()?;
        if id == root {
            return Err(EvoGraphError::Structural(
                "cannot delete the subtree of the root node".to_string(),
            ));
        }

        let mut candidate = self.clone();
        for node in candidate.nodes.iter_mut() {
            node.parents.retain(|p| *p != id);
        }
        candidate.prune_unreachable(root)?;
        candidate.check_invariants()?;
        *self = candidate;
        Ok(())
    }

    /// The unique node without consumers. More than one candidate root is a
    /// hard structural error, as is an empty graph.
    pub fn root(&self) -> Result<NodeId> {
        let mut consumed = vec![false; self.nodes.len()];
        for node in &self.nodes {
            for parent in &node.parents {
                consumed[parent.0] = true;
            }
        }
        let mut roots = (0..self.nodes.len()).filter(|i| !consumed[*i]);
        match (roots.next(), roots.next()) {
            (Some(root), None) => Ok(NodeId(root)),
            (Some(a), Some(b)) => Err(EvoGraphError::Structural(format!(
                "graph has more than one root ({} and {})",
                NodeId(a),
                NodeId(b)
            ))),
            _ => Err(EvoGraphError::Structural("graph has no root".to_string())),
        }
    }

    /// Nodes that consume the given node.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.parents.contains(&id))
            .map(|n| n.id)
            .collect()
    }

    /// The node plus its transitive parents, in depth-first order.
    pub fn subtree_ids(&self, id: NodeId) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            order.push(current);
            if let Some(node) = self.nodes.get(current.0) {
                stack.extend(node.parents.iter().copied());
            }
        }
        order
    }

    /// Extract the subtree rooted at `id` as a standalone graph.
    pub fn subtree_graph(&self, id: NodeId) -> Result<Graph> {
        self.node(id)?;
        let members = self.subtree_ids(id);
        let member_set: HashSet<NodeId> = members.iter().copied().collect();
        let mut remap: HashMap<NodeId, NodeId> = HashMap::new();
        let mut extracted = Graph::new();
        // topological order: every parent precedes its consumer in the arena
        // rebuild, so walk members sorted by arena position after resolving
        // dependencies bottom-up
        let mut pending: Vec<NodeId> = members;
        while !pending.is_empty() {
            let mut progressed = false;
            pending.retain(|member| {
                let node = &self.nodes[member.0];
                let ready = node
                    .parents
                    .iter()
                    .filter(|p| member_set.contains(p))
                    .all(|p| remap.contains_key(p));
                if ready {
                    let parents: Vec<NodeId> = node
                        .parents
                        .iter()
                        .filter(|p| member_set.contains(p))
                        .map(|p| remap[p])
                        .collect();
                    let new_id = NodeId(extracted.nodes.len());
                    extracted.nodes.push(Node {
                        id: new_id,
                        content: node.content.clone(),
                        parents,
                    });
                    remap.insert(*member, new_id);
                    progressed = true;
                }
                !ready
            });
            if !progressed {
                return Err(EvoGraphError::Structural(format!(
                    "subtree of {} contains a cycle",
                    id
                )));
            }
        }
        Ok(extracted)
    }

    /// Longest node count on any path from `id` down to a leaf; a leaf has
    /// height 1.
    pub fn height(&self, id: NodeId) -> usize {
        let mut memo: HashMap<NodeId, usize> = HashMap::new();
        self.height_memo(id, &mut memo)
    }

    fn height_memo(&self, id: NodeId, memo: &mut HashMap<NodeId, usize>) -> usize {
        if let Some(cached) = memo.get(&id) {
            return *cached;
        }
        let result = 1 + self.nodes[id.0]
            .parents
            .iter()
            .map(|p| self.height_memo(*p, memo))
            .max()
            .unwrap_or(0);
        memo.insert(id, result);
        result
    }

    /// Graph depth: the longest root-to-leaf path, counted in nodes.
    pub fn depth(&self) -> usize {
        match self.root() {
            Ok(root) => self.height(root),
            Err(_) => 0,
        }
    }

    /// Longest edge count from the root down to the given node (root is 0).
    pub fn distance_from_root(&self, id: NodeId) -> Result<usize> {
        let root = self.root()?;
        let mut memo: HashMap<NodeId, usize> = HashMap::new();
        self.distance_memo(id, root, &mut memo)
            .ok_or_else(|| EvoGraphError::Structural(format!("{} unreachable from root", id)))
    }

    fn distance_memo(
        &self,
        id: NodeId,
        root: NodeId,
        memo: &mut HashMap<NodeId, usize>,
    ) -> Option<usize> {
        if id == root {
            return Some(0);
        }
        if let Some(cached) = memo.get(&id) {
            return Some(*cached);
        }
        let distance = self
            .children(id)
            .into_iter()
            .filter_map(|c| self.distance_memo(c, root, memo))
            .max()?
            + 1;
        memo.insert(id, distance);
        Some(distance)
    }

    /// Nodes at a given distance from the root.
    pub fn nodes_at_distance(&self, distance: usize) -> Vec<NodeId> {
        self.node_ids()
            .into_iter()
            .filter(|id| {
                self.distance_from_root(*id)
                    .map(|d| d == distance)
                    .unwrap_or(false)
            })
            .collect()
    }

    pub fn has_cycle(&self) -> bool {
        // iterative DFS with white/grey/black coloring over parent edges
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Grey,
            Black,
        }
        let mut colors = vec![Color::White; self.nodes.len()];
        for start in 0..self.nodes.len() {
            if colors[start] != Color::White {
                continue;
            }
            let mut stack = vec![(start, 0usize)];
            colors[start] = Color::Grey;
            while let Some((node, next_parent)) = stack.pop() {
                if next_parent < self.nodes[node].parents.len() {
                    stack.push((node, next_parent + 1));
                    let parent = self.nodes[node].parents[next_parent].0;
                    match colors[parent] {
                        Color::Grey => return true,
                        Color::White => {
                            colors[parent] = Color::Grey;
                            stack.push((parent, 0));
                        }
                        Color::Black => {}
                    }
                } else {
                    colors[node] = Color::Black;
                }
            }
        }
        false
    }

    /// Canonical structural fingerprint: topology plus node contents,
    /// independent of arena layout. Parent fingerprints are sorted, so two
    /// graphs built in different insertion orders compare equal.
    pub fn fingerprint(&self) -> Result<String> {
        if self.has_cycle() {
            return Err(EvoGraphError::Structural(
                "cannot fingerprint a cyclic graph".to_string(),
            ));
        }
        let root = self.root()?;
        let mut memo: HashMap<NodeId, String> = HashMap::new();
        Ok(self.fingerprint_memo(root, &mut memo))
    }

    fn fingerprint_memo(&self, id: NodeId, memo: &mut HashMap<NodeId, String>) -> String {
        if let Some(cached) = memo.get(&id) {
            return cached.clone();
        }
        let node = &self.nodes[id.0];
        let result = if node.parents.is_empty() {
            node.content.descriptive_id()
        } else {
            let mut parts: Vec<String> = node
                .parents
                .iter()
                .map(|p| self.fingerprint_memo(*p, memo))
                .collect();
            parts.sort();
            format!("({})/{}", parts.join(";"), node.content.descriptive_id())
        };
        memo.insert(id, result.clone());
        result
    }

    /// Structural equality by fingerprint.
    pub fn equivalent(&self, other: &Graph) -> bool {
        match (self.fingerprint(), other.fingerprint()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }

    /// Drop every node unreachable from the given root, remapping ids.
    fn prune_unreachable(&mut self, root: NodeId) -> Result<()> {
        self.node(root)?;
        let reachable: HashSet<NodeId> = self.subtree_ids(root).into_iter().collect();
        let doomed: HashSet<NodeId> = self
            .node_ids()
            .into_iter()
            .filter(|id| !reachable.contains(id))
            .collect();
        self.remove_nodes(&doomed)
    }

    /// Remove a set of nodes from the arena and remap all remaining ids.
    fn remove_nodes(&mut self, doomed: &HashSet<NodeId>) -> Result<()> {
        if doomed.is_empty() {
            return Ok(());
        }
        let mut remap: HashMap<NodeId, NodeId> = HashMap::new();
        let mut kept = Vec::with_capacity(self.nodes.len() - doomed.len());
        for node in &self.nodes {
            if !doomed.contains(&node.id) {
                remap.insert(node.id, NodeId(kept.len()));
                kept.push(node.clone());
            }
        }
        for (index, node) in kept.iter_mut().enumerate() {
            node.id = NodeId(index);
            for parent in node.parents.iter_mut() {
                *parent = *remap.get(parent).ok_or_else(|| {
                    EvoGraphError::Structural(format!(
                        "node {} still consumes a removed node",
                        node.id
                    ))
                })?;
            }
        }
        self.nodes = kept;
        Ok(())
    }

    /// Class invariants: consistent arena ids, acyclicity, a single root and
    /// full reachability from it.
    pub(crate) fn check_invariants(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(EvoGraphError::Structural("graph is empty".to_string()));
        }
        for (index, node) in self.nodes.iter().enumerate() {
            if node.id.0 != index {
                return Err(EvoGraphError::Structural(format!(
                    "arena id mismatch at index {}",
                    index
                )));
            }
            for parent in &node.parents {
                if parent.0 >= self.nodes.len() {
                    return Err(EvoGraphError::Structural(format!(
                        "node {} consumes missing node {}",
                        node.id, parent
                    )));
                }
                if *parent == node.id {
                    return Err(EvoGraphError::Structural(format!(
                        "node {} consumes itself",
                        node.id
                    )));
                }
            }
        }
        if self.has_cycle() {
            return Err(EvoGraphError::Structural("graph contains a cycle".to_string()));
        }
        let root = self.root()?;
        if self.subtree_ids(root).len() != self.nodes.len() {
            return Err(EvoGraphError::Structural(
                "graph contains nodes unreachable from the root".to_string(),
            ));
        }
        Ok(())
    }
}

impl PartialEq for Graph {
    fn eq(&self, other: &Self) -> bool {
        self.equivalent(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeContent;

    fn content(name: &str) -> NodeContent {
        NodeContent::new(name)
    }

    /// scale -> model, smooth -> model
    fn diamond_free_graph() -> Graph {
        let mut g = Graph::new();
        let scale = g.add_node(content("scale"), &[]).unwrap();
        let smooth = g.add_node(content("smooth"), &[]).unwrap();
        g.add_node(content("model"), &[scale, smooth]).unwrap();
        g
    }

    #[test]
    fn test_root_and_depth() {
        let g = diamond_free_graph();
        let root = g.root().unwrap();
        assert_eq!(g.node(root).unwrap().operation_name(), "model");
        assert_eq!(g.depth(), 2);
        assert_eq!(g.len(), 3);
    }

    #[test]
    fn test_two_roots_is_error() {
        let mut g = Graph::new();
        g.add_node(content("a"), &[]).unwrap();
        g.add_node(content("b"), &[]).unwrap();
        assert!(g.root().is_err());
    }

    #[test]
    fn test_delete_node_splices_children_to_parents() {
        let mut g = Graph::new();
        let leaf = g.add_node(content("scale"), &[]).unwrap();
        let mid = g.add_node(content("smooth"), &[leaf]).unwrap();
        g.add_node(content("model"), &[mid]).unwrap();

        g.delete_node(mid).unwrap();
        assert_eq!(g.len(), 2);
        let root = g.root().unwrap();
        let root_node = g.node(root).unwrap();
        assert_eq!(root_node.operation_name(), "model");
        assert_eq!(root_node.parents().len(), 1);
        let parent = g.node(root_node.parents()[0]).unwrap();
        assert_eq!(parent.operation_name(), "scale");
    }

    #[test]
    fn test_delete_node_on_two_node_chain() {
        let mut g = Graph::new();
        let leaf = g.add_node(content("scale"), &[]).unwrap();
        g.add_node(content("model"), &[leaf]).unwrap();

        g.delete_node(leaf).unwrap();
        assert_eq!(g.len(), 1);
        assert_eq!(
            g.node(g.root().unwrap()).unwrap().operation_name(),
            "model"
        );
    }

    #[test]
    fn test_failed_delete_leaves_graph_unchanged() {
        let mut g = Graph::single(content("model"));
        let root = g.root().unwrap();
        let before = g.fingerprint().unwrap();
        assert!(g.delete_node(root).is_err());
        assert_eq!(g.fingerprint().unwrap(), before);
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn test_delete_subtree_keeps_shared_parents() {
        let mut g = Graph::new();
        let shared = g.add_node(content("scale"), &[]).unwrap();
        let left = g.add_node(content("smooth"), &[shared]).unwrap();
        let right = g.add_node(content("lag"), &[shared]).unwrap();
        g.add_node(content("model"), &[left, right]).unwrap();

        g.delete_subtree(left).unwrap();
        assert_eq!(g.len(), 3);
        let names: Vec<&str> = g.nodes().map(|n| n.operation_name()).collect();
        assert!(names.contains(&"scale"));
        assert!(!names.contains(&"smooth"));
    }

    #[test]
    fn test_delete_subtree_of_root_is_error() {
        let mut g = diamond_free_graph();
        let root = g.root().unwrap();
        assert!(g.delete_subtree(root).is_err());
        assert_eq!(g.len(), 3);
    }

    #[test]
    fn test_update_subtree_swaps_branch() {
        let mut g = Graph::new();
        let leaf = g.add_node(content("scale"), &[]).unwrap();
        g.add_node(content("model"), &[leaf]).unwrap();

        let mut replacement = Graph::new();
        let r_leaf = replacement.add_node(content("lag"), &[]).unwrap();
        replacement.add_node(content("smooth"), &[r_leaf]).unwrap();

        g.update_subtree(leaf, &replacement).unwrap();
        assert_eq!(g.len(), 3);
        assert_eq!(g.depth(), 3);
        let names: Vec<&str> = g.nodes().map(|n| n.operation_name()).collect();
        assert!(names.contains(&"lag") && names.contains(&"smooth"));
        assert!(!names.contains(&"scale"));
    }

    #[test]
    fn test_update_subtree_at_root_replaces_whole_graph() {
        let mut g = diamond_free_graph();
        let root = g.root().unwrap();
        let replacement = Graph::single(content("fresh"));
        g.update_subtree(root, &replacement).unwrap();
        assert_eq!(g.len(), 1);
        assert_eq!(g.node(g.root().unwrap()).unwrap().operation_name(), "fresh");
    }

    #[test]
    fn test_set_parents_rejects_cycle() {
        let mut g = Graph::new();
        let leaf = g.add_node(content("scale"), &[]).unwrap();
        let root = g.add_node(content("model"), &[leaf]).unwrap();
        let before = g.fingerprint().unwrap();
        assert!(g.set_parents(leaf, vec![root]).is_err());
        assert_eq!(g.fingerprint().unwrap(), before);
    }

    #[test]
    fn test_fingerprint_independent_of_insertion_order() {
        let mut a = Graph::new();
        let scale = a.add_node(content("scale"), &[]).unwrap();
        let smooth = a.add_node(content("smooth"), &[]).unwrap();
        a.add_node(content("model"), &[scale, smooth]).unwrap();

        let mut b = Graph::new();
        let smooth = b.add_node(content("smooth"), &[]).unwrap();
        let scale = b.add_node(content("scale"), &[]).unwrap();
        b.add_node(content("model"), &[smooth, scale]).unwrap();

        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
        assert!(a.equivalent(&b));
    }

    #[test]
    fn test_fingerprint_distinguishes_params() {
        use crate::types::{OpParams, ParamValue};
        let mut params = OpParams::new();
        params.insert("window".into(), ParamValue::Integer(5));
        let a = Graph::single(NodeContent::with_params("smooth", params.clone()));
        params.insert("window".into(), ParamValue::Integer(7));
        let b = Graph::single(NodeContent::with_params("smooth", params));
        assert_ne!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    }

    #[test]
    fn test_subtree_graph_extraction() {
        let mut g = Graph::new();
        let leaf = g.add_node(content("scale"), &[]).unwrap();
        let mid = g.add_node(content("smooth"), &[leaf]).unwrap();
        g.add_node(content("model"), &[mid]).unwrap();

        let sub = g.subtree_graph(mid).unwrap();
        assert_eq!(sub.len(), 2);
        assert_eq!(sub.node(sub.root().unwrap()).unwrap().operation_name(), "smooth");
    }

    #[test]
    fn test_distance_from_root() {
        let mut g = Graph::new();
        let leaf = g.add_node(content("scale"), &[]).unwrap();
        let mid = g.add_node(content("smooth"), &[leaf]).unwrap();
        let root = g.add_node(content("model"), &[mid]).unwrap();
        assert_eq!(g.distance_from_root(root).unwrap(), 0);
        assert_eq!(g.distance_from_root(mid).unwrap(), 1);
        assert_eq!(g.distance_from_root(leaf).unwrap(), 2);
    }
}
