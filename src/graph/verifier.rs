use crate::config::GraphRequirements;
use crate::error::{EvoGraphError, Result};
use crate::graph::Graph;
use std::fmt;
use std::sync::Arc;

/// A single named predicate over a candidate graph. Returns a reason string
/// on rejection.
pub struct VerificationRule {
    name: String,
    check: Arc<dyn Fn(&Graph, &GraphRequirements) -> std::result::Result<(), String> + Send + Sync>,
}

impl VerificationRule {
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Graph, &GraphRequirements) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Clone for VerificationRule {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            check: Arc::clone(&self.check),
        }
    }
}

impl fmt::Debug for VerificationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationRule")
            .field("name", &self.name)
            .finish()
    }
}

/// Conjunction of verification rules, evaluated short-circuit. The first
/// failing rule determines the rejection; rejected candidates are discarded
/// before evaluation and never receive a fitness penalty.
#[derive(Debug, Clone)]
pub struct GraphVerifier {
    requirements: GraphRequirements,
    rules: Vec<VerificationRule>,
}

impl GraphVerifier {
    /// Verifier with the baseline rule set.
    pub fn new(requirements: GraphRequirements) -> Self {
        Self {
            requirements,
            rules: baseline_rules(),
        }
    }

    /// Append task-specific rules after the baseline set.
    pub fn with_rules(mut self, rules: Vec<VerificationRule>) -> Self {
        self.rules.extend(rules);
        self
    }

    pub fn requirements(&self) -> &GraphRequirements {
        &self.requirements
    }

    pub fn update_requirements(&mut self, requirements: GraphRequirements) {
        self.requirements = requirements;
    }

    pub fn verify(&self, graph: &Graph) -> Result<()> {
        for rule in &self.rules {
            if let Err(reason) = (rule.check)(graph, &self.requirements) {
                return Err(EvoGraphError::Verification {
                    rule: rule.name.clone(),
                    reason,
                });
            }
        }
        Ok(())
    }

    pub fn is_valid(&self, graph: &Graph) -> bool {
        self.verify(graph).is_ok()
    }
}

fn baseline_rules() -> Vec<VerificationRule> {
    vec![
        VerificationRule::new("has_one_root", |graph, _| {
            graph.root().map(|_| ()).map_err(|e| e.to_string())
        }),
        VerificationRule::new("has_no_cycle", |graph, _| {
            if graph.has_cycle() {
                Err("graph contains a cycle".to_string())
            } else {
                Ok(())
            }
        }),
        VerificationRule::new("has_no_self_cycled_nodes", |graph, _| {
            for node in graph.nodes() {
                if node.parents().contains(&node.id()) {
                    return Err(format!("node {} consumes itself", node.id()));
                }
            }
            Ok(())
        }),
        VerificationRule::new("has_no_isolated_nodes", |graph, _| {
            let root = graph.root().map_err(|e| e.to_string())?;
            let reachable = graph.subtree_ids(root).len();
            if reachable != graph.len() {
                Err(format!(
                    "{} of {} nodes unreachable from root",
                    graph.len() - reachable,
                    graph.len()
                ))
            } else {
                Ok(())
            }
        }),
        VerificationRule::new("has_primary_nodes_at_leaves_only", |graph, requirements| {
            for node in graph.nodes() {
                let name = node.operation_name();
                if node.is_primary() {
                    if !requirements.is_primary_operation(name) {
                        return Err(format!(
                            "leaf node {} holds non-primary operation '{}'",
                            node.id(),
                            name
                        ));
                    }
                } else if !requirements.is_secondary_operation(name) {
                    return Err(format!(
                        "inner node {} holds non-secondary operation '{}'",
                        node.id(),
                        name
                    ));
                }
            }
            Ok(())
        }),
        VerificationRule::new("is_within_arity_limit", |graph, requirements| {
            for node in graph.nodes() {
                if node.parents().len() > requirements.max_arity {
                    return Err(format!(
                        "node {} has {} parents, limit {}",
                        node.id(),
                        node.parents().len(),
                        requirements.max_arity
                    ));
                }
            }
            Ok(())
        }),
        VerificationRule::new("is_within_depth_limit", |graph, requirements| {
            let depth = graph.depth();
            if depth > requirements.max_depth {
                Err(format!(
                    "depth {} exceeds limit {}",
                    depth, requirements.max_depth
                ))
            } else {
                Ok(())
            }
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeContent;

    fn requirements() -> GraphRequirements {
        GraphRequirements {
            primary_operations: vec!["scale".to_string(), "lag".to_string()],
            secondary_operations: vec!["model".to_string(), "blend".to_string()],
            max_arity: 2,
            max_depth: 4,
            start_depth: 3,
        }
    }

    fn chain() -> Graph {
        let mut g = Graph::new();
        let leaf = g.add_node(NodeContent::new("scale"), &[]).unwrap();
        g.add_node(NodeContent::new("model"), &[leaf]).unwrap();
        g
    }

    #[test]
    fn test_valid_chain_passes() {
        let verifier = GraphVerifier::new(requirements());
        assert!(verifier.verify(&chain()).is_ok());
    }

    #[test]
    fn test_primary_operation_in_inner_position_rejected() {
        let mut g = Graph::new();
        let leaf = g.add_node(NodeContent::new("scale"), &[]).unwrap();
        g.add_node(NodeContent::new("lag"), &[leaf]).unwrap();
        let verifier = GraphVerifier::new(requirements());
        let err = verifier.verify(&g).unwrap_err();
        match err {
            EvoGraphError::Verification { rule, .. } => {
                assert_eq!(rule, "has_primary_nodes_at_leaves_only")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_two_roots_rejected() {
        let mut g = Graph::new();
        g.add_node(NodeContent::new("scale"), &[]).unwrap();
        g.add_node(NodeContent::new("lag"), &[]).unwrap();
        let verifier = GraphVerifier::new(requirements());
        assert!(!verifier.is_valid(&g));
    }

    #[test]
    fn test_excess_arity_rejected() {
        let mut g = Graph::new();
        let a = g.add_node(NodeContent::new("scale"), &[]).unwrap();
        let b = g.add_node(NodeContent::new("lag"), &[]).unwrap();
        let c = g.add_node(NodeContent::new("scale"), &[]).unwrap();
        g.add_node(NodeContent::new("model"), &[a, b, c]).unwrap();
        let verifier = GraphVerifier::new(requirements());
        assert!(!verifier.is_valid(&g));
    }

    #[test]
    fn test_depth_limit_rejected() {
        let mut g = Graph::new();
        let mut below = g.add_node(NodeContent::new("scale"), &[]).unwrap();
        for _ in 0..4 {
            below = g.add_node(NodeContent::new("model"), &[below]).unwrap();
        }
        let verifier = GraphVerifier::new(requirements());
        assert!(!verifier.is_valid(&g));
    }

    #[test]
    fn test_task_specific_rule_appended() {
        let rule = VerificationRule::new("root_is_model", |graph: &Graph, _: &GraphRequirements| {
            let root = graph.root().map_err(|e| e.to_string())?;
            let node = graph.node(root).map_err(|e| e.to_string())?;
            if node.operation_name() == "model" {
                Ok(())
            } else {
                Err(format!("root holds '{}'", node.operation_name()))
            }
        });
        let verifier = GraphVerifier::new(requirements()).with_rules(vec![rule]);
        assert!(verifier.is_valid(&chain()));

        let single = Graph::single(NodeContent::new("scale"));
        assert!(!verifier.is_valid(&single));
    }

    #[test]
    fn test_short_circuit_reports_first_failure() {
        let mut g = Graph::new();
        g.add_node(NodeContent::new("scale"), &[]).unwrap();
        g.add_node(NodeContent::new("scale"), &[]).unwrap();
        let verifier = GraphVerifier::new(requirements());
        match verifier.verify(&g).unwrap_err() {
            EvoGraphError::Verification { rule, .. } => assert_eq!(rule, "has_one_root"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
