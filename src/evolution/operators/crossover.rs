use crate::config::GraphRequirements;
use crate::error::Result;
use crate::evolution::individual::{Individual, Population};
use crate::evolution::operators::MAX_OPERATOR_ATTEMPTS;
use crate::graph::{Graph, GraphVerifier};
use log::debug;
use rand::rngs::StdRng;
use rand::Rng;
use std::sync::Arc;

/// Subtree crossover. The population is split into consecutive pairs; each
/// pair passes a probability gate and then swaps two depth-compatible
/// subtrees. Children that fail verification are discarded and the parents
/// returned unchanged.
pub struct Crossover {
    prob: f64,
    requirements: GraphRequirements,
    verifier: Arc<GraphVerifier>,
}

impl Crossover {
    pub fn new(prob: f64, requirements: GraphRequirements, verifier: Arc<GraphVerifier>) -> Self {
        Self {
            prob,
            requirements,
            verifier,
        }
    }

    pub fn update_requirements(&mut self, requirements: GraphRequirements) {
        self.requirements = requirements;
    }

    pub fn apply_population(&self, population: &[Individual], rng: &mut StdRng) -> Population {
        let mut offspring = Population::new();
        for pair in population.chunks(2) {
            if pair.len() == 2 {
                let (a, b) = self.apply_pair(&pair[0], &pair[1], rng);
                offspring.push(a);
                offspring.push(b);
            } else {
                offspring.push(pair[0].clone());
            }
        }
        offspring
    }

    /// Cross one pair, falling back to the unchanged parents when the gate
    /// is not passed or no compatible subtree swap is found.
    pub fn apply_pair(
        &self,
        first: &Individual,
        second: &Individual,
        rng: &mut StdRng,
    ) -> (Individual, Individual) {
        if rng.gen::<f64>() >= self.prob {
            return (first.clone(), second.clone());
        }
        if first.graph.len() <= 1 && second.graph.len() <= 1 {
            return (first.clone(), second.clone());
        }

        for _ in 0..MAX_OPERATOR_ATTEMPTS {
            match self.try_swap(&first.graph, &second.graph, rng) {
                Ok(Some((child_a, child_b))) => {
                    if !self.verifier.is_valid(&child_a) || !self.verifier.is_valid(&child_b) {
                        continue;
                    }
                    let changed = !child_a.equivalent(&first.graph)
                        || !child_b.equivalent(&second.graph);
                    if !changed {
                        continue;
                    }
                    let parents = [first, second];
                    return (
                        Individual::from_parents(child_a, "subtree_crossover", &parents),
                        Individual::from_parents(child_b, "subtree_crossover", &parents),
                    );
                }
                Ok(None) => continue,
                Err(error) => {
                    debug!("crossover attempt failed structurally: {}", error);
                    continue;
                }
            }
        }
        (first.clone(), second.clone())
    }

    /// Pick one node in each graph whose subtrees can be exchanged without
    /// blowing the depth budget, and swap them.
    fn try_swap(
        &self,
        graph_a: &Graph,
        graph_b: &Graph,
        rng: &mut StdRng,
    ) -> Result<Option<(Graph, Graph)>> {
        let ids_a = graph_a.node_ids();
        let ids_b = graph_b.node_ids();
        let node_a = ids_a[rng.gen_range(0..ids_a.len())];
        let node_b = ids_b[rng.gen_range(0..ids_b.len())];

        let max_depth = self.requirements.max_depth;
        let depth_a = graph_a.distance_from_root(node_a)?;
        let depth_b = graph_b.distance_from_root(node_b)?;
        if depth_a + graph_b.height(node_b) > max_depth
            || depth_b + graph_a.height(node_a) > max_depth
        {
            return Ok(None);
        }

        let subtree_a = graph_a.subtree_graph(node_a)?;
        let subtree_b = graph_b.subtree_graph(node_b)?;

        let mut child_a = graph_a.clone();
        child_a.update_subtree(node_a, &subtree_b)?;
        let mut child_b = graph_b.clone();
        child_b.update_subtree(node_b, &subtree_a)?;
        Ok(Some((child_a, child_b)))
    }
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
            max_depth: 5,
            start_depth: 3,
        }
    }

    fn crossover(prob: f64) -> Crossover {
        let requirements = requirements();
        let verifier = Arc::new(GraphVerifier::new(requirements.clone()));
        Crossover::new(prob, requirements, verifier)
    }

    fn chain(leaf: &str, inner: &str) -> Individual {
        let mut g = Graph::new();
        let id = g.add_node(NodeContent::new(leaf), &[]).unwrap();
        g.add_node(NodeContent::new(inner), &[id]).unwrap();
        Individual::new(g)
    }

    #[test]
    fn test_zero_probability_returns_parents_unchanged() {
        let a = chain("scale", "model");
        let b = chain("lag", "blend");
        let operator = crossover(0.0);
        let mut rng = rand::SeedableRng::seed_from_u64(1);
        for _ in 0..20 {
            let (ca, cb) = operator.apply_pair(&a, &b, &mut rng);
            assert_eq!(ca.uid(), a.uid());
            assert_eq!(cb.uid(), b.uid());
            assert!(ca.graph.equivalent(&a.graph));
            assert!(cb.graph.equivalent(&b.graph));
        }
    }

    #[test]
    fn test_certain_probability_changes_structures() {
        let a = chain("scale", "model");
        let b = chain("lag", "blend");
        let operator = crossover(1.0);
        let mut rng = rand::SeedableRng::seed_from_u64(2);
        let (ca, cb) = operator.apply_pair(&a, &b, &mut rng);
        assert!(!ca.graph.equivalent(&a.graph) || !cb.graph.equivalent(&b.graph));
        assert_eq!(ca.lineage().len(), 1);
        assert_eq!(ca.lineage()[0].operator, "subtree_crossover");
        assert_eq!(ca.lineage()[0].parent_uids, vec![a.uid(), b.uid()]);
    }

    #[test]
    fn test_children_always_pass_verification() {
        let requirements = requirements();
        let verifier = GraphVerifier::new(requirements.clone());
        let operator = crossover(1.0);
        let mut rng = rand::SeedableRng::seed_from_u64(3);

        let mut population = Population::new();
        for i in 0..10 {
            let leaf = if i % 2 == 0 { "scale" } else { "lag" };
            let inner = if i % 2 == 0 { "model" } else { "blend" };
            population.push(chain(leaf, inner));
        }

        let offspring = operator.apply_population(&population, &mut rng);
        assert_eq!(offspring.len(), population.len());
        for child in &offspring {
            assert!(verifier.is_valid(&child.graph));
        }
    }

    #[test]
    fn test_single_node_parents_returned_unchanged() {
        let a = Individual::new(Graph::single(NodeContent::new("scale")));
        let b = Individual::new(Graph::single(NodeContent::new("lag")));
        let operator = crossover(1.0);
        let mut rng = rand::SeedableRng::seed_from_u64(4);
        let (ca, cb) = operator.apply_pair(&a, &b, &mut rng);
        assert_eq!(ca.uid(), a.uid());
        assert_eq!(cb.uid(), b.uid());
    }

    #[test]
    fn test_odd_population_keeps_last_parent() {
        let population = vec![
            chain("scale", "model"),
            chain("lag", "blend"),
            chain("scale", "blend"),
        ];
        let operator = crossover(1.0);
        let mut rng = rand::SeedableRng::seed_from_u64(5);
        let offspring = operator.apply_population(&population, &mut rng);
        assert_eq!(offspring.len(), 3);
        assert_eq!(offspring[2].uid(), population[2].uid());
    }
}
