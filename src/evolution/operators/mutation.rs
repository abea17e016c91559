use crate::config::GraphRequirements;
use crate::error::{EvoGraphError, Result};
use crate::evolution::generator::random_graph;
use crate::evolution::individual::{Individual, Population};
use crate::evolution::operators::MAX_OPERATOR_ATTEMPTS;
use crate::graph::{Graph, GraphVerifier, NodeId};
use crate::types::NodeContent;
use log::debug;
use rand::rngs::StdRng;
use rand::Rng;
use std::fmt;
use std::sync::Arc;

/// Caller-supplied graph transformation, e.g. wrapping a model path into a
/// residual-correction cascade. The result must still pass verification.
#[derive(Clone)]
pub struct CustomMutation {
    name: String,
    function: Arc<dyn Fn(&Graph, &GraphRequirements, &mut StdRng) -> Result<Graph> + Send + Sync>,
}

impl CustomMutation {
    pub fn new<F>(name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&Graph, &GraphRequirements, &mut StdRng) -> Result<Graph> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            function: Arc::new(function),
        }
    }
}

impl fmt::Debug for CustomMutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomMutation").field("name", &self.name).finish()
    }
}

#[derive(Debug, Clone)]
pub enum MutationType {
    /// Insert a node between an existing node and a parent, or grow a new
    /// leaf parent.
    SingleAdd,
    /// Add an edge between two existing compatible nodes.
    SingleEdge,
    /// Replace one node's operation, preserving its edges.
    SingleChange,
    /// Remove a node, splicing its children onto its parents.
    SingleDrop,
    /// Regrow a randomly chosen subtree.
    Growth,
    /// Truncate a randomly chosen subtree to a single leaf.
    Reduce,
    Custom(CustomMutation),
}

impl MutationType {
    pub fn name(&self) -> &str {
        match self {
            MutationType::SingleAdd => "single_add",
            MutationType::SingleEdge => "single_edge",
            MutationType::SingleChange => "single_change",
            MutationType::SingleDrop => "single_drop",
            MutationType::Growth => "growth",
            MutationType::Reduce => "reduce",
            MutationType::Custom(custom) => &custom.name,
        }
    }

    /// The standard structural variants.
    pub fn standard() -> Vec<MutationType> {
        vec![
            MutationType::SingleAdd,
            MutationType::SingleEdge,
            MutationType::SingleChange,
            MutationType::SingleDrop,
            MutationType::Growth,
            MutationType::Reduce,
        ]
    }
}

/// Mutation operator: one randomly chosen variant per individual, gated by
/// `mutation_prob`. A variant that cannot find a valid target within its
/// attempt budget leaves the individual unchanged instead of failing the
/// run.
pub struct Mutation {
    prob: f64,
    types: Vec<MutationType>,
    requirements: GraphRequirements,
    verifier: Arc<GraphVerifier>,
}

impl Mutation {
    pub fn new(prob: f64, requirements: GraphRequirements, verifier: Arc<GraphVerifier>) -> Self {
        Self {
            prob,
            types: MutationType::standard(),
            requirements,
            verifier,
        }
    }

    pub fn with_types(mut self, types: Vec<MutationType>) -> Self {
        if !types.is_empty() {
            self.types = types;
        }
        self
    }

    pub fn add_custom(&mut self, custom: CustomMutation) {
        self.types.push(MutationType::Custom(custom));
    }

    pub fn update_requirements(&mut self, requirements: GraphRequirements) {
        self.requirements = requirements;
    }

    pub fn apply_population(&self, population: &[Individual], rng: &mut StdRng) -> Population {
        population.iter().map(|i| self.apply(i, rng)).collect()
    }

    pub fn apply(&self, individual: &Individual, rng: &mut StdRng) -> Individual {
        let mutation_type = &self.types[rng.gen_range(0..self.types.len())];
        if rng.gen::<f64>() >= self.prob {
            return individual.clone();
        }

        for _ in 0..MAX_OPERATOR_ATTEMPTS {
            let mutated = match self.try_variant(mutation_type, &individual.graph, rng) {
                Ok(graph) => graph,
                Err(error) => {
                    debug!("{} attempt failed: {}", mutation_type.name(), error);
                    continue;
                }
            };
            if !self.verifier.is_valid(&mutated) {
                continue;
            }
            return Individual::from_parents(mutated, mutation_type.name(), &[individual]);
        }
        debug!(
            "{} exhausted its attempt budget, individual kept unchanged",
            mutation_type.name()
        );
        individual.clone()
    }

    fn try_variant(
        &self,
        mutation_type: &MutationType,
        graph: &Graph,
        rng: &mut StdRng,
    ) -> Result<Graph> {
        match mutation_type {
            MutationType::SingleAdd => self.single_add(graph, rng),
            MutationType::SingleEdge => self.single_edge(graph, rng),
            MutationType::SingleChange => self.single_change(graph, rng),
            MutationType::SingleDrop => self.single_drop(graph, rng),
            MutationType::Growth => self.growth(graph, rng),
            MutationType::Reduce => self.reduce(graph, rng),
            MutationType::Custom(custom) => (custom.function)(graph, &self.requirements, rng),
        }
    }

    fn random_node(&self, graph: &Graph, rng: &mut StdRng) -> Result<NodeId> {
        let ids = graph.node_ids();
        if ids.is_empty() {
            return Err(EvoGraphError::Structural("graph is empty".to_string()));
        }
        Ok(ids[rng.gen_range(0..ids.len())])
    }

    fn random_operation(&self, operations: &[String], rng: &mut StdRng) -> Result<NodeContent> {
        if operations.is_empty() {
            return Err(EvoGraphError::Configuration(
                "operation set is empty".to_string(),
            ));
        }
        Ok(NodeContent::new(
            operations[rng.gen_range(0..operations.len())].clone(),
        ))
    }

    fn single_add(&self, graph: &Graph, rng: &mut StdRng) -> Result<Graph> {
        let mut mutated = graph.clone();
        let target = self.random_node(&mutated, rng)?;
        let target_parents = mutated.node(target)?.parents().to_vec();

        if target_parents.is_empty() {
            // grow a leaf: the former leaf turns secondary and gains a
            // fresh primary parent
            let secondary = self.random_operation(&self.requirements.secondary_operations, rng)?;
            let primary = self.random_operation(&self.requirements.primary_operations, rng)?;
            let new_leaf = mutated.add_node(primary, &[])?;
            mutated.update_node(target, secondary)?;
            mutated.set_parents(target, vec![new_leaf])?;
            return Ok(mutated);
        }

        if rng.gen::<bool>() {
            // insert between the target and one of its parents
            let slot = rng.gen_range(0..target_parents.len());
            let content = self.random_operation(&self.requirements.secondary_operations, rng)?;
            let inserted = mutated.add_node(content, &[target_parents[slot]])?;
            let mut parents = target_parents;
            parents[slot] = inserted;
            mutated.set_parents(target, parents)?;
        } else {
            // attach a fresh primary parent
            let content = self.random_operation(&self.requirements.primary_operations, rng)?;
            let new_leaf = mutated.add_node(content, &[])?;
            let mut parents = target_parents;
            parents.push(new_leaf);
            mutated.set_parents(target, parents)?;
        }
        Ok(mutated)
    }

    fn single_edge(&self, graph: &Graph, rng: &mut StdRng) -> Result<Graph> {
        let mut mutated = graph.clone();
        let consumer = self.random_node(&mutated, rng)?;
        let supplier = self.random_node(&mutated, rng)?;
        let parents = mutated.node(consumer)?.parents().to_vec();
        if consumer == supplier || parents.is_empty() || parents.contains(&supplier) {
            return Err(EvoGraphError::Structural(
                "no compatible edge endpoints".to_string(),
            ));
        }
        if parents.len() >= self.requirements.max_arity {
            return Err(EvoGraphError::Structural(format!(
                "node {} is already at maximum arity",
                consumer
            )));
        }
        let mut parents = parents;
        parents.push(supplier);
        mutated.set_parents(consumer, parents)?;
        Ok(mutated)
    }

    fn single_change(&self, graph: &Graph, rng: &mut StdRng) -> Result<Graph> {
        let mut mutated = graph.clone();
        let target = self.random_node(&mutated, rng)?;
        let node = mutated.node(target)?;
        let pool = if node.is_primary() {
            &self.requirements.primary_operations
        } else {
            &self.requirements.secondary_operations
        };
        let current = node.operation_name().to_string();
        let alternatives: Vec<String> =
            pool.iter().filter(|op| **op != current).cloned().collect();
        if alternatives.is_empty() {
            return Err(EvoGraphError::Structural(format!(
                "no alternative operation for node {}",
                target
            )));
        }
        let replacement = alternatives[rng.gen_range(0..alternatives.len())].clone();
        mutated.update_node(target, NodeContent::new(replacement))?;
        Ok(mutated)
    }

    fn single_drop(&self, graph: &Graph, rng: &mut StdRng) -> Result<Graph> {
        let mut mutated = graph.clone();
        let target = self.random_node(&mutated, rng)?;
        mutated.delete_node(target)?;
        Ok(mutated)
    }

    fn growth(&self, graph: &Graph, rng: &mut StdRng) -> Result<Graph> {
        let mut mutated = graph.clone();
        let target = self.random_node(&mutated, rng)?;
        let occupied = mutated.distance_from_root(target)?;
        let budget = self.requirements.max_depth.saturating_sub(occupied).max(1);
        let replacement = random_graph(&self.requirements, budget, rng)?;
        mutated.update_subtree(target, &replacement)?;
        Ok(mutated)
    }

    fn reduce(&self, graph: &Graph, rng: &mut StdRng) -> Result<Graph> {
        let mut mutated = graph.clone();
        let target = self.random_node(&mutated, rng)?;
        if mutated.node(target)?.is_primary() {
            return Err(EvoGraphError::Structural(format!(
                "node {} is already a leaf",
                target
            )));
        }
        let leaf = self.random_operation(&self.requirements.primary_operations, rng)?;
        mutated.update_subtree(target, &Graph::single(leaf))?;
        Ok(mutated)
    }
}
