use crate::config::GraphRequirements;
use crate::error::{EvoGraphError, Result};
use crate::evolution::individual::{Individual, Population};
use crate::graph::{Graph, GraphVerifier, NodeId};
use crate::types::NodeContent;
use log::warn;
use rand::rngs::StdRng;
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;

/// Attempt ceiling for filling the initial population. Exhausting it is not
/// fatal: the run proceeds with whatever was produced.
pub const MAX_GENERATION_ATTEMPTS: usize = 1000;

/// Caller-supplied graph factory for initial population strategies.
pub type GenerationFunction = Arc<dyn Fn(&mut StdRng) -> Result<Graph> + Send + Sync>;

fn random_operation<R: Rng + ?Sized>(operations: &[String], rng: &mut R) -> Result<NodeContent> {
    if operations.is_empty() {
        return Err(EvoGraphError::Configuration(
            "cannot draw from an empty operation set".to_string(),
        ));
    }
    let name = operations[rng.gen_range(0..operations.len())].clone();
    Ok(NodeContent::new(name))
}

fn grow_node<R: Rng + ?Sized>(
    graph: &mut Graph,
    requirements: &GraphRequirements,
    depth_budget: usize,
    rng: &mut R,
) -> Result<NodeId> {
    let make_leaf = depth_budget <= 1 || rng.gen::<f64>() < 0.2;
    if make_leaf {
        let content = random_operation(&requirements.primary_operations, rng)?;
        return graph.add_node(content, &[]);
    }
    let arity = rng.gen_range(1..=requirements.max_arity.max(1));
    let mut parents = Vec::with_capacity(arity);
    for _ in 0..arity {
        parents.push(grow_node(graph, requirements, depth_budget - 1, rng)?);
    }
    let content = random_operation(&requirements.secondary_operations, rng)?;
    graph.add_node(content, &parents)
}

/// Randomized tree growth bounded by a depth budget: leaves draw from the
/// primary operation set, inner nodes from the secondary one.
pub fn random_graph<R: Rng + ?Sized>(
    requirements: &GraphRequirements,
    max_depth: usize,
    rng: &mut R,
) -> Result<Graph> {
    let mut graph = Graph::new();
    grow_node(&mut graph, requirements, max_depth.max(1), rng)?;
    Ok(graph)
}

/// Produces a starting population via, in priority order: explicit seed
/// graphs, a caller-supplied generation function, or randomized growth.
pub struct InitialPopulationGenerator {
    verifier: Arc<GraphVerifier>,
    initial_graphs: Option<Vec<Graph>>,
    generation_function: Option<GenerationFunction>,
}

impl InitialPopulationGenerator {
    pub fn new(verifier: Arc<GraphVerifier>) -> Self {
        Self {
            verifier,
            initial_graphs: None,
            generation_function: None,
        }
    }

    /// Use explicit seed graphs, truncated to the population size if
    /// oversupplied.
    pub fn with_initial_graphs(mut self, graphs: Vec<Graph>) -> Self {
        self.initial_graphs = Some(graphs);
        self
    }

    pub fn with_generation_function(mut self, function: GenerationFunction) -> Self {
        self.generation_function = Some(function);
        self
    }

    pub fn generate(&self, pop_size: usize, start_depth: usize, rng: &mut StdRng) -> Population {
        if let Some(seeds) = &self.initial_graphs {
            let mut population = Population::new();
            for graph in seeds.iter().take(pop_size) {
                match self.verifier.verify(graph) {
                    Ok(()) => population.push(Individual::new(graph.clone())),
                    Err(error) => warn!("skipping invalid seed graph: {}", error),
                }
            }
            return population;
        }

        let mut population = Population::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut attempts = 0;
        while population.len() < pop_size && attempts < MAX_GENERATION_ATTEMPTS {
            attempts += 1;
            let candidate = match &self.generation_function {
                Some(function) => function(rng),
                None => random_graph(self.verifier.requirements(), start_depth, rng),
            };
            let graph = match candidate {
                Ok(graph) => graph,
                Err(error) => {
                    warn!("initial graph generation failed: {}", error);
                    continue;
                }
            };
            if !self.verifier.is_valid(&graph) {
                continue;
            }
            match graph.fingerprint() {
                Ok(fingerprint) => {
                    if seen.insert(fingerprint) {
                        population.push(Individual::new(graph));
                    }
                }
                Err(error) => warn!("unfingerprintable candidate skipped: {}", error),
            }
        }
        if population.len() < pop_size {
            warn!(
                "exceeded {} attempts while generating initial graphs, produced {} of {}",
                MAX_GENERATION_ATTEMPTS,
                population.len(),
                pop_size
            );
        }
        population
    }
}
