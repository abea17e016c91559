use crate::graph::Graph;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_UID: AtomicU64 = AtomicU64::new(1);

/// Process-unique individual id, stable for the lifetime of the run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Uid(u64);

impl Uid {
    fn fresh() -> Self {
        Self(NEXT_UID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i{}", self.0)
    }
}

/// One or more objective values. A fitness is valid only when every
/// component is finite; NaN components mark a failed or timed-out
/// evaluation and exclude the individual from selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fitness {
    values: Vec<f64>,
}

impl Fitness {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn single(value: f64) -> Self {
        Self {
            values: vec![value],
        }
    }

    /// All-NaN fitness of the given arity, used to mark failed evaluations.
    pub fn invalid(num_objectives: usize) -> Self {
        Self {
            values: vec![f64::NAN; num_objectives.max(1)],
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_valid(&self) -> bool {
        !self.values.is_empty() && self.values.iter().all(|v| v.is_finite())
    }
}

impl fmt::Display for Fitness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.values.iter().map(|v| format!("{:.4}", v)).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Lineage record: which operator produced this individual from which
/// parents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParentOperator {
    pub operator: String,
    pub parent_uids: Vec<Uid>,
}

/// A candidate solution: one graph plus fitness, id and lineage. Operators
/// produce new individuals instead of mutating evaluated ones, so history
/// snapshots stay intact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Individual {
    uid: Uid,
    pub graph: Graph,
    fitness: Option<Fitness>,
    lineage: Vec<ParentOperator>,
    descriptive_id: String,
    pub metadata: BTreeMap<String, String>,
}

impl Individual {
    pub fn new(graph: Graph) -> Self {
        let descriptive_id = graph
            .fingerprint()
            .unwrap_or_else(|e| format!("<unrooted:{}>", e));
        Self {
            uid: Uid::fresh(),
            graph,
            fitness: None,
            lineage: Vec::new(),
            descriptive_id,
            metadata: BTreeMap::new(),
        }
    }

    /// New individual produced by a genetic operator, inheriting lineage
    /// from its parents.
    pub fn from_parents(graph: Graph, operator: &str, parents: &[&Individual]) -> Self {
        let mut individual = Self::new(graph);
        let mut lineage: Vec<ParentOperator> = parents
            .iter()
            .flat_map(|p| p.lineage.iter().cloned())
            .collect();
        lineage.push(ParentOperator {
            operator: operator.to_string(),
            parent_uids: parents.iter().map(|p| p.uid).collect(),
        });
        individual.lineage = lineage;
        individual
    }

    pub fn uid(&self) -> Uid {
        self.uid
    }

    pub fn fitness(&self) -> Option<&Fitness> {
        self.fitness.as_ref()
    }

    pub fn set_fitness(&mut self, fitness: Fitness) {
        self.fitness = Some(fitness);
    }

    pub fn has_valid_fitness(&self) -> bool {
        self.fitness.as_ref().map(Fitness::is_valid).unwrap_or(false)
    }

    pub fn lineage(&self) -> &[ParentOperator] {
        &self.lineage
    }

    /// Cached structural fingerprint of the owned graph.
    pub fn fingerprint(&self) -> &str {
        &self.descriptive_id
    }
}

/// Individuals of one generation; insertion order is the only meaningful
/// order.
pub type Population = Vec<Individual>;
