use crate::error::{EvoGraphError, Result};
use crate::evolution::individual::Fitness;
use crate::evolution::pareto::{self, OptimizationDirection};
use crate::graph::Graph;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;

/// One objective: a metric name, its optimisation direction and its weight
/// in scalar aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectiveMetric {
    pub name: String,
    pub direction: OptimizationDirection,
    pub weight: f64,
}

impl ObjectiveMetric {
    pub fn new(name: impl Into<String>, direction: OptimizationDirection) -> Self {
        Self {
            name: name.into(),
            direction,
            weight: 1.0,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}

/// The full objective of a run. A single metric gives scalar optimisation;
/// several switch selection and archiving to Pareto semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Objective {
    metrics: Vec<ObjectiveMetric>,
}

impl Objective {
    pub fn new(metrics: Vec<ObjectiveMetric>) -> Result<Self> {
        if metrics.is_empty() {
            return Err(EvoGraphError::Configuration(
                "objective needs at least one metric".to_string(),
            ));
        }
        Ok(Self { metrics })
    }

    pub fn single(name: impl Into<String>, direction: OptimizationDirection) -> Self {
        Self {
            metrics: vec![ObjectiveMetric::new(name, direction)],
        }
    }

    pub fn metrics(&self) -> &[ObjectiveMetric] {
        &self.metrics
    }

    pub fn metric_names(&self) -> Vec<&str> {
        self.metrics.iter().map(|m| m.name.as_str()).collect()
    }

    pub fn num_objectives(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_multi_objective(&self) -> bool {
        self.metrics.len() > 1
    }

    pub fn directions(&self) -> Vec<OptimizationDirection> {
        self.metrics.iter().map(|m| m.direction).collect()
    }

    /// Weighted scalar rank where greater is always better, regardless of
    /// the underlying directions. NaN components rank below everything.
    pub fn scalar_rank(&self, fitness: &Fitness) -> f64 {
        if !fitness.is_valid() || fitness.len() != self.metrics.len() {
            return f64::NEG_INFINITY;
        }
        fitness
            .values()
            .iter()
            .zip(&self.metrics)
            .map(|(value, metric)| {
                let signed = match metric.direction {
                    OptimizationDirection::Maximize => *value,
                    OptimizationDirection::Minimize => -*value,
                };
                signed * metric.weight
            })
            .sum()
    }

    /// Pareto dominance between two fitness vectors under this objective.
    pub fn dominates(&self, a: &Fitness, b: &Fitness) -> bool {
        if !a.is_valid() || !b.is_valid() {
            return false;
        }
        pareto::dominates(a.values(), b.values(), &self.directions())
    }

    /// Total order for single-objective ranking; greater means better.
    pub fn compare(&self, a: &Fitness, b: &Fitness) -> Ordering {
        self.scalar_rank(a)
            .partial_cmp(&self.scalar_rank(b))
            .unwrap_or(Ordering::Equal)
    }
}

/// External scoring boundary: a pure function from graph to fitness,
/// callable from worker threads.
pub type ObjectiveFunction = Arc<dyn Fn(&Graph) -> Result<Fitness> + Send + Sync>;
