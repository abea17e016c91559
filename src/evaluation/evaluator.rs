use crate::error::EvoGraphError;
use crate::evaluation::cache::{CachedEvaluation, EvaluationCache};
use crate::evaluation::objective::{Objective, ObjectiveFunction};
use crate::evolution::individual::{Fitness, Population};
use crate::graph::Graph;
use log::{debug, warn};
use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Outcome of one worker evaluation, returned by value to the control loop.
struct WorkerResult {
    fingerprint: String,
    fitness: Fitness,
    elapsed: Duration,
    evaluated: bool,
}

/// Maps graphs to fitness via the external scoring function, with
/// at-most-once-per-fingerprint caching and per-individual time budgets.
///
/// Evaluation of a generation is the only concurrent phase: distinct
/// structures are dispatched to the rayon pool, workers receive immutable
/// graph snapshots and return results by value, and the cache is written
/// back only on the control thread.
pub struct ObjectiveEvaluator {
    objective: Objective,
    function: ObjectiveFunction,
    eval_timeout: Option<Duration>,
    deadline: Option<Instant>,
    cache: EvaluationCache,
    evaluations: AtomicU64,
}

impl ObjectiveEvaluator {
    pub fn new(objective: Objective, function: ObjectiveFunction) -> Self {
        Self {
            objective,
            function,
            eval_timeout: None,
            deadline: None,
            cache: EvaluationCache::new(),
            evaluations: AtomicU64::new(0),
        }
    }

    pub fn with_eval_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.eval_timeout = timeout;
        self
    }

    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    /// Hard wall-clock deadline for the whole run. Workers consult it before
    /// starting; individuals past the deadline are marked invalid without
    /// being scored.
    pub fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
    }

    /// Number of times the external scoring function has actually run.
    pub fn num_evaluations(&self) -> u64 {
        self.evaluations.load(Ordering::Relaxed)
    }

    pub fn cache(&self) -> &EvaluationCache {
        &self.cache
    }

    /// Evaluate every individual of a generation. The returned population is
    /// the input population with fitness filled in, 1:1 by uid; worker
    /// completion order never reorders it.
    pub fn evaluate_population(&mut self, mut population: Population) -> Population {
        let num_objectives = self.objective.num_objectives();

        // Resolve cache hits on the control thread and collect each distinct
        // uncached structure exactly once.
        let mut pending: Vec<(String, Graph)> = Vec::new();
        for individual in population.iter_mut() {
            let fingerprint = individual.fingerprint().to_string();
            if let Some(cached) = self.cache.get(&fingerprint) {
                individual.set_fitness(cached.fitness.clone());
                individual
                    .metadata
                    .insert("cache_hit".to_string(), "true".to_string());
                continue;
            }
            if !pending.iter().any(|(fp, _)| *fp == fingerprint) {
                pending.push((fingerprint, individual.graph.clone()));
            }
        }

        let function = &self.function;
        let eval_timeout = self.eval_timeout;
        let deadline = self.deadline;
        let evaluations = &self.evaluations;

        let results: Vec<WorkerResult> = pending
            .into_par_iter()
            .map(|(fingerprint, graph)| {
                if let Some(deadline) = deadline {
                    if Instant::now() >= deadline {
                        return WorkerResult {
                            fingerprint,
                            fitness: Fitness::invalid(num_objectives),
                            elapsed: Duration::ZERO,
                            evaluated: false,
                        };
                    }
                }
                evaluations.fetch_add(1, Ordering::Relaxed);
                let started = Instant::now();
                let outcome = (function)(&graph);
                let elapsed = started.elapsed();

                let fitness = match outcome {
                    Ok(_) if eval_timeout.map(|t| elapsed > t).unwrap_or(false) => {
                        warn!(
                            "{}",
                            EvoGraphError::EvaluationTimeout(elapsed.as_secs_f64())
                        );
                        Fitness::invalid(num_objectives)
                    }
                    Ok(fitness) => fitness,
                    Err(error) => {
                        warn!("evaluation failed: {}", error);
                        Fitness::invalid(num_objectives)
                    }
                };
                WorkerResult {
                    fingerprint,
                    fitness,
                    elapsed,
                    evaluated: true,
                }
            })
            .collect();

        // Cache writes happen here, on the control thread only. Failed
        // evaluations are cached as invalid so a broken structure is never
        // scored twice; deadline-abandoned ones were never scored and stay
        // out of the cache.
        for result in &results {
            if result.evaluated {
                self.cache.insert(
                    result.fingerprint.clone(),
                    CachedEvaluation {
                        fitness: result.fitness.clone(),
                        elapsed: result.elapsed,
                    },
                );
            }
        }

        for individual in population.iter_mut() {
            if individual.fitness().is_some() {
                continue;
            }
            let fingerprint = individual.fingerprint();
            match results.iter().find(|r| r.fingerprint == fingerprint) {
                Some(result) => {
                    individual.set_fitness(result.fitness.clone());
                    individual.metadata.insert(
                        "evaluation_time_ms".to_string(),
                        result.elapsed.as_millis().to_string(),
                    );
                    individual.metadata.insert(
                        "evaluated_at".to_string(),
                        chrono::Utc::now().to_rfc3339(),
                    );
                }
                None => {
                    // unreachable unless the fingerprint changed mid-flight
                    debug!("no evaluation result for {}", individual.uid());
                    individual.set_fitness(Fitness::invalid(num_objectives));
                }
            }
        }

        population
    }
}
