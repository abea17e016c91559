use crate::evaluation::Objective;
use crate::evolution::individual::{Individual, Population};
use crate::evolution::pareto::{
    calculate_crowding_distance, crowded_less, fast_non_dominated_sort, ParetoRanked,
};
use log::debug;
use std::collections::HashSet;

/// Best individuals retained across generations.
///
/// In multi-objective mode this is a bounded Pareto archive: mutually
/// non-dominated individuals, trimmed by crowding distance when the bound is
/// exceeded. In single-objective mode it degenerates to the best individual
/// seen so far. The keeper also tracks stagnation for the loop's early
/// stopping and parameter-free growth.
pub struct GenerationKeeper {
    objective: Objective,
    max_size: usize,
    individuals: Population,
    stagnation_count: usize,
    improved: bool,
}

impl GenerationKeeper {
    pub fn new(objective: Objective, max_size: usize) -> Self {
        Self {
            objective,
            max_size,
            individuals: Vec::new(),
            stagnation_count: 0,
            improved: false,
        }
    }

    pub fn best_individuals(&self) -> &[Individual] {
        &self.individuals
    }

    /// Best individual by weighted scalar rank.
    pub fn best(&self) -> Option<&Individual> {
        self.individuals.iter().max_by(|a, b| {
            match (a.fitness(), b.fitness()) {
                (Some(fa), Some(fb)) => self.objective.compare(fa, fb),
                (Some(_), None) => std::cmp::Ordering::Greater,
                (None, Some(_)) => std::cmp::Ordering::Less,
                (None, None) => std::cmp::Ordering::Equal,
            }
        })
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    /// Whether the latest `update` changed the archive.
    pub fn is_improved(&self) -> bool {
        self.improved
    }

    /// Consecutive updates without improvement.
    pub fn stagnation_count(&self) -> usize {
        self.stagnation_count
    }

    pub fn reset_stagnation(&mut self) {
        self.stagnation_count = 0;
    }

    /// Discard newly produced individuals whose fingerprint and exact
    /// fitness already sit in the archive. NaN components never compare
    /// equal, so invalid fitness is always treated as distinct; unevaluated
    /// individuals pass through untouched.
    pub fn filter_duplicates(&self, population: Population) -> Population {
        population
            .into_iter()
            .filter(|candidate| {
                let duplicate = self.individuals.iter().any(|archived| {
                    archived.fingerprint() == candidate.fingerprint()
                        && archived.fitness() == candidate.fitness()
                        && candidate.fitness().is_some()
                });
                if duplicate {
                    debug!("dropping duplicate of archived individual {}", candidate.uid());
                }
                !duplicate
            })
            .collect()
    }

    /// Merge a generation into the archive.
    pub fn update(&mut self, population: &[Individual]) {
        let fresh: Vec<&Individual> = population
            .iter()
            .filter(|i| i.has_valid_fitness())
            .collect();
        if fresh.is_empty() {
            self.improved = false;
            self.stagnation_count += 1;
            return;
        }

        let before: Vec<String> = self
            .individuals
            .iter()
            .map(|i| i.fingerprint().to_string())
            .collect();

        if self.objective.is_multi_objective() {
            self.update_pareto(&fresh);
        } else {
            self.update_single(&fresh);
        }

        let after: Vec<String> = self
            .individuals
            .iter()
            .map(|i| i.fingerprint().to_string())
            .collect();
        self.improved = before != after;
        if self.improved {
            self.stagnation_count = 0;
        } else {
            self.stagnation_count += 1;
        }
    }

    fn update_single(&mut self, fresh: &[&Individual]) {
        let incumbent_rank = self
            .individuals
            .first()
            .and_then(|i| i.fitness())
            .map(|f| self.objective.scalar_rank(f))
            .unwrap_or(f64::NEG_INFINITY);

        let mut challenger: Option<(&Individual, f64)> = None;
        for candidate in fresh {
            if let Some(fitness) = candidate.fitness() {
                let rank = self.objective.scalar_rank(fitness);
                if challenger.map(|(_, best)| rank > best).unwrap_or(true) {
                    challenger = Some((candidate, rank));
                }
            }
        }

        if let Some((challenger, rank)) = challenger {
            if rank > incumbent_rank {
                self.individuals = vec![challenger.clone()];
            }
        }
    }

    fn update_pareto(&mut self, fresh: &[&Individual]) {
        let mut candidates: Population = self.individuals.clone();
        let mut seen: HashSet<String> = candidates
            .iter()
            .map(|i| i.fingerprint().to_string())
            .collect();
        for individual in fresh {
            if seen.insert(individual.fingerprint().to_string()) {
                candidates.push((*individual).clone());
            }
        }

        // keep only mutually non-dominated candidates
        let mut front: Population = Vec::new();
        for (i, candidate) in candidates.iter().enumerate() {
            let fitness = match candidate.fitness() {
                Some(fitness) => fitness,
                None => continue,
            };
            let dominated = candidates.iter().enumerate().any(|(j, other)| {
                i != j
                    && other
                        .fitness()
                        .map(|of| self.objective.dominates(of, fitness))
                        .unwrap_or(false)
            });
            if !dominated {
                front.push(candidate.clone());
            }
        }

        if front.len() > self.max_size {
            let mut ranked: Vec<ParetoRanked<usize>> = front
                .iter()
                .enumerate()
                .filter_map(|(i, ind)| {
                    ind.fitness()
                        .map(|f| ParetoRanked::new(i, f.values().to_vec()))
                })
                .collect();
            let directions = self.objective.directions();
            let fronts = fast_non_dominated_sort(&mut ranked, &directions);
            for indices in &fronts {
                calculate_crowding_distance(&mut ranked, indices);
            }
            ranked.sort_by(crowded_less);
            front = ranked
                .iter()
                .take(self.max_size)
                .map(|r| front[r.data].clone())
                .collect();
        }

        self.individuals = front;
    }
}
