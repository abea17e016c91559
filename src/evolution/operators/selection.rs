use crate::evaluation::Objective;
use crate::evolution::individual::{Individual, Population};
use rand::rngs::StdRng;
use rand::Rng;

/// Fraction of the population sampled into each tournament group.
const TOURNAMENT_FRACTION: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionType {
    Tournament,
    Spea2,
}

/// Selection operator. When several strategies are configured, each call
/// picks one of them at random.
pub struct Selection {
    types: Vec<SelectionType>,
    objective: Objective,
}

impl Selection {
    pub fn new(types: Vec<SelectionType>, objective: Objective) -> Self {
        let types = if types.is_empty() {
            vec![SelectionType::Tournament]
        } else {
            types
        };
        Self { types, objective }
    }

    pub fn select(&self, population: &[Individual], target: usize, rng: &mut StdRng) -> Population {
        let selection_type = self.types[rng.gen_range(0..self.types.len())];
        match selection_type {
            SelectionType::Tournament => {
                tournament_selection(population, target, &self.objective, rng)
            }
            SelectionType::Spea2 => spea2_selection(population, target, &self.objective),
        }
    }

    /// Pick `target` distinct individuals, drawing one winner at a time and
    /// deduplicating by uid, bounded at `target * 10` attempts.
    pub fn individuals_selection(
        &self,
        population: &[Individual],
        target: usize,
        rng: &mut StdRng,
    ) -> Population {
        if population.len() == target {
            return population.to_vec();
        }
        let mut chosen = Population::new();
        let mut remaining: Population = population.to_vec();
        let pool_size = population.len();
        let mut n_iter = 0;
        while chosen.len() < target && n_iter < target * 10 && !remaining.is_empty() {
            n_iter += 1;
            let winner = match self.select(&remaining, 1, rng).into_iter().next() {
                Some(winner) => winner,
                None => break,
            };
            if chosen.iter().all(|c| c.uid() != winner.uid()) {
                if target <= pool_size {
                    remaining.retain(|i| i.uid() != winner.uid());
                }
                chosen.push(winner);
            }
        }
        chosen
    }
}

/// Tournament selection: repeatedly sample a random group and keep its best
/// individual, deduplicating winners by uid. A population of one is
/// returned repeated to the requested size.
pub fn tournament_selection<R: Rng + ?Sized>(
    individuals: &[Individual],
    target: usize,
    objective: &Objective,
    rng: &mut R,
) -> Population {
    if individuals.is_empty() {
        return Population::new();
    }
    if individuals.len() == 1 {
        return vec![individuals[0].clone(); target];
    }

    let group_size = ((individuals.len() as f64) * TOURNAMENT_FRACTION).ceil() as usize;
    let group_size = group_size.max(2);

    let mut chosen = Population::new();
    let mut n_iter = 0;
    while chosen.len() < target && n_iter < target * 10 {
        n_iter += 1;
        let mut best: Option<&Individual> = None;
        for _ in 0..group_size {
            let candidate = &individuals[rng.gen_range(0..individuals.len())];
            best = match best {
                None => Some(candidate),
                Some(current) => {
                    let challenger_wins = match (candidate.fitness(), current.fitness()) {
                        (Some(a), Some(b)) => {
                            objective.compare(a, b) == std::cmp::Ordering::Greater
                        }
                        (Some(_), None) => true,
                        _ => false,
                    };
                    if challenger_wins {
                        Some(candidate)
                    } else {
                        Some(current)
                    }
                }
            };
        }
        if let Some(winner) = best {
            if chosen.iter().all(|c| c.uid() != winner.uid()) {
                chosen.push(winner.clone());
            }
        }
    }
    chosen
}

/// SPEA2 environmental selection: strength-Pareto raw fitness plus a
/// kth-nearest-neighbour density estimate, with nearest-neighbour
/// truncation when too many non-dominated individuals survive. Ties are
/// broken by stable index order.
pub fn spea2_selection(
    individuals: &[Individual],
    target: usize,
    objective: &Objective,
) -> Population {
    let n = individuals.len();
    if n == 0 || target == 0 {
        return Population::new();
    }
    let directions = objective.directions();
    let invalid: Vec<f64> = vec![f64::NAN; objective.num_objectives()];
    let values: Vec<&[f64]> = individuals
        .iter()
        .map(|i| i.fitness().map(|f| f.values()).unwrap_or(&invalid))
        .collect();

    // strength: how many individuals each one dominates
    let mut strength = vec![0usize; n];
    let mut dominators: Vec<Vec<usize>> = vec![Vec::new(); n];
    for i in 0..n {
        for j in (i + 1)..n {
            if crate::evolution::pareto::dominates(values[i], values[j], &directions) {
                strength[i] += 1;
                dominators[j].push(i);
            } else if crate::evolution::pareto::dominates(values[j], values[i], &directions) {
                strength[j] += 1;
                dominators[i].push(j);
            }
        }
    }

    // raw fitness: sum of the strengths of an individual's dominators;
    // zero means non-dominated
    let mut raw: Vec<f64> = vec![0.0; n];
    for i in 0..n {
        for &j in &dominators[i] {
            raw[i] += strength[j] as f64;
        }
    }

    let mut chosen: Vec<usize> = (0..n).filter(|&i| raw[i] < 1.0).collect();

    if chosen.len() < target {
        // archive too small: add density to raw fitness and fill with the
        // best of the dominated remainder
        let k = ((n as f64).sqrt() as usize).clamp(1, n.saturating_sub(1).max(1));
        let mut fits = raw.clone();
        for i in 0..n {
            let mut distances: Vec<f64> = (0..n)
                .filter(|&j| j != i)
                .map(|j| squared_distance(values[i], values[j]))
                .collect();
            distances.sort_by(f64::total_cmp);
            let kth = distances.get(k - 1).copied().unwrap_or(0.0);
            fits[i] += 1.0 / (kth + 2.0);
        }
        let mut remainder: Vec<(f64, usize)> = (0..n)
            .filter(|i| !chosen.contains(i))
            .map(|i| (fits[i], i))
            .collect();
        remainder.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        chosen.extend(remainder.iter().take(target - chosen.len()).map(|(_, i)| *i));
    } else if chosen.len() > target {
        truncate_by_distance(&mut chosen, &values, target);
    }

    chosen.into_iter().map(|i| individuals[i].clone()).collect()
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Iteratively remove the individual whose sorted distance row is
/// lexicographically smallest, until the target size is reached.
fn truncate_by_distance(chosen: &mut Vec<usize>, values: &[&[f64]], target: usize) {
    let size = chosen.len();
    let mut distances = vec![vec![0.0f64; size]; size];
    for i in 0..size {
        for j in (i + 1)..size {
            let d = squared_distance(values[chosen[i]], values[chosen[j]]);
            distances[i][j] = d;
            distances[j][i] = d;
        }
    }

    let mut alive: Vec<bool> = vec![true; size];
    let mut remaining = size;
    while remaining > target {
        let mut min_pos: Option<usize> = None;
        let mut min_row: Vec<f64> = Vec::new();
        for i in 0..size {
            if !alive[i] {
                continue;
            }
            let mut row: Vec<f64> = (0..size)
                .filter(|&j| alive[j] && j != i)
                .map(|j| distances[i][j])
                .collect();
            row.sort_by(f64::total_cmp);
            let smaller = match &min_pos {
                None => true,
                Some(_) => lexicographically_less(&row, &min_row),
            };
            if smaller {
                min_pos = Some(i);
                min_row = row;
            }
        }
        if let Some(doomed) = min_pos {
            alive[doomed] = false;
            remaining -= 1;
        } else {
            break;
        }
    }

    let survivors: Vec<usize> = chosen
        .iter()
        .enumerate()
        .filter(|(i, _)| alive[*i])
        .map(|(_, &idx)| idx)
        .collect();
    *chosen = survivors;
}

fn lexicographically_less(a: &[f64], b: &[f64]) -> bool {
    for (x, y) in a.iter().zip(b) {
        match x.total_cmp(y) {
            std::cmp::Ordering::Less => return true,
            std::cmp::Ordering::Greater => return false,
            std::cmp::Ordering::Equal => continue,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::ObjectiveMetric;
    use crate::evolution::individual::Fitness;
    use crate::evolution::pareto::OptimizationDirection;
    use crate::graph::Graph;
    use crate::types::{NodeContent, OpParams, ParamValue};
    use rand::SeedableRng;

    fn scored(tag: i64, fitness: Fitness) -> Individual {
        let mut params = OpParams::new();
        params.insert("tag".to_string(), ParamValue::Integer(tag));
        let mut individual =
            Individual::new(Graph::single(NodeContent::with_params("model", params)));
        individual.set_fitness(fitness);
        individual
    }

    fn single_objective() -> Objective {
        Objective::single("score", OptimizationDirection::Maximize)
    }

    fn bi_objective() -> Objective {
        Objective::new(vec![
            ObjectiveMetric::new("accuracy", OptimizationDirection::Maximize),
            ObjectiveMetric::new("complexity", OptimizationDirection::Minimize),
        ])
        .unwrap()
    }

    #[test]
    fn test_tournament_single_individual_repeated() {
        let population = vec![scored(1, Fitness::single(0.5))];
        let mut rng = StdRng::seed_from_u64(1);
        let chosen = tournament_selection(&population, 5, &single_objective(), &mut rng);
        assert_eq!(chosen.len(), 5);
        assert!(chosen.iter().all(|c| c.uid() == population[0].uid()));
    }

    #[test]
    fn test_tournament_prefers_high_fitness() {
        let population: Vec<Individual> = (0..20)
            .map(|i| scored(i, Fitness::single(i as f64)))
            .collect();
        let mut rng = StdRng::seed_from_u64(42);
        let chosen = tournament_selection(&population, 5, &single_objective(), &mut rng);
        assert!(!chosen.is_empty());
        let mean_chosen: f64 = chosen
            .iter()
            .map(|c| c.fitness().unwrap().values()[0])
            .sum::<f64>()
            / chosen.len() as f64;
        assert!(mean_chosen > 9.5);
    }

    #[test]
    fn test_tournament_dedupes_winners() {
        let population: Vec<Individual> = (0..4)
            .map(|i| scored(i, Fitness::single(i as f64)))
            .collect();
        let mut rng = StdRng::seed_from_u64(7);
        let chosen = tournament_selection(&population, 4, &single_objective(), &mut rng);
        let mut uids: Vec<_> = chosen.iter().map(|c| c.uid()).collect();
        uids.dedup();
        uids.sort();
        uids.dedup();
        assert_eq!(uids.len(), chosen.len());
    }

    #[test]
    fn test_spea2_full_population_returned_when_target_matches() {
        let population = vec![
            scored(1, Fitness::new(vec![1.0, 5.0])),
            scored(2, Fitness::new(vec![3.0, 3.0])),
            scored(3, Fitness::new(vec![5.0, 1.0])),
            scored(4, Fitness::new(vec![2.0, 4.0])),
        ];
        let chosen = spea2_selection(&population, 4, &bi_objective());
        assert_eq!(chosen.len(), 4);
        let mut uids: Vec<_> = chosen.iter().map(|c| c.uid()).collect();
        uids.sort();
        uids.dedup();
        assert_eq!(uids.len(), 4);
    }

    #[test]
    fn test_spea2_prefers_non_dominated() {
        let population = vec![
            scored(1, Fitness::new(vec![0.9, 1.0])),
            scored(2, Fitness::new(vec![0.1, 9.0])), // dominated on both
            scored(3, Fitness::new(vec![0.8, 2.0])),
        ];
        let chosen = spea2_selection(&population, 2, &bi_objective());
        assert_eq!(chosen.len(), 2);
        assert!(chosen.iter().any(|c| c.uid() == population[0].uid()));
        assert!(chosen.iter().any(|c| c.uid() == population[2].uid()));
    }

    #[test]
    fn test_spea2_truncates_crowded_front() {
        // five mutually non-dominated points, two of them nearly identical
        let population = vec![
            scored(1, Fitness::new(vec![1.0, 9.0])),
            scored(2, Fitness::new(vec![3.0, 7.0])),
            scored(3, Fitness::new(vec![3.05, 6.95])),
            scored(4, Fitness::new(vec![6.0, 4.0])),
            scored(5, Fitness::new(vec![9.0, 1.0])),
        ];
        let chosen = spea2_selection(&population, 4, &bi_objective());
        assert_eq!(chosen.len(), 4);
        // one of the near-duplicates must have been truncated
        let close_pair_survivors = chosen
            .iter()
            .filter(|c| {
                let v = c.fitness().unwrap().values()[0];
                (v - 3.0).abs() < 0.1
            })
            .count();
        assert_eq!(close_pair_survivors, 1);
    }

    #[test]
    fn test_individuals_selection_dedupes_by_uid() {
        let population: Vec<Individual> = (0..10)
            .map(|i| scored(i, Fitness::single(i as f64)))
            .collect();
        let selection = Selection::new(vec![SelectionType::Tournament], single_objective());
        let mut rng = StdRng::seed_from_u64(5);
        let chosen = selection.individuals_selection(&population, 6, &mut rng);
        let mut uids: Vec<_> = chosen.iter().map(|c| c.uid()).collect();
        uids.sort();
        uids.dedup();
        assert_eq!(uids.len(), chosen.len());
        assert!(chosen.len() <= 6);
    }
}
