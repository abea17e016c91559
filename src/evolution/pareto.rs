//! Pareto dominance utilities shared by multi-objective selection and the
//! archive: non-dominated sorting and crowding-distance diversity.

use serde::{Deserialize, Serialize};

/// Whether an objective value should be maximized or minimized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizationDirection {
    Maximize,
    Minimize,
}

/// Candidate wrapped with its objective vector and Pareto bookkeeping.
#[derive(Debug, Clone)]
pub struct ParetoRanked<T> {
    pub data: T,
    pub objectives: Vec<f64>,
    /// 0 is the best frontier.
    pub rank: usize,
    /// Higher means more isolated, preferred for diversity.
    pub crowding_distance: f64,
}

impl<T> ParetoRanked<T> {
    pub fn new(data: T, objectives: Vec<f64>) -> Self {
        Self {
            data,
            objectives,
            rank: 0,
            crowding_distance: 0.0,
        }
    }
}

/// True when A is no worse than B in every objective and strictly better in
/// at least one. NaN components never dominate and are never dominated.
pub fn dominates(a: &[f64], b: &[f64], directions: &[OptimizationDirection]) -> bool {
    if a.len() != b.len() || a.len() != directions.len() {
        return false;
    }

    let mut strictly_better = false;
    for ((a_val, b_val), direction) in a.iter().zip(b).zip(directions) {
        let (a_better, b_better) = match direction {
            OptimizationDirection::Maximize => (a_val > b_val, b_val > a_val),
            OptimizationDirection::Minimize => (a_val < b_val, b_val < a_val),
        };
        if b_better {
            return false;
        }
        if a_better {
            strictly_better = true;
        }
    }
    strictly_better
}

/// Fast non-dominated sorting. Assigns ranks in place and returns the
/// indices grouped by front (front 0 first).
pub fn fast_non_dominated_sort<T>(
    candidates: &mut [ParetoRanked<T>],
    directions: &[OptimizationDirection],
) -> Vec<Vec<usize>> {
    let n = candidates.len();
    let mut domination_count = vec![0usize; n];
    let mut dominated: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut fronts: Vec<Vec<usize>> = Vec::new();
    let mut first_front = Vec::new();

    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            if dominates(&candidates[i].objectives, &candidates[j].objectives, directions) {
                dominated[i].push(j);
            } else if dominates(&candidates[j].objectives, &candidates[i].objectives, directions) {
                domination_count[i] += 1;
            }
        }
        if domination_count[i] == 0 {
            candidates[i].rank = 0;
            first_front.push(i);
        }
    }
    fronts.push(first_front);

    let mut front_index = 0;
    while front_index < fronts.len() && !fronts[front_index].is_empty() {
        let mut next_front = Vec::new();
        for &i in &fronts[front_index] {
            for &j in &dominated[i] {
                domination_count[j] -= 1;
                if domination_count[j] == 0 {
                    candidates[j].rank = front_index + 1;
                    next_front.push(j);
                }
            }
        }
        if !next_front.is_empty() {
            fronts.push(next_front);
        }
        front_index += 1;
    }

    fronts
}

/// Crowding distance within one front. Boundary candidates get infinite
/// distance so they always survive trimming.
pub fn calculate_crowding_distance<T>(
    candidates: &mut [ParetoRanked<T>],
    front_indices: &[usize],
) {
    let front_size = front_indices.len();
    if front_size <= 2 {
        for &idx in front_indices {
            candidates[idx].crowding_distance = f64::INFINITY;
        }
        return;
    }

    let num_objectives = candidates[front_indices[0]].objectives.len();
    for &idx in front_indices {
        candidates[idx].crowding_distance = 0.0;
    }

    for obj in 0..num_objectives {
        let mut sorted: Vec<usize> = front_indices.to_vec();
        sorted.sort_by(|&a, &b| {
            candidates[a].objectives[obj]
                .partial_cmp(&candidates[b].objectives[obj])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        candidates[sorted[0]].crowding_distance = f64::INFINITY;
        candidates[sorted[front_size - 1]].crowding_distance = f64::INFINITY;

        let min_val = candidates[sorted[0]].objectives[obj];
        let max_val = candidates[sorted[front_size - 1]].objectives[obj];
        let range = max_val - min_val;
        if range.abs() < 1e-10 {
            continue;
        }

        for i in 1..(front_size - 1) {
            let prev = candidates[sorted[i - 1]].objectives[obj];
            let next = candidates[sorted[i + 1]].objectives[obj];
            candidates[sorted[i]].crowding_distance += (next - prev) / range;
        }
    }
}

/// Crowded comparison: prefer the lower rank, then the larger crowding
/// distance.
pub fn crowded_less<T>(a: &ParetoRanked<T>, b: &ParetoRanked<T>) -> std::cmp::Ordering {
    a.rank.cmp(&b.rank).then_with(|| {
        b.crowding_distance
            .partial_cmp(&a.crowding_distance)
            .unwrap_or(std::cmp::Ordering::Equal)
    })
}
