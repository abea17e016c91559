use crate::error::Result;
use crate::evaluation::Objective;
use crate::evolution::individual::{Individual, Population};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

/// Append-only record of a run: every generation's individuals and the
/// archive snapshot taken after it. Supports tabular export, leaderboard
/// queries and JSON persistence for reload.
#[derive(Debug, Serialize, Deserialize)]
pub struct OptHistory {
    objective: Objective,
    generations: Vec<Population>,
    archive_history: Vec<Population>,
    saved_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl OptHistory {
    pub fn new(objective: Objective) -> Self {
        Self {
            objective,
            generations: Vec::new(),
            archive_history: Vec::new(),
            saved_at: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.generations.is_empty()
    }

    pub fn num_generations(&self) -> usize {
        self.generations.len()
    }

    pub fn generations(&self) -> &[Population] {
        &self.generations
    }

    pub fn archive_history(&self) -> &[Population] {
        &self.archive_history
    }

    pub fn add_generation(&mut self, population: &[Individual]) {
        self.generations.push(population.to_vec());
    }

    pub fn add_archive_snapshot(&mut self, archive: &[Individual]) {
        self.archive_history.push(archive.to_vec());
    }

    /// Fitness series per generation, one inner vector per individual.
    pub fn historical_fitness(&self) -> Vec<Vec<Option<Vec<f64>>>> {
        self.generations
            .iter()
            .map(|generation| {
                generation
                    .iter()
                    .map(|i| i.fitness().map(|f| f.values().to_vec()))
                    .collect()
            })
            .collect()
    }

    /// Tabular export: one quoted CSV row per individual with its position,
    /// fitness, node count and depth.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        let metric_header = if self.objective.is_multi_objective() {
            "metrics"
        } else {
            "metric"
        };
        let _ = writeln!(
            out,
            "\"index\",\"generation\",\"{}\",\"quantity_of_operations\",\"depth\",\"metadata\"",
            metric_header
        );
        let mut index = 0usize;
        for (generation, population) in self.generations.iter().enumerate() {
            for individual in population {
                let fitness = individual
                    .fitness()
                    .map(|f| f.to_string())
                    .unwrap_or_else(|| "unset".to_string());
                let metadata: Vec<String> = individual
                    .metadata
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect();
                let _ = writeln!(
                    out,
                    "\"{}\",\"{}\",\"{}\",\"{}\",\"{}\",\"{}\"",
                    index,
                    generation,
                    fitness,
                    individual.graph.len(),
                    individual.graph.depth(),
                    metadata.join(";")
                );
                index += 1;
            }
        }
        out
    }

    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_csv())?;
        Ok(())
    }

    /// Structured snapshot for reload.
    pub fn save(&mut self) -> Result<String> {
        self.saved_at = Some(chrono::Utc::now());
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let json = self.save()?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::load(&contents)
    }

    /// Ordered description of the best solutions seen across the whole run.
    /// Only a structure's first appearance is listed.
    pub fn leaderboard(&self, top_n: usize) -> String {
        let mut first_seen: HashMap<&str, (usize, usize, &Individual)> = HashMap::new();
        for (gen_num, generation) in self.generations.iter().enumerate() {
            for (ind_num, individual) in generation.iter().enumerate() {
                first_seen
                    .entry(individual.fingerprint())
                    .or_insert((gen_num, ind_num, individual));
            }
        }

        let mut ranked: Vec<&(usize, usize, &Individual)> = first_seen.values().collect();
        ranked.sort_by(|a, b| {
            let rank_a = a
                .2
                .fitness()
                .map(|f| self.objective.scalar_rank(f))
                .unwrap_or(f64::NEG_INFINITY);
            let rank_b = b
                .2
                .fitness()
                .map(|f| self.objective.scalar_rank(f))
                .unwrap_or(f64::NEG_INFINITY);
            rank_b
                .total_cmp(&rank_a)
                .then_with(|| a.0.cmp(&b.0))
                .then_with(|| a.1.cmp(&b.1))
        });

        let mut out = String::new();
        let _ = writeln!(out, "Position | Fitness | Generation | Pipeline");
        for (position, (gen_num, ind_num, individual)) in
            ranked.iter().take(top_n).enumerate()
        {
            let fitness = individual
                .fitness()
                .map(|f| f.to_string())
                .unwrap_or_else(|| "unset".to_string());
            let _ = writeln!(
                out,
                "{:>3} | {} | g{}-i{} | {}",
                position,
                fitness,
                gen_num,
                ind_num,
                individual.fingerprint()
            );
        }
        out
    }
}
