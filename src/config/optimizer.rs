use super::traits::ConfigSection;
use crate::error::{EvoGraphError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub pop_size: usize,
    pub num_of_generations: usize,
    pub crossover_prob: f64,
    pub mutation_prob: f64,
    /// Individuals carried unchanged into the next generation's pool.
    pub elitism_count: usize,
    pub max_archive_size: usize,
    /// Stop after this many generations without archive improvement.
    /// None disables early stopping.
    pub stagnation_window: Option<usize>,
    /// Overall run budget in seconds. None means no wall-time limit.
    pub timeout: Option<f64>,
    /// Per-individual evaluation budget in seconds.
    pub eval_timeout: Option<f64>,
    /// Grow population size and depth budget on stagnation instead of
    /// stopping, up to the configured ceilings.
    pub parameter_free: bool,
    pub max_pop_size: usize,
    pub seed: Option<u64>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            pop_size: 20,
            num_of_generations: 20,
            crossover_prob: 0.8,
            mutation_prob: 0.8,
            elitism_count: 1,
            max_archive_size: 10,
            stagnation_window: None,
            timeout: None,
            eval_timeout: None,
            parameter_free: false,
            max_pop_size: 160,
            seed: None,
        }
    }
}

impl OptimizerConfig {
    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs_f64)
    }

    pub fn eval_timeout_duration(&self) -> Option<Duration> {
        self.eval_timeout.map(Duration::from_secs_f64)
    }
}

impl ConfigSection for OptimizerConfig {
    fn section_name() -> &'static str {
        "optimizer"
    }

    fn validate(&self) -> Result<()> {
        if self.pop_size == 0 {
            return Err(EvoGraphError::Configuration(
                "pop_size must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.crossover_prob) {
            return Err(EvoGraphError::Configuration(
                "crossover_prob must be within [0, 1]".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.mutation_prob) {
            return Err(EvoGraphError::Configuration(
                "mutation_prob must be within [0, 1]".to_string(),
            ));
        }
        if self.elitism_count >= self.pop_size {
            return Err(EvoGraphError::Configuration(format!(
                "elitism_count {} must be below pop_size {}",
                self.elitism_count, self.pop_size
            )));
        }
        if self.max_archive_size == 0 {
            return Err(EvoGraphError::Configuration(
                "max_archive_size must be positive".to_string(),
            ));
        }
        if self.max_pop_size < self.pop_size {
            return Err(EvoGraphError::Configuration(format!(
                "max_pop_size {} is below pop_size {}",
                self.max_pop_size, self.pop_size
            )));
        }
        if let Some(timeout) = self.timeout {
            if timeout < 0.0 {
                return Err(EvoGraphError::Configuration(
                    "timeout must be non-negative".to_string(),
                ));
            }
        }
        if let Some(eval_timeout) = self.eval_timeout {
            if eval_timeout <= 0.0 {
                return Err(EvoGraphError::Configuration(
                    "eval_timeout must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(OptimizerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_pop_size_rejected() {
        let config = OptimizerConfig {
            pop_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_out_of_range_probability_rejected() {
        let config = OptimizerConfig {
            mutation_prob: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_elitism_must_fit_population() {
        let config = OptimizerConfig {
            pop_size: 4,
            elitism_count: 4,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
