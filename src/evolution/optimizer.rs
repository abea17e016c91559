use crate::config::{ConfigSection, GraphRequirements, OptimizerConfig};
use crate::error::{EvoGraphError, Result};
use crate::evaluation::{Objective, ObjectiveEvaluator, ObjectiveFunction};
use crate::evolution::archive::GenerationKeeper;
use crate::evolution::generator::{GenerationFunction, InitialPopulationGenerator};
use crate::evolution::individual::{Individual, Population};
use crate::evolution::operators::{
    Crossover, CustomMutation, Mutation, MutationType, Selection, SelectionType,
};
use crate::evolution::pareto::{
    calculate_crowding_distance, crowded_less, fast_non_dominated_sort, ParetoRanked,
};
use crate::evolution::progress::ProgressCallback;
use crate::graph::{Graph, GraphVerifier, VerificationRule};
use crate::history::OptHistory;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Instant;

/// Evolutionary optimizer over operation graphs.
///
/// Drives selection, crossover, mutation, parallel evaluation and archiving
/// across generations until a stop condition fires: wall-time budget,
/// generation count, or a configured stagnation window. With several
/// objectives configured the result is the non-dominated archive; with one,
/// the best individual found.
pub struct EvoOptimizer {
    config: OptimizerConfig,
    requirements: GraphRequirements,
    verifier: Arc<GraphVerifier>,
    selection: Selection,
    crossover: Crossover,
    mutation: Mutation,
    generator: InitialPopulationGenerator,
    evaluator: ObjectiveEvaluator,
    keeper: GenerationKeeper,
    history: OptHistory,
    rng: StdRng,
}

impl EvoOptimizer {
    pub fn new(
        config: OptimizerConfig,
        requirements: GraphRequirements,
        objective: Objective,
        function: ObjectiveFunction,
    ) -> Result<Self> {
        Self::with_verification_rules(config, requirements, objective, function, Vec::new())
    }

    /// Construct with task-specific verification rules appended to the
    /// baseline set. Configuration errors are fatal and raised here.
    pub fn with_verification_rules(
        config: OptimizerConfig,
        requirements: GraphRequirements,
        objective: Objective,
        function: ObjectiveFunction,
        rules: Vec<VerificationRule>,
    ) -> Result<Self> {
        config.validate()?;
        requirements.validate()?;

        let verifier = Arc::new(GraphVerifier::new(requirements.clone()).with_rules(rules));
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let selection_types = if objective.is_multi_objective() {
            vec![SelectionType::Spea2]
        } else {
            vec![SelectionType::Tournament]
        };

        let selection = Selection::new(selection_types, objective.clone());
        let crossover = Crossover::new(
            config.crossover_prob,
            requirements.clone(),
            Arc::clone(&verifier),
        );
        let mutation = Mutation::new(
            config.mutation_prob,
            requirements.clone(),
            Arc::clone(&verifier),
        );
        let generator = InitialPopulationGenerator::new(Arc::clone(&verifier));
        let evaluator = ObjectiveEvaluator::new(objective.clone(), function)
            .with_eval_timeout(config.eval_timeout_duration());
        let keeper = GenerationKeeper::new(objective.clone(), config.max_archive_size);
        let history = OptHistory::new(objective);

        Ok(Self {
            config,
            requirements,
            verifier,
            selection,
            crossover,
            mutation,
            generator,
            evaluator,
            keeper,
            history,
            rng,
        })
    }

    /// Seed the initial population with explicit graphs.
    pub fn with_initial_graphs(mut self, graphs: Vec<Graph>) -> Self {
        self.generator = InitialPopulationGenerator::new(Arc::clone(&self.verifier))
            .with_initial_graphs(graphs);
        self
    }

    /// Use a custom factory for initial graphs.
    pub fn with_generation_function(mut self, function: GenerationFunction) -> Self {
        self.generator = InitialPopulationGenerator::new(Arc::clone(&self.verifier))
            .with_generation_function(function);
        self
    }

    pub fn with_selection_types(mut self, types: Vec<SelectionType>) -> Self {
        let objective = self.evaluator.objective().clone();
        self.selection = Selection::new(types, objective);
        self
    }

    pub fn with_mutation_types(mut self, types: Vec<MutationType>) -> Self {
        self.mutation = Mutation::new(
            self.config.mutation_prob,
            self.requirements.clone(),
            Arc::clone(&self.verifier),
        )
        .with_types(types);
        self
    }

    /// Register a domain-injected mutation alongside the structural ones.
    pub fn with_custom_mutation(mut self, custom: CustomMutation) -> Self {
        self.mutation.add_custom(custom);
        self
    }

    pub fn history(&self) -> &OptHistory {
        &self.history
    }

    pub fn evaluator(&self) -> &ObjectiveEvaluator {
        &self.evaluator
    }

    pub fn archive(&self) -> &[Individual] {
        self.keeper.best_individuals()
    }

    /// Run the optimization. Returns the non-dominated archive; for a
    /// single objective this holds the best individual found.
    pub fn run<C: ProgressCallback>(&mut self, callback: &mut C) -> Result<Population> {
        let started = Instant::now();
        let deadline = self.config.timeout_duration().map(|t| started + t);
        self.evaluator.set_deadline(deadline);

        // active requirements start at the initial depth budget and may be
        // grown by the parameter-free scheme
        let mut active = self.requirements.clone();
        active.max_depth = self
            .requirements
            .start_depth
            .clamp(1, self.requirements.max_depth);
        self.crossover.update_requirements(active.clone());
        self.mutation.update_requirements(active.clone());
        let mut pop_size = self.config.pop_size;

        let initial = self
            .generator
            .generate(pop_size, active.max_depth, &mut self.rng);
        if initial.is_empty() {
            return Err(EvoGraphError::Generation(
                "failed to produce any valid initial individual".to_string(),
            ));
        }

        callback.on_generation_start(0);
        let mut population = self.evaluator.evaluate_population(initial);
        self.record_generation(&population);
        callback.on_generation_complete(
            0,
            self.keeper.best().and_then(Individual::fitness),
            self.keeper.len(),
        );

        let mut generation = 1;
        loop {
            if let Some(timeout) = self.config.timeout_duration() {
                if started.elapsed() >= timeout {
                    info!("stopping: wall-time budget exhausted");
                    break;
                }
            }
            if generation >= self.config.num_of_generations {
                info!("stopping: generation limit reached");
                break;
            }
            if let Some(window) = self.config.stagnation_window {
                if self.keeper.stagnation_count() >= window {
                    if self.config.parameter_free
                        && (pop_size < self.config.max_pop_size
                            || active.max_depth < self.requirements.max_depth)
                    {
                        pop_size = (pop_size * 2).min(self.config.max_pop_size);
                        active.max_depth =
                            (active.max_depth + 1).min(self.requirements.max_depth);
                        self.crossover.update_requirements(active.clone());
                        self.mutation.update_requirements(active.clone());
                        self.keeper.reset_stagnation();
                        info!(
                            "stagnation detected: growing population to {} and depth budget to {}",
                            pop_size, active.max_depth
                        );
                    } else {
                        info!(
                            "stopping: no archive improvement in {} generations",
                            window
                        );
                        break;
                    }
                }
            }

            callback.on_generation_start(generation);

            let pool: Population = population
                .iter()
                .filter(|i| i.has_valid_fitness())
                .cloned()
                .collect();
            if pool.is_empty() {
                warn!("no valid individuals left to select from, stopping");
                break;
            }

            let elites = self.select_elites(&pool);
            let num_parents = pop_size.saturating_sub(elites.len()).max(2);
            let parents = self
                .selection
                .individuals_selection(&pool, num_parents, &mut self.rng);
            let offspring = self.crossover.apply_population(&parents, &mut self.rng);
            let offspring = self.mutation.apply_population(&offspring, &mut self.rng);
            let offspring = self.keeper.filter_duplicates(offspring);

            let mut next = self.evaluator.evaluate_population(offspring);
            next.extend(elites);
            population = next;

            self.record_generation(&population);
            callback.on_generation_complete(
                generation,
                self.keeper.best().and_then(Individual::fitness),
                self.keeper.len(),
            );
            generation += 1;
        }

        if self.keeper.is_empty() {
            warn!("run finished without a single valid evaluation");
        }
        Ok(self.keeper.best_individuals().to_vec())
    }

    fn record_generation(&mut self, population: &[Individual]) {
        self.keeper.update(population);
        self.history.add_generation(population);
        self.history
            .add_archive_snapshot(self.keeper.best_individuals());
    }

    /// Top individuals carried unchanged into the next generation's pool.
    fn select_elites(&self, pool: &[Individual]) -> Population {
        let count = self.config.elitism_count.min(pool.len());
        if count == 0 {
            return Population::new();
        }
        let objective = self.evaluator.objective();
        if objective.is_multi_objective() {
            let mut ranked: Vec<ParetoRanked<usize>> = pool
                .iter()
                .enumerate()
                .filter_map(|(i, ind)| {
                    ind.fitness()
                        .map(|f| ParetoRanked::new(i, f.values().to_vec()))
                })
                .collect();
            let directions = objective.directions();
            let fronts = fast_non_dominated_sort(&mut ranked, &directions);
            for front in &fronts {
                calculate_crowding_distance(&mut ranked, front);
            }
            ranked.sort_by(crowded_less);
            ranked
                .iter()
                .take(count)
                .map(|r| pool[r.data].clone())
                .collect()
        } else {
            let mut sorted: Population = pool.to_vec();
            sorted.sort_by(|a, b| match (b.fitness(), a.fitness()) {
                (Some(fb), Some(fa)) => objective.compare(fb, fa),
                (Some(_), None) => std::cmp::Ordering::Greater,
                (None, Some(_)) => std::cmp::Ordering::Less,
                (None, None) => std::cmp::Ordering::Equal,
            });
            sorted.truncate(count);
            sorted
        }
    }
}
