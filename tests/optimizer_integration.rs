use evograph::evolution::NullProgressCallback;
use evograph::{
    EvoGraphError, EvoOptimizer, Fitness, Graph, GraphRequirements, NodeContent, Objective,
    ObjectiveFunction, ObjectiveMetric, OptimizationDirection, OptimizerConfig,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

fn requirements() -> GraphRequirements {
    GraphRequirements {
        primary_operations: vec!["scale".to_string(), "lag".to_string(), "model".to_string()],
        secondary_operations: vec!["model".to_string(), "blend".to_string()],
        max_arity: 2,
        max_depth: 4,
        start_depth: 3,
    }
}

fn config(pop_size: usize, generations: usize) -> OptimizerConfig {
    OptimizerConfig {
        pop_size,
        num_of_generations: generations,
        crossover_prob: 0.8,
        mutation_prob: 0.8,
        elitism_count: 1,
        max_archive_size: 5,
        seed: Some(1337),
        ..Default::default()
    }
}

/// Rewards pipelines whose size is close to three nodes.
fn size_objective_function() -> ObjectiveFunction {
    Arc::new(|graph: &Graph| {
        let distance = (graph.len() as f64 - 3.0).abs();
        Ok(Fitness::single(1.0 / (1.0 + distance)))
    })
}

#[test]
fn test_generation_limit_is_exact_with_no_timeout() {
    let mut optimizer = EvoOptimizer::new(
        config(8, 5),
        requirements(),
        Objective::single("score", OptimizationDirection::Maximize),
        size_objective_function(),
    )
    .unwrap();

    let result = optimizer.run(&mut NullProgressCallback).unwrap();
    assert_eq!(optimizer.history().num_generations(), 5);
    assert_eq!(result.len(), 1);
    assert!(result[0].has_valid_fitness());
}

#[test]
fn test_near_zero_timeout_cuts_run_short() {
    let mut cfg = config(8, 10);
    cfg.timeout = Some(0.0);
    let mut optimizer = EvoOptimizer::new(
        cfg,
        requirements(),
        Objective::single("score", OptimizationDirection::Maximize),
        size_objective_function(),
    )
    .unwrap();

    let _ = optimizer.run(&mut NullProgressCallback).unwrap();
    assert!(optimizer.history().num_generations() < 10);
}

#[test]
fn test_each_structure_scored_at_most_once_per_run() {
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);
    let function: ObjectiveFunction = Arc::new(move |graph: &Graph| {
        let fingerprint = graph.fingerprint().map_err(|e| {
            EvoGraphError::Evaluation(e.to_string())
        })?;
        recorder.lock().unwrap().push(fingerprint);
        let distance = (graph.len() as f64 - 3.0).abs();
        Ok(Fitness::single(1.0 / (1.0 + distance)))
    });

    let mut optimizer = EvoOptimizer::new(
        config(10, 6),
        requirements(),
        Objective::single("score", OptimizationDirection::Maximize),
        function,
    )
    .unwrap();
    let _ = optimizer.run(&mut NullProgressCallback).unwrap();

    let calls = seen.lock().unwrap();
    let distinct: HashSet<&String> = calls.iter().collect();
    assert_eq!(calls.len(), distinct.len());
    assert_eq!(calls.len() as u64, optimizer.evaluator().num_evaluations());
}

#[test]
fn test_multi_objective_run_returns_non_dominated_archive() {
    let objective = Objective::new(vec![
        ObjectiveMetric::new("fit", OptimizationDirection::Maximize),
        ObjectiveMetric::new("complexity", OptimizationDirection::Minimize),
    ])
    .unwrap();
    let function: ObjectiveFunction = Arc::new(|graph: &Graph| {
        let fit = 1.0 - 1.0 / (1.0 + graph.depth() as f64);
        Ok(Fitness::new(vec![fit, graph.len() as f64]))
    });

    let mut optimizer =
        EvoOptimizer::new(config(10, 6), requirements(), objective.clone(), function).unwrap();
    let archive = optimizer.run(&mut NullProgressCallback).unwrap();

    assert!(!archive.is_empty());
    assert!(archive.len() <= 5);
    for a in &archive {
        for b in &archive {
            assert!(!objective.dominates(a.fitness().unwrap(), b.fitness().unwrap()));
        }
    }
    // every archive snapshot along the way respected the bound
    for snapshot in optimizer.history().archive_history() {
        assert!(snapshot.len() <= 5);
    }
}

#[test]
fn test_stagnation_window_stops_early() {
    let mut cfg = config(6, 50);
    cfg.stagnation_window = Some(2);
    // constant fitness: the archive never improves after generation zero
    let function: ObjectiveFunction = Arc::new(|_graph: &Graph| Ok(Fitness::single(1.0)));

    let mut optimizer = EvoOptimizer::new(
        cfg,
        requirements(),
        Objective::single("score", OptimizationDirection::Maximize),
        function,
    )
    .unwrap();
    let _ = optimizer.run(&mut NullProgressCallback).unwrap();
    assert!(optimizer.history().num_generations() < 50);
}

#[test]
fn test_parameter_free_growth_expands_population() {
    let mut cfg = config(4, 8);
    cfg.stagnation_window = Some(1);
    cfg.parameter_free = true;
    cfg.max_pop_size = 16;
    let function: ObjectiveFunction = Arc::new(|_graph: &Graph| Ok(Fitness::single(1.0)));

    let mut optimizer = EvoOptimizer::new(
        cfg,
        requirements(),
        Objective::single("score", OptimizationDirection::Maximize),
        function,
    )
    .unwrap();
    let _ = optimizer.run(&mut NullProgressCallback).unwrap();

    assert!(optimizer
        .history()
        .generations()
        .iter()
        .any(|generation| generation.len() > 4));
}

#[test]
fn test_zero_population_size_is_fatal_at_construction() {
    let result = EvoOptimizer::new(
        config(0, 5),
        requirements(),
        Objective::single("score", OptimizationDirection::Maximize),
        size_objective_function(),
    );
    match result {
        Err(EvoGraphError::Configuration(_)) => {}
        _ => panic!("expected a configuration error"),
    }
}

#[test]
fn test_empty_operation_sets_are_fatal_at_construction() {
    let mut req = requirements();
    req.secondary_operations.clear();
    let result = EvoOptimizer::new(
        config(5, 5),
        req,
        Objective::single("score", OptimizationDirection::Maximize),
        size_objective_function(),
    );
    assert!(result.is_err());
}

#[test]
fn test_seed_graphs_feed_the_initial_generation() {
    let mut seed = Graph::new();
    let leaf = seed.add_node(NodeContent::new("scale"), &[]).unwrap();
    seed.add_node(NodeContent::new("model"), &[leaf]).unwrap();
    let seed_fingerprint = seed.fingerprint().unwrap();

    let mut optimizer = EvoOptimizer::new(
        config(4, 1),
        requirements(),
        Objective::single("score", OptimizationDirection::Maximize),
        size_objective_function(),
    )
    .unwrap()
    .with_initial_graphs(vec![seed]);

    let _ = optimizer.run(&mut NullProgressCallback).unwrap();
    let first_generation = &optimizer.history().generations()[0];
    assert_eq!(first_generation.len(), 1);
    assert_eq!(first_generation[0].fingerprint(), seed_fingerprint);
}

#[test]
fn test_failing_evaluations_degrade_gracefully() {
    // every structure with more than two nodes fails to evaluate
    let function: ObjectiveFunction = Arc::new(|graph: &Graph| {
        if graph.len() > 2 {
            Err(EvoGraphError::Evaluation("too large to score".to_string()))
        } else {
            Ok(Fitness::single(graph.len() as f64))
        }
    });

    let mut optimizer = EvoOptimizer::new(
        config(8, 4),
        requirements(),
        Objective::single("score", OptimizationDirection::Maximize),
        function,
    )
    .unwrap();
    let result = optimizer.run(&mut NullProgressCallback).unwrap();

    // the run survives and anything returned was actually scored
    for individual in &result {
        assert!(individual.has_valid_fitness());
        assert!(individual.graph.len() <= 2);
    }
    for generation in optimizer.history().generations() {
        for individual in generation {
            if individual.graph.len() > 2 {
                assert!(!individual.has_valid_fitness());
            }
        }
    }
}

#[test]
fn test_history_exports_csv_and_leaderboard() {
    let mut optimizer = EvoOptimizer::new(
        config(6, 3),
        requirements(),
        Objective::single("score", OptimizationDirection::Maximize),
        size_objective_function(),
    )
    .unwrap();
    let _ = optimizer.run(&mut NullProgressCallback).unwrap();

    let csv = optimizer.history().to_csv();
    assert!(csv.lines().count() > 3);

    let board = optimizer.history().leaderboard(5);
    assert!(board.lines().count() >= 2);
}
