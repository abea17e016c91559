//! Evolves pipeline structures against a synthetic objective and prints the
//! leaderboard. Run with `cargo run --example optimize_demo`.

use anyhow::Result;
use evograph::evolution::ConsoleProgressCallback;
use evograph::{
    EvoOptimizer, Fitness, Graph, GraphRequirements, Objective, ObjectiveFunction,
    OptimizationDirection, OptimizerConfig,
};
use std::sync::Arc;

fn main() -> Result<()> {
    env_logger::init();

    let requirements = GraphRequirements {
        primary_operations: vec![
            "scale".to_string(),
            "lag".to_string(),
            "filter".to_string(),
        ],
        secondary_operations: vec![
            "ridge".to_string(),
            "forest".to_string(),
            "blend".to_string(),
        ],
        max_arity: 2,
        max_depth: 5,
        start_depth: 3,
    };

    let config = OptimizerConfig {
        pop_size: 16,
        num_of_generations: 12,
        crossover_prob: 0.8,
        mutation_prob: 0.8,
        elitism_count: 2,
        max_archive_size: 8,
        stagnation_window: Some(5),
        timeout: Some(30.0),
        seed: Some(42),
        ..Default::default()
    };

    // synthetic objective: prefer pipelines of about five operations with a
    // blending root
    let function: ObjectiveFunction = Arc::new(|graph: &Graph| {
        let size_term = 1.0 / (1.0 + (graph.len() as f64 - 5.0).abs());
        let root_bonus = graph
            .root()
            .ok()
            .and_then(|root| graph.node(root).ok())
            .map(|node| {
                if node.operation_name() == "blend" {
                    0.5
                } else {
                    0.0
                }
            })
            .unwrap_or(0.0);
        Ok(Fitness::single(size_term + root_bonus))
    });

    let objective = Objective::single("score", OptimizationDirection::Maximize);
    let mut optimizer = EvoOptimizer::new(config, requirements, objective, function)?;

    let best = optimizer.run(&mut ConsoleProgressCallback)?;
    if let Some(winner) = best.first() {
        println!("\nBest pipeline: {}", winner.fingerprint());
        if let Some(fitness) = winner.fitness() {
            println!("Fitness: {}", fitness);
        }
    }

    println!("\n{}", optimizer.history().leaderboard(5));
    println!(
        "{} structures evaluated, {} cache hits",
        optimizer.evaluator().num_evaluations(),
        optimizer.evaluator().cache().hits()
    );
    Ok(())
}
