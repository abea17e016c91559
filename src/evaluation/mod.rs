pub mod cache;
pub mod evaluator;
pub mod objective;

pub use cache::{CachedEvaluation, EvaluationCache};
pub use evaluator::ObjectiveEvaluator;
pub use objective::{Objective, ObjectiveFunction, ObjectiveMetric};
