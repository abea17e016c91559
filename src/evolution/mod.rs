pub mod archive;
pub mod generator;
pub mod individual;
pub mod operators;
pub mod optimizer;
pub mod pareto;
pub mod progress;

pub use archive::GenerationKeeper;
pub use generator::{random_graph, GenerationFunction, InitialPopulationGenerator};
pub use individual::{Fitness, Individual, ParentOperator, Population, Uid};
pub use operators::{
    Crossover, CustomMutation, Mutation, MutationType, Selection, SelectionType,
};
pub use optimizer::EvoOptimizer;
pub use pareto::OptimizationDirection;
pub use progress::{
    ChannelProgressCallback, ConsoleProgressCallback, NullProgressCallback, ProgressCallback,
    ProgressMessage,
};
