pub mod crossover;
pub mod mutation;
pub mod selection;

/// Attempt budget shared by crossover and mutation before an operator
/// application degrades to a no-op.
pub const MAX_OPERATOR_ATTEMPTS: usize = 100;

pub use crossover::Crossover;
pub use mutation::{CustomMutation, Mutation, MutationType};
pub use selection::{spea2_selection, tournament_selection, Selection, SelectionType};
