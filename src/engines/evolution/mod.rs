pub mod operators;
pub mod heuristic;

pub use heuristic::heuristic_score;
pub use operators::{crossover, mutate, random_notes};
