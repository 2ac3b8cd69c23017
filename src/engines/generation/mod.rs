pub mod controller;

pub use controller::{AdvanceOutcome, GenerationController};
