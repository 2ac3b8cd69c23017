pub mod evolution;
pub mod generation;
pub mod ancestry;
pub mod curator;
