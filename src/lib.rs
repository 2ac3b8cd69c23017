pub mod config;
pub mod engines;
pub mod error;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod types;

pub use config::{AppConfig, ConfigManager, EvolutionConfig, SchedulerConfig};
pub use engines::ancestry::{AncestorBranch, AncestryEngine, LcaOutcome};
pub use engines::curator::{PopulationCurator, SweepOutcome, SweepReport};
pub use engines::generation::{AdvanceOutcome, GenerationController};
pub use error::{Result, TunebreederError};
pub use scheduler::{Scheduler, SchedulerState};
pub use service::{EvolutionService, ScoreReceipt};
pub use store::{DataStore, InMemoryStore};
pub use types::{
    Experiment, ExperimentSummary, GenomeRecord, LeaderboardEntry, Note, NoteDuration, SavedMelody,
};
