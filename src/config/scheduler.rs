use super::traits::ConfigSection;
use crate::error::TunebreederError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between periodic advance/cleanup passes.
    pub tick_secs: u64,
    /// Generations reserved against cleanup; the sweep skips experiments
    /// still below this counter.
    pub cleanup_min_generation: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: 30,
            cleanup_min_generation: 4,
        }
    }
}

impl ConfigSection for SchedulerConfig {
    fn section_name() -> &'static str {
        "scheduler"
    }

    fn validate(&self) -> Result<(), TunebreederError> {
        if self.tick_secs == 0 {
            return Err(TunebreederError::Configuration(
                "Scheduler tick must be at least one second".to_string(),
            ));
        }
        Ok(())
    }
}
