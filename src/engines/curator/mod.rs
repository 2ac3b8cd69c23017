use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::store::DataStore;
use crate::types::{ExperimentId, GenomeId};
use log::{debug, info};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Result of one cleanup pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    /// The experiment is still inside the reserved early generations.
    Skipped { generation: u32 },
    Swept(SweepReport),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Genomes older than the current generation that were considered.
    pub examined: usize,
    pub deleted: usize,
}

/// Reachability-based garbage collector. A genome from an older generation
/// survives only if it is an ancestor of some current-generation genome or
/// pinned by a SavedMelody record. The delete happens in one store
/// transaction; on failure the sweep reports the error and the next
/// scheduled pass retries.
pub struct PopulationCurator<S> {
    store: Arc<S>,
    min_generation: u32,
}

impl<S: DataStore> PopulationCurator<S> {
    pub fn new(store: Arc<S>, config: &SchedulerConfig) -> Self {
        Self {
            store,
            min_generation: config.cleanup_min_generation,
        }
    }

    pub fn sweep(&self, experiment_id: ExperimentId) -> Result<SweepOutcome> {
        let experiment = self.store.experiment(experiment_id)?;
        if experiment.current_generation < self.min_generation {
            debug!(
                "skipping cleanup for experiment {}: only at generation {}",
                experiment_id, experiment.current_generation
            );
            return Ok(SweepOutcome::Skipped {
                generation: experiment.current_generation,
            });
        }

        // One arena fetch; reachability runs over the snapshot.
        let genomes = self.store.experiment_genomes(experiment_id)?;
        let parents: HashMap<GenomeId, (Option<GenomeId>, Option<GenomeId>)> = genomes
            .iter()
            .map(|g| (g.id, (g.parent1, g.parent2)))
            .collect();

        let mut preserve: HashSet<GenomeId> = HashSet::new();
        let mut stack: Vec<GenomeId> = genomes
            .iter()
            .filter(|g| g.generation == experiment.current_generation)
            .map(|g| g.id)
            .collect();
        while let Some(id) = stack.pop() {
            if !preserve.insert(id) {
                continue;
            }
            if let Some((p1, p2)) = parents.get(&id) {
                stack.extend(p1.iter().chain(p2.iter()));
            }
        }

        preserve.extend(self.store.saved_genome_ids()?);

        let candidates: Vec<GenomeId> = genomes
            .iter()
            .filter(|g| g.generation < experiment.current_generation)
            .map(|g| g.id)
            .collect();
        let examined = candidates.len();
        let doomed: Vec<GenomeId> = candidates
            .into_iter()
            .filter(|id| !preserve.contains(id))
            .collect();

        let deleted = if doomed.is_empty() {
            0
        } else {
            self.store.sweep_genomes(experiment_id, &doomed)?
        };
        info!(
            "cleanup for experiment {}: deleted {} of {} older genomes",
            experiment_id, deleted, examined
        );
        Ok(SweepOutcome::Swept(SweepReport { examined, deleted }))
    }
}
