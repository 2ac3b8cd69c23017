use crate::config::{EvolutionConfig, SchedulerConfig};
use crate::engines::curator::PopulationCurator;
use crate::engines::evolution::{crossover, heuristic_score, mutate};
use crate::error::{Result, TunebreederError};
use crate::store::DataStore;
use crate::types::{ExperimentId, GenomeId, GenomeRecord, NewGenome};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// What one advance attempt did. Losing the per-experiment race and an
/// undersized population are ordinary outcomes, not errors.
#[derive(Debug, Clone, PartialEq)]
pub enum AdvanceOutcome {
    /// No genome in the current generation carries a human score yet.
    Pending { unscored: usize },
    Advanced {
        generation: u32,
        offspring: usize,
    },
    /// The experiment hit its generation ceiling; no children produced.
    Completed {
        final_genome: GenomeId,
        final_score: f64,
    },
    /// Fewer than two genomes available for crossover.
    InsufficientPopulation,
    /// Another advance won the race for this generation; nothing to do.
    Raced,
    AlreadyCompleted,
}

/// Per-experiment generation state machine. Advancement is serialized by an
/// experiment-scoped lock plus an expected-generation check in the commit,
/// so at most one advance executes per experiment per generation.
pub struct GenerationController<S> {
    store: Arc<S>,
    config: EvolutionConfig,
    curator: PopulationCurator<S>,
    locks: Mutex<HashMap<ExperimentId, Arc<Mutex<()>>>>,
}

impl<S: DataStore> GenerationController<S> {
    pub fn new(store: Arc<S>, config: EvolutionConfig, scheduler: &SchedulerConfig) -> Self {
        let curator = PopulationCurator::new(Arc::clone(&store), scheduler);
        Self {
            store,
            config,
            curator,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn advance_lock(&self, experiment_id: ExperimentId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        Arc::clone(locks.entry(experiment_id).or_default())
    }

    /// Drop the advance lock of an experiment that reached its terminal
    /// state; completed experiments never advance again. A straggler still
    /// holding the old Arc is harmless, the store's guards reject its
    /// commit.
    fn release_lock(&self, experiment_id: ExperimentId) {
        self.locks.lock().unwrap().remove(&experiment_id);
    }

    fn make_rng(&self) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Attempt one generation advance. Both trigger paths (score submission
    /// and timer) land here; the gate is at least one human-scored genome in
    /// the current generation.
    pub fn attempt_advance(&self, experiment_id: ExperimentId) -> Result<AdvanceOutcome> {
        let observed = self.store.experiment(experiment_id)?;
        if observed.completed {
            self.release_lock(experiment_id);
            return Ok(AdvanceOutcome::AlreadyCompleted);
        }

        let lock = self.advance_lock(experiment_id);
        let _guard = lock.lock().unwrap();

        // Re-read under the lock; a loser of the race sees the counter
        // already moved and exits.
        let experiment = self.store.experiment(experiment_id)?;
        if experiment.completed {
            self.release_lock(experiment_id);
            return Ok(AdvanceOutcome::AlreadyCompleted);
        }
        if experiment.current_generation != observed.current_generation {
            return Ok(AdvanceOutcome::Raced);
        }

        let generation = experiment.current_generation;
        let mut cohort = self.store.population(experiment_id, generation)?;
        cohort.retain(|g| {
            if g.is_well_formed() {
                true
            } else {
                warn!(
                    "excluding malformed genome {} from experiment {}",
                    g.id, experiment_id
                );
                false
            }
        });

        if !cohort.iter().any(|g| g.user_scored) {
            return Ok(AdvanceOutcome::Pending {
                unscored: cohort.len(),
            });
        }

        self.backfill_unscored(&mut cohort)?;

        if cohort.len() < 2 {
            return Ok(AdvanceOutcome::InsufficientPopulation);
        }

        // Rank everyone; heuristic placeholders compete alongside human
        // scores for selection.
        cohort.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let best = cohort[0].clone();
        let next_generation = generation + 1;

        if next_generation >= experiment.max_generations {
            let final_name = format!("Evolved Melody #{}", experiment_id);
            return match self.store.complete_experiment(
                experiment_id,
                generation,
                best.id,
                &final_name,
                best.score,
            ) {
                Ok(_) => {
                    info!(
                        "experiment {} completed at generation {} with final genome {}",
                        experiment_id, generation, best.id
                    );
                    // Last chance to reclaim unreachable lineage: the
                    // scheduler only walks active experiments.
                    if let Err(e) = self.curator.sweep(experiment_id) {
                        warn!(
                            "cleanup after completing experiment {} failed: {}",
                            experiment_id, e
                        );
                    }
                    self.release_lock(experiment_id);
                    Ok(AdvanceOutcome::Completed {
                        final_genome: best.id,
                        final_score: best.score,
                    })
                }
                Err(TunebreederError::Conflict(_)) => Ok(AdvanceOutcome::Raced),
                Err(e) => Err(e),
            };
        }

        let pool_size = self.config.crossover_pool_size.min(cohort.len());
        let children = self.breed(&cohort[..pool_size], &cohort, next_generation)?;
        let offspring = children.len();
        let best_score = experiment.best_score.max(best.score);

        match self
            .store
            .commit_generation(experiment_id, generation, children, best_score)
        {
            Ok(_) => {}
            Err(TunebreederError::Conflict(_)) => return Ok(AdvanceOutcome::Raced),
            Err(e) => return Err(e),
        }
        info!(
            "experiment {} advanced to generation {} with {} offspring",
            experiment_id, next_generation, offspring
        );

        // Cleanup failure never undoes a committed advance; the next
        // scheduled sweep retries.
        if let Err(e) = self.curator.sweep(experiment_id) {
            warn!("cleanup after advance of experiment {} failed: {}", experiment_id, e);
        }

        Ok(AdvanceOutcome::Advanced {
            generation: next_generation,
            offspring,
        })
    }

    /// Heuristic placeholder scores for genomes no human rated. Pure and
    /// per-genome independent, so scored in parallel. `user_scored` stays
    /// untouched.
    fn backfill_unscored(&self, cohort: &mut [GenomeRecord]) -> Result<()> {
        let backfill: Vec<(GenomeId, f64)> = cohort
            .par_iter()
            .filter(|g| !g.user_scored)
            .map(|g| (g.id, heuristic_score(&g.notes)))
            .collect();
        if backfill.is_empty() {
            return Ok(());
        }
        self.store.backfill_heuristic(&backfill)?;
        let by_id: HashMap<GenomeId, f64> = backfill.into_iter().collect();
        for genome in cohort.iter_mut() {
            if let Some(score) = by_id.get(&genome.id) {
                genome.score = *score;
            }
        }
        Ok(())
    }

    fn breed(
        &self,
        pool: &[GenomeRecord],
        ranked: &[GenomeRecord],
        next_generation: u32,
    ) -> Result<Vec<NewGenome>> {
        let mut rng = self.make_rng();
        let mut children = Vec::with_capacity(self.config.population_size);
        for _ in 0..self.config.population_size {
            let (parent1, parent2) = pick_parents(pool, ranked, &mut rng)?;
            let mut notes = crossover(&parent1.notes, &parent2.notes);
            if rng.gen::<f64>() < self.config.post_crossover_mutation_rate {
                let genes = ((notes.len() as f64 * self.config.post_crossover_mutation_fraction)
                    .round() as usize)
                    .clamp(1, notes.len());
                mutate(&mut notes, genes, true, &mut rng)?;
            }
            children.push(NewGenome {
                generation: next_generation,
                notes,
                score: 0.0,
                user_scored: false,
                parent1: Some(parent1.id),
                parent2: Some(parent2.id),
            });
        }
        Ok(children)
    }
}

/// Two distinct parents drawn uniformly from the top pool, resampling a few
/// times before falling back to the full ranked cohort.
fn pick_parents<'a, R: Rng>(
    pool: &'a [GenomeRecord],
    ranked: &'a [GenomeRecord],
    rng: &mut R,
) -> Result<(&'a GenomeRecord, &'a GenomeRecord)> {
    let first = pool
        .choose(rng)
        .ok_or_else(|| TunebreederError::Validation("empty crossover pool".to_string()))?;
    for _ in 0..8 {
        if let Some(second) = pool.choose(rng) {
            if second.id != first.id {
                return Ok((first, second));
            }
        }
    }
    let fallback: Vec<&GenomeRecord> = ranked.iter().filter(|g| g.id != first.id).collect();
    let second = fallback.choose(rng).copied().ok_or_else(|| {
        TunebreederError::Validation("no distinct second parent available".to_string())
    })?;
    Ok((first, second))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::store::InMemoryStore;
    use crate::types::{Note, NoteDuration};

    fn founder() -> NewGenome {
        NewGenome {
            generation: 0,
            notes: (0..8)
                .map(|i| Note::new(60 + i, NoteDuration::Half, 80).unwrap())
                .collect(),
            score: 0.0,
            user_scored: false,
            parent1: None,
            parent2: None,
        }
    }

    #[test]
    fn terminal_experiments_leave_no_advance_lock_behind() {
        let config = AppConfig::default();
        let store = Arc::new(InMemoryStore::new());
        let controller = GenerationController::new(
            Arc::clone(&store),
            config.evolution.clone(),
            &config.scheduler,
        );
        let experiment = store
            .create_experiment("locks", None, 1, vec![founder(), founder()])
            .unwrap();
        let founders = store.population(experiment.id, 0).unwrap();
        store.record_score(founders[0].id, 1, 70.0).unwrap();

        let outcome = controller.attempt_advance(experiment.id).unwrap();
        assert!(matches!(outcome, AdvanceOutcome::Completed { .. }));
        assert!(controller.locks.lock().unwrap().is_empty());

        // A repeat attempt exits on the completed check without leaving
        // an entry either.
        assert_eq!(
            controller.attempt_advance(experiment.id).unwrap(),
            AdvanceOutcome::AlreadyCompleted
        );
        assert!(controller.locks.lock().unwrap().is_empty());
    }
}
