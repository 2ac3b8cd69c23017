use crate::config::AppConfig;
use crate::engines::ancestry::{AncestorBranch, AncestryEngine, LcaOutcome};
use crate::engines::curator::{PopulationCurator, SweepOutcome};
use crate::engines::evolution::random_notes;
use crate::engines::generation::{AdvanceOutcome, GenerationController};
use crate::error::{Result, TunebreederError};
use crate::store::DataStore;
use crate::types::{
    Experiment, ExperimentId, ExperimentSummary, GenomeId, GenomeRecord, LeaderboardEntry,
    NewGenome, SavedMelody, ScoreSubmission, UserId, SCORE_MAX, SCORE_MIN,
};
use log::error;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Arc;

/// What a score submission did: the stored contribution, plus the advance
/// outcome when the submission completed the generation's scoring.
#[derive(Debug, Clone)]
pub struct ScoreReceipt {
    pub submission: ScoreSubmission,
    pub advance: Option<AdvanceOutcome>,
}

/// Entry points exposed to collaborators. Transport, identity and UI live
/// elsewhere; user ids arrive here as opaque foreign keys.
pub struct EvolutionService<S> {
    store: Arc<S>,
    config: AppConfig,
    controller: GenerationController<S>,
    ancestry: AncestryEngine<S>,
    curator: PopulationCurator<S>,
}

impl<S: DataStore> EvolutionService<S> {
    pub fn new(store: Arc<S>, config: AppConfig) -> Result<Self> {
        config.validate()?;
        let controller = GenerationController::new(
            Arc::clone(&store),
            config.evolution.clone(),
            &config.scheduler,
        );
        let ancestry = AncestryEngine::new(Arc::clone(&store));
        let curator = PopulationCurator::new(Arc::clone(&store), &config.scheduler);
        Ok(Self {
            store,
            config,
            controller,
            ancestry,
            curator,
        })
    }

    fn make_rng(&self) -> StdRng {
        match self.config.evolution.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Create an experiment with a generation-0 random population.
    pub fn create_experiment(
        &self,
        name: &str,
        description: Option<&str>,
        max_generations: u32,
    ) -> Result<Experiment> {
        if max_generations == 0 {
            return Err(TunebreederError::Validation(
                "max_generations must be at least 1".to_string(),
            ));
        }
        let mut rng = self.make_rng();
        let seed_population = (0..self.config.evolution.population_size)
            .map(|_| NewGenome {
                generation: 0,
                notes: random_notes(self.config.evolution.genome_length, &mut rng),
                score: 0.0,
                user_scored: false,
                parent1: None,
                parent2: None,
            })
            .collect();
        self.store
            .create_experiment(name, description, max_generations, seed_population)
    }

    /// Record a human score for a genome. Scores outside [0, 100] are
    /// rejected at the boundary, never partially applied. When this
    /// submission makes the current generation fully human-scored, the same
    /// advance entry point the timer uses fires immediately.
    pub fn submit_score(
        &self,
        genome_id: GenomeId,
        user_id: UserId,
        score: f64,
    ) -> Result<ScoreReceipt> {
        if !(SCORE_MIN..=SCORE_MAX).contains(&score) || !score.is_finite() {
            return Err(TunebreederError::Validation(format!(
                "score {} outside [0, 100]",
                score
            )));
        }
        let genome = self.store.genome(genome_id)?;
        let experiment_id = self.store.genome_experiment(genome_id)?;
        let submission = self.store.record_score(genome_id, user_id, score)?;
        self.store.update_best_score(experiment_id, score)?;

        let experiment = self.store.experiment(experiment_id)?;
        let advance = if !experiment.completed
            && genome.generation == experiment.current_generation
            && self.generation_fully_scored(experiment_id, experiment.current_generation)?
        {
            match self.controller.attempt_advance(experiment_id) {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    // The submission stands; the scheduler retries the
                    // advance on its next tick.
                    error!(
                        "advance after scoring genome {} failed: {}",
                        genome_id, e
                    );
                    None
                }
            }
        } else {
            None
        };

        Ok(ScoreReceipt {
            submission,
            advance,
        })
    }

    fn generation_fully_scored(
        &self,
        experiment_id: ExperimentId,
        generation: u32,
    ) -> Result<bool> {
        let cohort = self.store.population(experiment_id, generation)?;
        Ok(!cohort.is_empty() && cohort.iter().all(|g| g.user_scored))
    }

    pub fn get_population(
        &self,
        experiment_id: ExperimentId,
        generation: u32,
    ) -> Result<Vec<GenomeRecord>> {
        let experiment = self.store.experiment(experiment_id)?;
        if generation > experiment.current_generation {
            return Err(TunebreederError::Validation(format!(
                "generation {} is ahead of experiment {} (current {})",
                generation, experiment_id, experiment.current_generation
            )));
        }
        self.store.population(experiment_id, generation)
    }

    /// A random genome from an experiment's generation, for handing to a
    /// user to rate.
    pub fn random_genome(
        &self,
        experiment_id: ExperimentId,
        generation: u32,
    ) -> Result<GenomeRecord> {
        let cohort = self.get_population(experiment_id, generation)?;
        let mut rng = self.make_rng();
        cohort.choose(&mut rng).cloned().ok_or_else(|| {
            TunebreederError::NotFound(format!(
                "no genomes in experiment {} generation {}",
                experiment_id, generation
            ))
        })
    }

    pub fn experiment(&self, experiment_id: ExperimentId) -> Result<Experiment> {
        self.store.experiment(experiment_id)
    }

    pub fn experiments(&self) -> Result<Vec<Experiment>> {
        self.store.experiments()
    }

    pub fn active_experiments(&self) -> Result<Vec<Experiment>> {
        self.store.active_experiments()
    }

    /// An experiment annotated with its total score contributions.
    pub fn experiment_summary(&self, experiment_id: ExperimentId) -> Result<ExperimentSummary> {
        let experiment = self.store.experiment(experiment_id)?;
        let total_contributions = self.store.contribution_count(experiment_id)?;
        Ok(ExperimentSummary {
            experiment,
            total_contributions,
        })
    }

    pub fn experiment_summaries(&self) -> Result<Vec<ExperimentSummary>> {
        self.store
            .experiments()?
            .into_iter()
            .map(|experiment| {
                let total_contributions = self.store.contribution_count(experiment.id)?;
                Ok(ExperimentSummary {
                    experiment,
                    total_contributions,
                })
            })
            .collect()
    }

    /// Top contributors by submission count, across all experiments.
    pub fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        self.store.leaderboard(limit)
    }

    pub fn latest_saved_melodies(&self, limit: usize) -> Result<Vec<SavedMelody>> {
        self.store.latest_saved_melodies(limit)
    }

    /// Administrative trigger. Same entry point as the timer: it skips the
    /// all-scored submission condition but still honors the one-human-score
    /// gate.
    pub fn force_advance(&self, experiment_id: ExperimentId) -> Result<AdvanceOutcome> {
        self.controller.attempt_advance(experiment_id)
    }

    pub fn sweep(&self, experiment_id: ExperimentId) -> Result<SweepOutcome> {
        self.curator.sweep(experiment_id)
    }

    pub fn save_melody(
        &self,
        user_id: UserId,
        genome_id: GenomeId,
        name: &str,
        description: Option<&str>,
    ) -> Result<SavedMelody> {
        self.store.save_melody(user_id, genome_id, name, description)
    }

    pub fn saved_melodies(&self, user_id: UserId) -> Result<Vec<SavedMelody>> {
        self.store.saved_melodies(user_id)
    }

    pub fn user_has_scored(
        &self,
        user_id: UserId,
        experiment_id: ExperimentId,
        generation: u32,
    ) -> Result<bool> {
        self.store.user_has_scored(user_id, experiment_id, generation)
    }

    pub fn ancestor_branch(
        &self,
        genome_id: GenomeId,
        max_depth: usize,
    ) -> Result<AncestorBranch> {
        self.ancestry.ancestor_branch(genome_id, max_depth)
    }

    pub fn lowest_common_ancestor(&self, a: GenomeId, b: GenomeId) -> Result<LcaOutcome> {
        self.ancestry.lowest_common_ancestor(a, b)
    }
}
