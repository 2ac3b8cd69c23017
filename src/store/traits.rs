use crate::error::Result;
use crate::types::{
    Experiment, ExperimentId, GenomeId, GenomeRecord, LeaderboardEntry, NewGenome, SavedMelody,
    ScoreSubmission, UserId,
};
use std::collections::HashSet;

/// Persistence contract. The engine treats storage as a collaborator: plain
/// CRUD plus two multi-row operations (`commit_generation`, `sweep_genomes`)
/// that must be atomic. Both atomic operations carry an expected-generation
/// check; a mismatch surfaces as `TunebreederError::Conflict`, which the
/// controller resolves as a lost race rather than an error.
pub trait DataStore: Send + Sync {
    /// Create an experiment together with its generation-0 population in one
    /// transaction.
    fn create_experiment(
        &self,
        name: &str,
        description: Option<&str>,
        max_generations: u32,
        seed_population: Vec<NewGenome>,
    ) -> Result<Experiment>;

    fn experiment(&self, id: ExperimentId) -> Result<Experiment>;

    fn experiments(&self) -> Result<Vec<Experiment>>;

    fn active_experiments(&self) -> Result<Vec<Experiment>>;

    fn genome(&self, id: GenomeId) -> Result<GenomeRecord>;

    /// The experiment a genome belongs to.
    fn genome_experiment(&self, genome_id: GenomeId) -> Result<ExperimentId>;

    /// All genomes tagged with one generation of one experiment.
    fn population(&self, experiment_id: ExperimentId, generation: u32) -> Result<Vec<GenomeRecord>>;

    /// Every genome linked to the experiment, all generations. One fetch per
    /// ancestry or cleanup pass; traversal then runs over the snapshot.
    fn experiment_genomes(&self, experiment_id: ExperimentId) -> Result<Vec<GenomeRecord>>;

    /// Record a human score: sets the genome's score and `user_scored` flag
    /// and appends the submission, atomically.
    fn record_score(
        &self,
        genome_id: GenomeId,
        user_id: UserId,
        score: f64,
    ) -> Result<ScoreSubmission>;

    /// Write heuristic placeholder scores. Never touches `user_scored`, and
    /// skips genomes a human scored in the meantime.
    fn backfill_heuristic(&self, scores: &[(GenomeId, f64)]) -> Result<()>;

    fn update_best_score(&self, experiment_id: ExperimentId, score: f64) -> Result<()>;

    /// Persist an offspring cohort and advance the generation counter in one
    /// transaction, guarded by `expected_generation`.
    fn commit_generation(
        &self,
        experiment_id: ExperimentId,
        expected_generation: u32,
        children: Vec<NewGenome>,
        best_score: f64,
    ) -> Result<Vec<GenomeRecord>>;

    /// Terminal transition, guarded by `expected_generation`. Records the
    /// winning genome and the minted piece name.
    fn complete_experiment(
        &self,
        experiment_id: ExperimentId,
        expected_generation: u32,
        final_genome: GenomeId,
        final_name: &str,
        best_score: f64,
    ) -> Result<Experiment>;

    fn save_melody(
        &self,
        user_id: UserId,
        genome_id: GenomeId,
        name: &str,
        description: Option<&str>,
    ) -> Result<SavedMelody>;

    fn saved_melodies(&self, user_id: UserId) -> Result<Vec<SavedMelody>>;

    /// Every genome id pinned by any user; the cleanup exemption set.
    fn saved_genome_ids(&self) -> Result<HashSet<GenomeId>>;

    fn user_has_scored(
        &self,
        user_id: UserId,
        experiment_id: ExperimentId,
        generation: u32,
    ) -> Result<bool>;

    /// How many score submissions the experiment's genomes have collected,
    /// all generations combined.
    fn contribution_count(&self, experiment_id: ExperimentId) -> Result<usize>;

    /// Users ranked by total submissions, descending, at most `limit` rows.
    fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>>;

    /// The most recently saved melodies across all users, newest first.
    fn latest_saved_melodies(&self, limit: usize) -> Result<Vec<SavedMelody>>;

    /// Delete the given genomes and their experiment links in one
    /// transaction. Returns how many genomes went away.
    fn sweep_genomes(&self, experiment_id: ExperimentId, doomed: &[GenomeId]) -> Result<usize>;
}
