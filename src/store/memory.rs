use super::traits::DataStore;
use crate::error::{Result, TunebreederError};
use crate::types::{
    Experiment, ExperimentId, GenomeExperiment, GenomeId, GenomeRecord, LeaderboardEntry,
    NewGenome, SavedMelody, ScoreSubmission, UserId, SCORE_MAX, SCORE_MIN,
};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

#[derive(Default)]
struct Tables {
    experiments: HashMap<ExperimentId, Experiment>,
    genomes: HashMap<GenomeId, GenomeRecord>,
    links: Vec<GenomeExperiment>,
    melodies: Vec<SavedMelody>,
    submissions: Vec<ScoreSubmission>,
    next_experiment_id: ExperimentId,
    next_genome_id: GenomeId,
    next_melody_id: u64,
    next_submission_id: u64,
}

/// Reference `DataStore` backed by process memory. Every trait method takes
/// the table lock once, so the multi-row operations are atomic by
/// construction; a real database implementation would use transactions with
/// the same expected-generation guard.
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn clamp_score(score: f64) -> f64 {
    score.clamp(SCORE_MIN, SCORE_MAX)
}

impl Tables {
    fn insert_genome(
        &mut self,
        experiment_id: ExperimentId,
        genome: NewGenome,
    ) -> GenomeRecord {
        self.next_genome_id += 1;
        let record = GenomeRecord {
            id: self.next_genome_id,
            generation: genome.generation,
            notes: genome.notes,
            score: clamp_score(genome.score),
            user_scored: genome.user_scored,
            parent1: genome.parent1,
            parent2: genome.parent2,
            created_at: Utc::now(),
        };
        self.links.push(GenomeExperiment {
            genome_id: record.id,
            experiment_id,
            generation: record.generation,
        });
        self.genomes.insert(record.id, record.clone());
        record
    }

    fn experiment_mut(&mut self, id: ExperimentId) -> Result<&mut Experiment> {
        self.experiments
            .get_mut(&id)
            .ok_or_else(|| TunebreederError::NotFound(format!("experiment {}", id)))
    }
}

impl DataStore for InMemoryStore {
    fn create_experiment(
        &self,
        name: &str,
        description: Option<&str>,
        max_generations: u32,
        seed_population: Vec<NewGenome>,
    ) -> Result<Experiment> {
        let mut tables = self.tables.write().unwrap();
        tables.next_experiment_id += 1;
        let experiment = Experiment {
            id: tables.next_experiment_id,
            name: name.to_string(),
            description: description.map(str::to_string),
            current_generation: 0,
            max_generations,
            best_score: 0.0,
            completed: false,
            final_genome: None,
            final_piece_name: None,
            created_at: Utc::now(),
        };
        let id = experiment.id;
        tables.experiments.insert(id, experiment.clone());
        for genome in seed_population {
            tables.insert_genome(id, genome);
        }
        Ok(experiment)
    }

    fn experiment(&self, id: ExperimentId) -> Result<Experiment> {
        let tables = self.tables.read().unwrap();
        tables
            .experiments
            .get(&id)
            .cloned()
            .ok_or_else(|| TunebreederError::NotFound(format!("experiment {}", id)))
    }

    fn experiments(&self) -> Result<Vec<Experiment>> {
        let tables = self.tables.read().unwrap();
        let mut all: Vec<_> = tables.experiments.values().cloned().collect();
        all.sort_by_key(|e| e.id);
        Ok(all)
    }

    fn active_experiments(&self) -> Result<Vec<Experiment>> {
        Ok(self
            .experiments()?
            .into_iter()
            .filter(|e| !e.completed)
            .collect())
    }

    fn genome(&self, id: GenomeId) -> Result<GenomeRecord> {
        let tables = self.tables.read().unwrap();
        tables
            .genomes
            .get(&id)
            .cloned()
            .ok_or_else(|| TunebreederError::NotFound(format!("genome {}", id)))
    }

    fn genome_experiment(&self, genome_id: GenomeId) -> Result<ExperimentId> {
        let tables = self.tables.read().unwrap();
        tables
            .links
            .iter()
            .find(|l| l.genome_id == genome_id)
            .map(|l| l.experiment_id)
            .ok_or_else(|| {
                TunebreederError::NotFound(format!("experiment link for genome {}", genome_id))
            })
    }

    fn population(&self, experiment_id: ExperimentId, generation: u32) -> Result<Vec<GenomeRecord>> {
        let tables = self.tables.read().unwrap();
        let mut cohort: Vec<_> = tables
            .links
            .iter()
            .filter(|l| l.experiment_id == experiment_id && l.generation == generation)
            .filter_map(|l| tables.genomes.get(&l.genome_id).cloned())
            .collect();
        cohort.sort_by_key(|g| g.id);
        Ok(cohort)
    }

    fn experiment_genomes(&self, experiment_id: ExperimentId) -> Result<Vec<GenomeRecord>> {
        let tables = self.tables.read().unwrap();
        let mut all: Vec<_> = tables
            .links
            .iter()
            .filter(|l| l.experiment_id == experiment_id)
            .filter_map(|l| tables.genomes.get(&l.genome_id).cloned())
            .collect();
        all.sort_by_key(|g| g.id);
        Ok(all)
    }

    fn record_score(
        &self,
        genome_id: GenomeId,
        user_id: UserId,
        score: f64,
    ) -> Result<ScoreSubmission> {
        let mut tables = self.tables.write().unwrap();
        let score = clamp_score(score);
        let genome = tables
            .genomes
            .get_mut(&genome_id)
            .ok_or_else(|| TunebreederError::NotFound(format!("genome {}", genome_id)))?;
        genome.score = score;
        genome.user_scored = true;
        tables.next_submission_id += 1;
        let submission = ScoreSubmission {
            id: tables.next_submission_id,
            user_id,
            genome_id,
            score,
            created_at: Utc::now(),
        };
        tables.submissions.push(submission.clone());
        Ok(submission)
    }

    fn backfill_heuristic(&self, scores: &[(GenomeId, f64)]) -> Result<()> {
        let mut tables = self.tables.write().unwrap();
        for (genome_id, score) in scores {
            if let Some(genome) = tables.genomes.get_mut(genome_id) {
                if !genome.user_scored {
                    genome.score = clamp_score(*score);
                }
            }
        }
        Ok(())
    }

    fn update_best_score(&self, experiment_id: ExperimentId, score: f64) -> Result<()> {
        let mut tables = self.tables.write().unwrap();
        let experiment = tables.experiment_mut(experiment_id)?;
        if score > experiment.best_score {
            experiment.best_score = clamp_score(score);
        }
        Ok(())
    }

    fn commit_generation(
        &self,
        experiment_id: ExperimentId,
        expected_generation: u32,
        children: Vec<NewGenome>,
        best_score: f64,
    ) -> Result<Vec<GenomeRecord>> {
        let mut tables = self.tables.write().unwrap();
        let experiment = tables.experiment_mut(experiment_id)?;
        if experiment.completed {
            return Err(TunebreederError::Conflict(format!(
                "experiment {} already completed",
                experiment_id
            )));
        }
        if experiment.current_generation != expected_generation {
            return Err(TunebreederError::Conflict(format!(
                "experiment {} is at generation {}, expected {}",
                experiment_id, experiment.current_generation, expected_generation
            )));
        }
        experiment.current_generation = expected_generation + 1;
        if best_score > experiment.best_score {
            experiment.best_score = clamp_score(best_score);
        }
        let inserted = children
            .into_iter()
            .map(|child| tables.insert_genome(experiment_id, child))
            .collect();
        Ok(inserted)
    }

    fn complete_experiment(
        &self,
        experiment_id: ExperimentId,
        expected_generation: u32,
        final_genome: GenomeId,
        final_name: &str,
        best_score: f64,
    ) -> Result<Experiment> {
        let mut tables = self.tables.write().unwrap();
        let experiment = tables.experiment_mut(experiment_id)?;
        if experiment.completed {
            return Err(TunebreederError::Conflict(format!(
                "experiment {} already completed",
                experiment_id
            )));
        }
        if experiment.current_generation != expected_generation {
            return Err(TunebreederError::Conflict(format!(
                "experiment {} is at generation {}, expected {}",
                experiment_id, experiment.current_generation, expected_generation
            )));
        }
        experiment.completed = true;
        experiment.final_genome = Some(final_genome);
        experiment.final_piece_name = Some(final_name.to_string());
        if best_score > experiment.best_score {
            experiment.best_score = clamp_score(best_score);
        }
        Ok(experiment.clone())
    }

    fn save_melody(
        &self,
        user_id: UserId,
        genome_id: GenomeId,
        name: &str,
        description: Option<&str>,
    ) -> Result<SavedMelody> {
        let mut tables = self.tables.write().unwrap();
        if !tables.genomes.contains_key(&genome_id) {
            return Err(TunebreederError::NotFound(format!("genome {}", genome_id)));
        }
        tables.next_melody_id += 1;
        let melody = SavedMelody {
            id: tables.next_melody_id,
            user_id,
            genome_id,
            name: name.to_string(),
            description: description.map(str::to_string),
            created_at: Utc::now(),
        };
        tables.melodies.push(melody.clone());
        Ok(melody)
    }

    fn saved_melodies(&self, user_id: UserId) -> Result<Vec<SavedMelody>> {
        let tables = self.tables.read().unwrap();
        Ok(tables
            .melodies
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect())
    }

    fn saved_genome_ids(&self) -> Result<HashSet<GenomeId>> {
        let tables = self.tables.read().unwrap();
        Ok(tables.melodies.iter().map(|m| m.genome_id).collect())
    }

    fn user_has_scored(
        &self,
        user_id: UserId,
        experiment_id: ExperimentId,
        generation: u32,
    ) -> Result<bool> {
        let tables = self.tables.read().unwrap();
        let cohort: HashSet<GenomeId> = tables
            .links
            .iter()
            .filter(|l| l.experiment_id == experiment_id && l.generation == generation)
            .map(|l| l.genome_id)
            .collect();
        Ok(tables
            .submissions
            .iter()
            .any(|s| s.user_id == user_id && cohort.contains(&s.genome_id)))
    }

    fn contribution_count(&self, experiment_id: ExperimentId) -> Result<usize> {
        let tables = self.tables.read().unwrap();
        if !tables.experiments.contains_key(&experiment_id) {
            return Err(TunebreederError::NotFound(format!(
                "experiment {}",
                experiment_id
            )));
        }
        let members: HashSet<GenomeId> = tables
            .links
            .iter()
            .filter(|l| l.experiment_id == experiment_id)
            .map(|l| l.genome_id)
            .collect();
        Ok(tables
            .submissions
            .iter()
            .filter(|s| members.contains(&s.genome_id))
            .count())
    }

    fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        let tables = self.tables.read().unwrap();
        let mut counts: HashMap<UserId, usize> = HashMap::new();
        for submission in &tables.submissions {
            *counts.entry(submission.user_id).or_default() += 1;
        }
        let mut entries: Vec<LeaderboardEntry> = counts
            .into_iter()
            .map(|(user_id, contributions)| LeaderboardEntry {
                user_id,
                contributions,
            })
            .collect();
        entries.sort_by(|a, b| {
            b.contributions
                .cmp(&a.contributions)
                .then(a.user_id.cmp(&b.user_id))
        });
        entries.truncate(limit);
        Ok(entries)
    }

    fn latest_saved_melodies(&self, limit: usize) -> Result<Vec<SavedMelody>> {
        let tables = self.tables.read().unwrap();
        let mut melodies = tables.melodies.clone();
        melodies.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        melodies.truncate(limit);
        Ok(melodies)
    }

    fn sweep_genomes(&self, experiment_id: ExperimentId, doomed: &[GenomeId]) -> Result<usize> {
        let mut tables = self.tables.write().unwrap();
        let doomed: HashSet<GenomeId> = doomed.iter().copied().collect();
        let before = tables.genomes.len();
        tables.links.retain(|l| {
            !(l.experiment_id == experiment_id && doomed.contains(&l.genome_id))
        });
        tables.genomes.retain(|id, _| !doomed.contains(id));
        Ok(before - tables.genomes.len())
    }
}
