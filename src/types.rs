use crate::error::TunebreederError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type GenomeId = u64;
pub type ExperimentId = u64;
pub type UserId = u64;
pub type MelodyId = u64;
pub type SubmissionId = u64;

/// MIDI pitch bounds, C2 to C6
pub const PITCH_MIN: u8 = 36;
pub const PITCH_MAX: u8 = 84;
pub const VELOCITY_MIN: u8 = 60;
pub const VELOCITY_MAX: u8 = 100;
pub const SCORE_MIN: f64 = 0.0;
pub const SCORE_MAX: f64 = 100.0;

/// Note length in beats. The four values form an ordered scale so that
/// conservative mutation can step one notch up or down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub enum NoteDuration {
    Quarter,
    Half,
    Whole,
    Double,
}

impl NoteDuration {
    pub const ALL: [NoteDuration; 4] = [
        NoteDuration::Quarter,
        NoteDuration::Half,
        NoteDuration::Whole,
        NoteDuration::Double,
    ];

    pub fn beats(self) -> f64 {
        match self {
            NoteDuration::Quarter => 0.25,
            NoteDuration::Half => 0.5,
            NoteDuration::Whole => 1.0,
            NoteDuration::Double => 2.0,
        }
    }

    /// One step shorter, clamped at the bottom of the scale.
    pub fn shorter(self) -> NoteDuration {
        match self {
            NoteDuration::Quarter => NoteDuration::Quarter,
            NoteDuration::Half => NoteDuration::Quarter,
            NoteDuration::Whole => NoteDuration::Half,
            NoteDuration::Double => NoteDuration::Whole,
        }
    }

    /// One step longer, clamped at the top of the scale.
    pub fn longer(self) -> NoteDuration {
        match self {
            NoteDuration::Quarter => NoteDuration::Half,
            NoteDuration::Half => NoteDuration::Whole,
            NoteDuration::Whole => NoteDuration::Double,
            NoteDuration::Double => NoteDuration::Double,
        }
    }
}

impl From<NoteDuration> for f64 {
    fn from(d: NoteDuration) -> f64 {
        d.beats()
    }
}

impl TryFrom<f64> for NoteDuration {
    type Error = TunebreederError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        NoteDuration::ALL
            .into_iter()
            .find(|d| d.beats() == value)
            .ok_or_else(|| {
                TunebreederError::Validation(format!("invalid note duration: {}", value))
            })
    }
}

/// One gene of a melody genome. Persisted as `{pitch, duration, velocity}`
/// tuples; construction validates the pitch and velocity windows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub pitch: u8,
    pub duration: NoteDuration,
    pub velocity: u8,
}

impl Note {
    pub fn new(pitch: u8, duration: NoteDuration, velocity: u8) -> crate::error::Result<Note> {
        let note = Note {
            pitch,
            duration,
            velocity,
        };
        if !note.is_valid() {
            return Err(TunebreederError::Validation(format!(
                "note out of range: pitch={} velocity={}",
                pitch, velocity
            )));
        }
        Ok(note)
    }

    pub fn is_valid(&self) -> bool {
        (PITCH_MIN..=PITCH_MAX).contains(&self.pitch)
            && (VELOCITY_MIN..=VELOCITY_MAX).contains(&self.velocity)
    }
}

/// A candidate melody with lineage and fitness. Content and parent links are
/// immutable after insert; only the score fields change, via a user
/// submission or a heuristic backfill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenomeRecord {
    pub id: GenomeId,
    pub generation: u32,
    pub notes: Vec<Note>,
    pub score: f64,
    /// True only when a human assigned the score; heuristic backfill never
    /// sets this.
    pub user_scored: bool,
    pub parent1: Option<GenomeId>,
    pub parent2: Option<GenomeId>,
    pub created_at: DateTime<Utc>,
}

impl GenomeRecord {
    /// Stored content can predate validation; malformed genomes are excluded
    /// from computation rather than crashing the engine.
    pub fn is_well_formed(&self) -> bool {
        !self.notes.is_empty() && self.notes.iter().all(Note::is_valid)
    }
}

/// Insert payload for a genome; the store assigns the id and timestamp.
#[derive(Debug, Clone)]
pub struct NewGenome {
    pub generation: u32,
    pub notes: Vec<Note>,
    pub score: f64,
    pub user_scored: bool,
    pub parent1: Option<GenomeId>,
    pub parent2: Option<GenomeId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    pub id: ExperimentId,
    pub name: String,
    pub description: Option<String>,
    pub current_generation: u32,
    pub max_generations: u32,
    pub best_score: f64,
    pub completed: bool,
    pub final_genome: Option<GenomeId>,
    /// Display name minted when the experiment completes.
    pub final_piece_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An experiment together with how many score submissions its genomes have
/// collected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentSummary {
    pub experiment: Experiment,
    pub total_contributions: usize,
}

/// One row of the contribution leaderboard. Users stay opaque ids here;
/// resolving them to display names is the caller's concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: UserId,
    pub contributions: usize,
}

/// Membership of a genome in an experiment's generation cohort.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenomeExperiment {
    pub genome_id: GenomeId,
    pub experiment_id: ExperimentId,
    pub generation: u32,
}

/// A user pin on a genome; exempts it from the cleanup sweep for as long as
/// the record exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedMelody {
    pub id: MelodyId,
    pub user_id: UserId,
    pub genome_id: GenomeId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One human scoring contribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreSubmission {
    pub id: SubmissionId,
    pub user_id: UserId,
    pub genome_id: GenomeId,
    pub score: f64,
    pub created_at: DateTime<Utc>,
}
