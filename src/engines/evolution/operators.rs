use crate::error::{Result, TunebreederError};
use crate::types::{Note, NoteDuration, PITCH_MAX, PITCH_MIN, VELOCITY_MAX, VELOCITY_MIN};
use rand::seq::SliceRandom;
use rand::Rng;

/// Generate a random melody: every field sampled uniformly from its range.
pub fn random_notes<R: Rng>(length: usize, rng: &mut R) -> Vec<Note> {
    (0..length)
        .map(|_| Note {
            pitch: rng.gen_range(PITCH_MIN..=PITCH_MAX),
            duration: *NoteDuration::ALL.choose(rng).unwrap_or(&NoteDuration::Quarter),
            velocity: rng.gen_range(VELOCITY_MIN..=VELOCITY_MAX),
        })
        .collect()
}

/// Single-point crossover at the fixed midpoint: the child takes the first
/// half of `a` and the second half of `b`. Deterministic given the parents;
/// neither parent is touched.
pub fn crossover(a: &[Note], b: &[Note]) -> Vec<Note> {
    let point = a.len() / 2;
    let mut child = Vec::with_capacity(a.len());
    child.extend_from_slice(&a[..point.min(a.len())]);
    child.extend_from_slice(&b[point.min(b.len())..]);
    child
}

/// Perturb `num_genes` distinct positions. Conservative mode nudges one
/// field per note within a bounded window; otherwise the whole note is
/// resampled uniformly.
pub fn mutate<R: Rng>(
    notes: &mut [Note],
    num_genes: usize,
    conservative: bool,
    rng: &mut R,
) -> Result<()> {
    if num_genes > notes.len() {
        return Err(TunebreederError::Validation(format!(
            "cannot mutate {} genes in a genome of {} notes",
            num_genes,
            notes.len()
        )));
    }
    for idx in rand::seq::index::sample(rng, notes.len(), num_genes) {
        if conservative {
            nudge_note(&mut notes[idx], rng);
        } else {
            notes[idx] = Note {
                pitch: rng.gen_range(PITCH_MIN..=PITCH_MAX),
                duration: *NoteDuration::ALL.choose(rng).unwrap_or(&NoteDuration::Quarter),
                velocity: rng.gen_range(VELOCITY_MIN..=VELOCITY_MAX),
            };
        }
    }
    Ok(())
}

/// One bounded edit: pitch by one or two semitones, duration by one step of
/// the scale, or velocity by up to five, all clamped to their ranges.
fn nudge_note<R: Rng>(note: &mut Note, rng: &mut R) {
    match rng.gen_range(0..3) {
        0 => {
            let magnitude = rng.gen_range(1..=2) as i16;
            let delta = if rng.gen_bool(0.5) { magnitude } else { -magnitude };
            note.pitch =
                (note.pitch as i16 + delta).clamp(PITCH_MIN as i16, PITCH_MAX as i16) as u8;
        }
        1 => {
            note.duration = if rng.gen_bool(0.5) {
                note.duration.shorter()
            } else {
                note.duration.longer()
            };
        }
        _ => {
            let magnitude = rng.gen_range(1..=5) as i16;
            let delta = if rng.gen_bool(0.5) { magnitude } else { -magnitude };
            note.velocity =
                (note.velocity as i16 + delta).clamp(VELOCITY_MIN as i16, VELOCITY_MAX as i16) as u8;
        }
    }
}
