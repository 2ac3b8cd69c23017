use crate::types::Note;
use std::collections::HashMap;
use std::collections::HashSet;

/// Deterministic 0-100 fitness proxy for genomes nobody has rated yet. Five
/// equally weighted sub-scores, 0-20 each. Selection-only: callers must not
/// treat a heuristic score as a human one.
pub fn heuristic_score(notes: &[Note]) -> f64 {
    if notes.is_empty() {
        return 0.0;
    }
    let total = pitch_range_score(notes)
        + rhythm_score(notes)
        + contour_score(notes)
        + repetition_score(notes)
        + consonance_score(notes);
    total.clamp(0.0, 100.0)
}

/// Reward a pitch span near an octave (12 semitones), with a small bonus for
/// pitch-class variety.
fn pitch_range_score(notes: &[Note]) -> f64 {
    let min = notes.iter().map(|n| n.pitch).min().unwrap_or(0);
    let max = notes.iter().map(|n| n.pitch).max().unwrap_or(0);
    let span = (max - min) as f64;
    let base = (16.0 - (span - 12.0).abs() * 2.0).clamp(0.0, 16.0);

    let classes: HashSet<u8> = notes.iter().map(|n| n.pitch % 12).collect();
    let bonus = (classes.len() as f64 / 2.0).min(4.0);

    (base + bonus).clamp(0.0, 20.0)
}

/// Reward 2-5 distinct durations, plus a bonus for period-2 repetition of
/// the rhythm (dur[i] == dur[i+2]).
fn rhythm_score(notes: &[Note]) -> f64 {
    let distinct: HashSet<_> = notes.iter().map(|n| n.duration).collect();
    let base = if (2..=5).contains(&distinct.len()) {
        14.0
    } else {
        4.0
    };

    let bonus = if notes.len() > 2 {
        let repeats = notes
            .windows(3)
            .filter(|w| w[0].duration == w[2].duration)
            .count();
        6.0 * repeats as f64 / (notes.len() - 2) as f64
    } else {
        0.0
    };

    (base + bonus).clamp(0.0, 20.0)
}

/// Reward an up/down direction-change count close to half the note count.
fn contour_score(notes: &[Note]) -> f64 {
    if notes.len() < 3 {
        return 0.0;
    }
    let mut changes = 0usize;
    let mut last_direction = 0i8;
    for pair in notes.windows(2) {
        let direction = match pair[1].pitch.cmp(&pair[0].pitch) {
            std::cmp::Ordering::Greater => 1,
            std::cmp::Ordering::Less => -1,
            std::cmp::Ordering::Equal => continue,
        };
        if last_direction != 0 && direction != last_direction {
            changes += 1;
        }
        last_direction = direction;
    }
    let target = notes.len() as f64 / 2.0;
    let closeness = 1.0 - ((changes as f64 - target).abs() / target).min(1.0);
    20.0 * closeness
}

/// Reward repeated pitch phrases of length 2-4, capped.
fn repetition_score(notes: &[Note]) -> f64 {
    let pitches: Vec<u8> = notes.iter().map(|n| n.pitch).collect();
    let mut repeats = 0usize;
    for len in 2..=4usize {
        if pitches.len() < len {
            break;
        }
        let mut seen: HashMap<&[u8], usize> = HashMap::new();
        for window in pitches.windows(len) {
            *seen.entry(window).or_insert(0) += 1;
        }
        repeats += seen.values().filter(|&&c| c > 1).map(|c| c - 1).sum::<usize>();
    }
    (repeats as f64 * 2.0).min(20.0)
}

/// Reward a consonant-interval ratio between 40% and 80% of adjacent
/// intervals. Consonant means an absolute semitone delta of 0, 5, 7 or 12.
fn consonance_score(notes: &[Note]) -> f64 {
    if notes.len() < 2 {
        return 0.0;
    }
    let consonant = notes
        .windows(2)
        .filter(|pair| {
            let delta = (pair[1].pitch as i16 - pair[0].pitch as i16).unsigned_abs();
            matches!(delta, 0 | 5 | 7 | 12)
        })
        .count();
    let ratio = consonant as f64 / (notes.len() - 1) as f64;
    let distance = if ratio < 0.4 {
        0.4 - ratio
    } else if ratio > 0.8 {
        ratio - 0.8
    } else {
        0.0
    };
    (20.0 * (1.0 - distance / 0.4)).clamp(0.0, 20.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::evolution::operators::random_notes;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn deterministic_and_bounded() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let notes = random_notes(32, &mut rng);
            let first = heuristic_score(&notes);
            let second = heuristic_score(&notes);
            assert_eq!(first, second);
            assert!((0.0..=100.0).contains(&first));
        }
    }

    #[test]
    fn empty_genome_scores_zero() {
        assert_eq!(heuristic_score(&[]), 0.0);
    }

    #[test]
    fn octave_span_beats_monotone() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut spanning = random_notes(16, &mut rng);
        for (i, note) in spanning.iter_mut().enumerate() {
            note.pitch = 60 + (i % 13) as u8;
        }
        let mut flat = spanning.clone();
        for note in flat.iter_mut() {
            note.pitch = 60;
        }
        assert!(pitch_range_score(&spanning) > pitch_range_score(&flat));
    }
}
