use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::chart::Chart;
use crate::note::{Lane, Note, LANE_COUNT};
use crate::tempo::TempoMap;
use crate::DomainError;

const GENERATOR_BPM: f64 = 120.0;
const MIN_GAP_MS: f64 = 100.0;
/// One hour.
pub const MAX_GENERATED_MS: f64 = 3_600_000.0;

/// Builds a practice chart: a quarter-note staircase across the lanes plus
/// scattered extra taps that keep clear of existing notes.
pub fn generate_chart(duration_ms: f64, seed: u64) -> Result<Chart, DomainError> {
    if !duration_ms.is_finite() || duration_ms > MAX_GENERATED_MS {
        return Err(DomainError::validation(format!(
            "chart length must be at most {MAX_GENERATED_MS} ms, got {duration_ms}"
        )));
    }
    let beat_ms = 60_000.0 / GENERATOR_BPM;
    let beats = (duration_ms.max(0.0) / beat_ms).floor() as usize;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut notes = Vec::with_capacity(beats + beats / 2);

    for beat in 0..beats {
        let lane = Lane::wrapping(beat);
        notes.push(Note::tap(notes.len() as u32 + 1, lane, beat as f64 * beat_ms));
    }

    for _ in 0..beats / 2 {
        let time = rng.gen_range(0.0..duration_ms.max(1.0));
        let crowded = notes
            .iter()
            .any(|note: &Note| (note.time_ms - time).abs() < MIN_GAP_MS);
        if crowded {
            continue;
        }
        let lane = Lane::wrapping(rng.gen_range(0..LANE_COUNT));
        notes.push(Note::tap(notes.len() as u32 + 1, lane, time));
    }

    Ok(Chart::new(
        format!("generated-{seed}"),
        "Generated practice",
        TempoMap::constant(GENERATOR_BPM),
        notes,
    ))
}
