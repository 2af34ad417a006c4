//! Sweep-line interval emission.
//!
//! Converts a delta map (position -> signed signal change) into the minimal
//! ordered sequence of positive constant-value intervals. Pure function of
//! its input: the same delta map always yields byte-identical output.

use log::warn;
use rayon::prelude::*;

use crate::pileup::DeltaMap;

/// Minimum number of keys before the sort is parallelized. Below this,
/// thread spawn overhead dominates.
const PARALLEL_SORT_THRESHOLD: usize = 10_000;

/// One constant-value signal interval, half-open coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalInterval {
    pub start: u64,
    pub end: u64,
    pub value: f32,
}

/// Sweep a delta map into ordered, non-overlapping intervals.
///
/// Keys are visited in ascending order; a positive running value is emitted
/// as an interval ending at the next signal change. Starts pushed before
/// coordinate 0 by shifting are clamped to 0; an interval ending at or
/// before 0 vanishes entirely. A negative running value is an invariant
/// violation in the delta construction: it is logged and the offending
/// interval dropped, and sweeping continues. `context` names the
/// chromosome/track in log messages.
pub fn sweep(deltas: &DeltaMap, context: &str) -> Vec<SignalInterval> {
    let mut keys: Vec<i64> = deltas.keys().copied().collect();
    if keys.len() >= PARALLEL_SORT_THRESHOLD {
        keys.par_sort_unstable();
    } else {
        keys.sort_unstable();
    }

    let mut intervals = Vec::new();
    let mut value: i64 = 0;
    let mut prev_start: i64 = 0;
    let mut open = false;

    for &key in &keys {
        let delta = deltas[&key];
        // Zero net deltas neither emit nor reset the open interval.
        if delta == 0 {
            continue;
        }

        if !open {
            value = delta;
            prev_start = key;
            open = true;
            continue;
        }

        if value > 0 {
            let start = prev_start.max(0);
            if key > start {
                intervals.push(SignalInterval {
                    start: start as u64,
                    end: key as u64,
                    value: value as f32,
                });
            }
        } else if value < 0 {
            warn!(
                "{}: negative accumulated value {} over [{}, {}), dropping interval",
                context, value, prev_start, key
            );
        }

        value += delta;
        prev_start = key;
    }

    if value > 0 {
        // Balanced delta construction always closes coverage at the last
        // key; a positive residue means the map itself was malformed.
        warn!(
            "{}: unterminated coverage of value {} at {}",
            context, value, prev_start
        );
    }

    intervals
}
