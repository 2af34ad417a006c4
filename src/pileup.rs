//! Cut-site collection and delta encoding.
//!
//! Each accepted read is reduced to a single integer cut position, counted
//! per strand, then turned into a map of signal-change events the sweeper
//! consumes. Positions are signed: shifting can push a cut before the
//! chromosome start, and the sweeper clamps at emission time.

use log::warn;
use rustc_hash::FxHashMap;

use crate::config::{ExtendMode, ShiftProfile};
use crate::filter::ReadFilter;
use crate::reads::{FetchError, ReadSource, Result as FetchResult};

/// Cut-site counts keyed by (possibly negative) genomic position.
pub type CountMap = FxHashMap<i64, u64>;

/// Net signal change beginning at each position.
pub type DeltaMap = FxHashMap<i64, i64>;

/// Which output track a delta map belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Merged,
    Plus,
    Minus,
}

impl TrackKind {
    pub fn label(&self) -> &'static str {
        match self {
            TrackKind::Merged => "merged",
            TrackKind::Plus => "plus",
            TrackKind::Minus => "minus",
        }
    }
}

/// Per-strand cut-site counts for one chromosome.
#[derive(Debug, Default)]
pub struct StrandCounts {
    pub plus: CountMap,
    pub minus: CountMap,
}

impl StrandCounts {
    pub fn is_empty(&self) -> bool {
        self.plus.is_empty() && self.minus.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.plus.values().sum::<u64>() + self.minus.values().sum::<u64>()
    }
}

/// Scan every source for one chromosome and accumulate cut-site counts.
///
/// Forward-strand reads anchor at `start + shift + shift_plus`; reverse
/// reads at `end - shift - shift_minus - ext`, where `ext` is the fixed
/// extension width (0 in fragment mode). A source without the chromosome is
/// logged and contributes nothing; other fetch failures propagate.
pub fn collect_cut_sites(
    chrom: &str,
    limit: u64,
    sources: &[Box<dyn ReadSource>],
    filter: &ReadFilter,
    shifts: ShiftProfile,
    extend: ExtendMode,
) -> FetchResult<StrandCounts> {
    let ext = extend.width_or_zero() as i64;
    let mut counts = StrandCounts::default();

    for source in sources {
        let reads = match source.fetch(chrom, limit) {
            Ok(reads) => reads,
            Err(FetchError::ChromosomeNotFound { .. }) => {
                warn!("{}: no reads for {}, skipping source", source.name(), chrom);
                continue;
            }
            Err(e) => return Err(e),
        };

        for read in &reads {
            if !filter.accepts(read) {
                continue;
            }
            if read.is_reverse() {
                let cut = read.end as i64 - shifts.shift - shifts.minus - ext;
                *counts.minus.entry(cut).or_insert(0) += 1;
            } else {
                let cut = read.start as i64 + shifts.shift + shifts.plus;
                *counts.plus.entry(cut).or_insert(0) += 1;
            }
        }
    }

    Ok(counts)
}

/// Fixed-width encoding: each count `v` at `k` contributes `+v` at `k` and
/// `-v` at `k + w + 1`, same-key deltas merged by summation.
pub fn encode_fixed(counts: &CountMap, width: u64) -> DeltaMap {
    let mut deltas = DeltaMap::default();
    let span = width as i64 + 1;
    for (&pos, &count) in counts {
        let v = count as i64;
        *deltas.entry(pos).or_insert(0) += v;
        *deltas.entry(pos + span).or_insert(0) -= v;
    }
    deltas
}

/// Fragment encoding: plus-strand counts open coverage, minus-strand counts
/// close it, with no width added.
pub fn encode_fragment(plus: &CountMap, minus: &CountMap) -> DeltaMap {
    let mut deltas = DeltaMap::default();
    for (&pos, &count) in plus {
        *deltas.entry(pos).or_insert(0) += count as i64;
    }
    for (&pos, &count) in minus {
        *deltas.entry(pos).or_insert(0) -= count as i64;
    }
    deltas
}

/// Sum two count maps positionally.
pub fn merge_counts(a: &CountMap, b: &CountMap) -> CountMap {
    let mut merged = a.clone();
    for (&pos, &count) in b {
        *merged.entry(pos).or_insert(0) += count;
    }
    merged
}

/// Turn one chromosome's counts into the delta maps of its output tracks:
/// two (plus/minus) in strand-split mode, one merged map otherwise.
///
/// Fragment mode with strand-split is rejected upstream by
/// `Config::validate`.
pub fn encode_tracks(
    counts: &StrandCounts,
    extend: ExtendMode,
    strand_split: bool,
) -> Vec<(TrackKind, DeltaMap)> {
    match (extend, strand_split) {
        (ExtendMode::Fixed(w), true) => vec![
            (TrackKind::Plus, encode_fixed(&counts.plus, w)),
            (TrackKind::Minus, encode_fixed(&counts.minus, w)),
        ],
        (ExtendMode::Fixed(w), false) => {
            let merged = merge_counts(&counts.plus, &counts.minus);
            vec![(TrackKind::Merged, encode_fixed(&merged, w))]
        }
        (ExtendMode::Fragment, _) => vec![(
            TrackKind::Merged,
            encode_fragment(&counts.plus, &counts.minus),
        )],
    }
}
