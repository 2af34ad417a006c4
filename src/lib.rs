// Clippy allows for the whole crate
#![allow(clippy::too_many_arguments)]

//! cutsig: parallel cut-site signal track generator.
//!
//! Turns mapped sequencing reads into a genome-wide signal track: each
//! accepted read is reduced to a shifted cut site, cut sites are expanded
//! into coverage deltas, and a sweep-line pass emits constant-value
//! intervals. Chromosomes are computed concurrently by a worker pool and
//! reassembled into strict size-table order through a shared-region
//! transport, so the track writer always sees them in header order.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::{Path, PathBuf};
//! use cutsig::config::Config;
//! use cutsig::pipeline;
//!
//! let cfg = Config {
//!     output: PathBuf::from("signal.bedgraph"),
//!     ..Config::default()
//! };
//! let summary = pipeline::run(
//!     &cfg,
//!     Path::new("hg38.chrom.sizes"),
//!     &[PathBuf::from("sample.aln")],
//! ).unwrap();
//! println!("{} chromosomes written", summary.chromosomes);
//! ```

pub mod config;
pub mod filter;
pub mod genome;
pub mod pileup;
pub mod pipeline;
pub mod reads;
pub mod reassembly;
pub mod scheduler;
pub mod sweep;
pub mod track;
pub mod transport;

// Re-export commonly used types
pub use config::{Config, ExtendMode, FilterOptions, ShiftProfile};
pub use genome::Genome;
pub use sweep::SignalInterval;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{Config, ConfigError, ExtendMode, FilterOptions, ShiftProfile};
    pub use crate::filter::{FilterCondition, ReadFilter};
    pub use crate::genome::Genome;
    pub use crate::pileup::{encode_tracks, CountMap, DeltaMap, StrandCounts, TrackKind};
    pub use crate::pipeline::{run, PipelineError, RunSummary};
    pub use crate::reads::{ReadRecord, ReadSource, TextAlignmentSource};
    pub use crate::sweep::{sweep, SignalInterval};
    pub use crate::track::{BedGraphWriter, TrackSink};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_count_to_intervals_workflow() {
        use crate::pileup::{encode_fixed, CountMap};
        use crate::sweep::sweep;

        let mut counts = CountMap::default();
        counts.insert(100, 1);
        counts.insert(102, 1);

        let intervals = sweep(&encode_fixed(&counts, 2), "chr1/merged");

        assert_eq!(intervals.len(), 3);
        assert_eq!(intervals[0].start, 100);
        assert_eq!(intervals[1].value, 2.0);
        assert_eq!(intervals[2].end, 105);
    }
}
