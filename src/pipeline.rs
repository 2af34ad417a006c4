//! Pipeline coordination.
//!
//! Loads the size table, opens the alignment sources and output sinks,
//! drives the worker pool, and feeds completions through the reassembly
//! buffer. All sink calls happen on this thread, in size-table order.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{info, warn};
use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::filter::ReadFilter;
use crate::genome::Genome;
use crate::reads::{FetchError, ReadSource, TextAlignmentSource};
use crate::reassembly::{ReassemblyBuffer, TrackSinks};
use crate::scheduler::{run_pool, TaskContext};
use crate::track::{BedGraphWriter, TrackError};
use crate::transport::RegionStore;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("alignment source error: {0}")]
    Reads(#[from] FetchError),

    #[error("track output error: {0}")]
    Track(#[from] TrackError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{missing} chromosome(s) never completed; a worker died")]
    Incomplete { missing: usize },
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// What a finished run produced.
#[derive(Debug)]
pub struct RunSummary {
    pub chromosomes: usize,
    pub outputs: Vec<PathBuf>,
}

/// Derive the two per-strand output paths from a single path:
/// `out.bedgraph` becomes `out_plus.bedgraph` / `out_minus.bedgraph`.
fn split_output_paths(output: &Path) -> (PathBuf, PathBuf) {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "track".to_string());
    let ext = output
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let with_suffix = |suffix: &str| output.with_file_name(format!("{}_{}{}", stem, suffix, ext));
    (with_suffix("plus"), with_suffix("minus"))
}

/// Run the whole pipeline with the given configuration.
pub fn run(cfg: &Config, genome_path: &Path, inputs: &[PathBuf]) -> Result<RunSummary> {
    cfg.validate()?;

    let genome = Arc::new(Genome::from_file(genome_path)?);
    info!(
        "loaded {} chromosomes from {}",
        genome.len(),
        genome_path.display()
    );

    let mut sources: Vec<Box<dyn ReadSource>> = Vec::with_capacity(inputs.len());
    for input in inputs {
        sources.push(Box::new(TextAlignmentSource::from_path(input)?));
    }

    let (mut sinks, outputs) = if cfg.strand_split {
        let (plus_path, minus_path) = split_output_paths(&cfg.output);
        let sinks = TrackSinks::Split {
            plus: BedGraphWriter::create(&plus_path)?,
            minus: BedGraphWriter::create(&minus_path)?,
        };
        (sinks, vec![plus_path, minus_path])
    } else {
        (
            TrackSinks::Merged(BedGraphWriter::create(&cfg.output)?),
            vec![cfg.output.clone()],
        )
    };
    sinks.add_header(&genome.header_entries(), cfg.max_zoom)?;

    let chroms: Vec<String> = genome.chromosomes().cloned().collect();
    let ctx = TaskContext {
        genome,
        sources,
        filter: ReadFilter::from_options(&cfg.filter),
        shifts: cfg.shifts,
        extend: cfg.extend,
        strand_split: cfg.strand_split,
        scale: cfg.scale,
        store: RegionStore::new()?,
    };

    let mut buffer = ReassemblyBuffer::new(chroms.clone());
    run_pool(&ctx, &chroms, cfg.pool_size, |completion| {
        buffer.accept(completion, &mut sinks)
    })?;

    if !buffer.is_done() {
        let missing = chroms.len() - buffer.flushed();
        return Err(PipelineError::Incomplete { missing });
    }

    sinks.close()?;

    match ctx.store.live_regions() {
        Ok(0) => {}
        Ok(n) => warn!("{} transport region(s) leaked", n),
        Err(e) => warn!("cannot inspect region store: {}", e),
    }

    info!(
        "wrote {} chromosome(s) to {} track file(s)",
        chroms.len(),
        outputs.len()
    );
    Ok(RunSummary {
        chromosomes: chroms.len(),
        outputs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_output_paths() {
        let (plus, minus) = split_output_paths(Path::new("/data/out.bedgraph"));
        assert_eq!(plus, Path::new("/data/out_plus.bedgraph"));
        assert_eq!(minus, Path::new("/data/out_minus.bedgraph"));
    }

    #[test]
    fn test_split_output_paths_without_extension() {
        let (plus, minus) = split_output_paths(Path::new("track"));
        assert_eq!(plus, Path::new("track_plus"));
        assert_eq!(minus, Path::new("track_minus"));
    }
}
