//! Worker pool scheduling.
//!
//! A fixed pool of scoped threads pulls one chromosome at a time from a
//! bounded task channel, runs the whole per-chromosome computation
//! (collect -> encode -> sweep -> publish), and sends the resulting region
//! handles back on a completion channel in whatever order chromosomes
//! finish. The coordinator (the calling thread) is the sole consumer of
//! completions, so downstream reassembly needs no locking.

use std::sync::Arc;
use std::thread;

use crossbeam_channel::bounded;
use log::{debug, error, warn};

use crate::config::{ExtendMode, ShiftProfile};
use crate::filter::ReadFilter;
use crate::genome::Genome;
use crate::pileup::{collect_cut_sites, encode_tracks, TrackKind};
use crate::reads::ReadSource;
use crate::sweep::sweep;
use crate::transport::{self, RegionStore, SegmentHandle};

/// Everything a worker needs for one run. Immutable; shared by reference
/// with every worker at dispatch time.
pub struct TaskContext {
    pub genome: Arc<Genome>,
    pub sources: Vec<Box<dyn ReadSource>>,
    pub filter: ReadFilter,
    pub shifts: ShiftProfile,
    pub extend: ExtendMode,
    pub strand_split: bool,
    /// Multiplier applied to interval values before publication.
    pub scale: f64,
    pub store: RegionStore,
}

/// One finished chromosome: its published region handles, one per output
/// track. A track that produced no data (or whose region could not be
/// created) is simply absent.
#[derive(Debug)]
pub struct Completion {
    pub chrom: String,
    pub segments: Vec<(TrackKind, SegmentHandle)>,
}

/// Run the full computation for one chromosome and publish the results.
///
/// Failures are contained: fetch or transport trouble is logged and yields
/// an empty (or partial) completion rather than killing the pool.
pub fn process_chromosome(ctx: &TaskContext, chrom: &str) -> Completion {
    let mut segments = Vec::new();

    let Some(limit) = ctx.genome.chrom_size(chrom) else {
        warn!("{}: not in the size table, nothing to do", chrom);
        return Completion {
            chrom: chrom.to_string(),
            segments,
        };
    };

    let counts = match collect_cut_sites(
        chrom,
        limit,
        &ctx.sources,
        &ctx.filter,
        ctx.shifts,
        ctx.extend,
    ) {
        Ok(counts) => counts,
        Err(e) => {
            error!("{}: failed to read alignments: {}", chrom, e);
            return Completion {
                chrom: chrom.to_string(),
                segments,
            };
        }
    };
    debug!("{}: {} cut sites collected", chrom, counts.total());

    for (kind, deltas) in encode_tracks(&counts, ctx.extend, ctx.strand_split) {
        let context = format!("{}/{}", chrom, kind.label());
        let mut intervals = sweep(&deltas, &context);
        if ctx.scale != 1.0 {
            for iv in &mut intervals {
                iv.value = (iv.value as f64 * ctx.scale) as f32;
            }
        }

        let label = format!("{}-{}", chrom, kind.label());
        match ctx.store.publish(&label, &intervals) {
            Ok(handle) => segments.push((kind, handle)),
            Err(e) => {
                // Recoverable: the coordinator sees no data for this track.
                warn!("{}: cannot publish region: {}", context, e);
            }
        }
    }

    Completion {
        chrom: chrom.to_string(),
        segments,
    }
}

/// Dispatch one task per chromosome over a pool of `pool_size` workers and
/// feed completions, in arrival order, to `on_complete` on this thread.
///
/// Returns the number of completions delivered; a shortfall means a worker
/// died mid-task. After `on_complete` first fails, remaining completions
/// are still drained and their regions destroyed, then the error is
/// returned.
pub fn run_pool<E, F>(
    ctx: &TaskContext,
    chroms: &[String],
    pool_size: usize,
    mut on_complete: F,
) -> Result<usize, E>
where
    F: FnMut(Completion) -> Result<(), E>,
{
    let workers = pool_size.min(chroms.len()).max(1);
    let (task_tx, task_rx) = bounded::<String>(chroms.len().max(1));
    let (done_tx, done_rx) = bounded::<Completion>(chroms.len().max(1));

    for chrom in chroms {
        // Capacity covers the whole list; this never blocks.
        task_tx.send(chrom.clone()).expect("task channel closed");
    }
    drop(task_tx);

    thread::scope(|sc| {
        for ix in 0..workers {
            let task_rx = task_rx.clone();
            let done_tx = done_tx.clone();
            sc.spawn(move || {
                debug!("worker {} starting", ix);
                while let Ok(chrom) = task_rx.recv() {
                    let completion = process_chromosome(ctx, &chrom);
                    if done_tx.send(completion).is_err() {
                        break;
                    }
                }
                debug!("worker {} done", ix);
            });
        }
        drop(task_rx);
        drop(done_tx);

        let mut delivered = 0usize;
        let mut first_err: Option<E> = None;

        while let Ok(completion) = done_rx.recv() {
            delivered += 1;
            if first_err.is_none() {
                if let Err(e) = on_complete(completion) {
                    first_err = Some(e);
                }
            } else {
                // Still honor the destroy-exactly-once discipline.
                for (_, handle) in completion.segments {
                    let _ = transport::consume(handle);
                }
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(delivered),
        }
    })
}
