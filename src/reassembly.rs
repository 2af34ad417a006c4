//! Ordered reassembly of out-of-order completions.
//!
//! Workers finish chromosomes in data-dependent order; the track format
//! wants them in the exact order of the size table header. The buffer
//! releases completions strictly in that order, parking early arrivals in a
//! cache. It runs entirely on the coordinator thread, so no synchronization
//! is involved.

use log::warn;
use rustc_hash::FxHashMap;

use crate::pileup::TrackKind;
use crate::scheduler::Completion;
use crate::track::{Result as TrackResult, TrackSink};
use crate::transport::{self, TransportError};

/// The open output sinks of one run: a single merged track, or one track
/// per strand in strand-split mode.
pub enum TrackSinks<S: TrackSink> {
    Merged(S),
    Split { plus: S, minus: S },
}

impl<S: TrackSink> TrackSinks<S> {
    /// Write every sink's header. Exactly once, before any entries.
    pub fn add_header(&mut self, chroms: &[(String, u64)], max_zoom: u32) -> TrackResult<()> {
        match self {
            TrackSinks::Merged(sink) => sink.add_header(chroms, max_zoom),
            TrackSinks::Split { plus, minus } => {
                plus.add_header(chroms, max_zoom)?;
                minus.add_header(chroms, max_zoom)
            }
        }
    }

    /// Close every sink. Exactly once.
    pub fn close(&mut self) -> TrackResult<()> {
        match self {
            TrackSinks::Merged(sink) => sink.close(),
            TrackSinks::Split { plus, minus } => {
                plus.close()?;
                minus.close()
            }
        }
    }

    fn sink_for(&mut self, kind: TrackKind) -> Option<&mut S> {
        match (self, kind) {
            (TrackSinks::Merged(sink), TrackKind::Merged) => Some(sink),
            (TrackSinks::Split { plus, .. }, TrackKind::Plus) => Some(plus),
            (TrackSinks::Split { minus, .. }, TrackKind::Minus) => Some(minus),
            _ => None,
        }
    }
}

/// Buffers completions until their chromosome is next in table order.
pub struct ReassemblyBuffer {
    /// Required output order (the size-table order).
    order: Vec<String>,
    /// Index of the next unflushed chromosome.
    next: usize,
    /// Completions that arrived ahead of their position.
    cache: FxHashMap<String, Completion>,
}

impl ReassemblyBuffer {
    pub fn new(order: Vec<String>) -> Self {
        Self {
            order,
            next: 0,
            cache: FxHashMap::default(),
        }
    }

    /// The next chromosome the sinks are waiting for, if any.
    pub fn next_chrom(&self) -> Option<&str> {
        self.order.get(self.next).map(|s| s.as_str())
    }

    /// Completions parked ahead of their output position.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Chromosomes already released to the sinks.
    pub fn flushed(&self) -> usize {
        self.next
    }

    /// Every chromosome flushed and nothing left parked.
    pub fn is_done(&self) -> bool {
        self.next == self.order.len() && self.cache.is_empty()
    }

    /// Take one completion, flushing it now if it is next in order (plus
    /// any cached successors), or parking it otherwise.
    pub fn accept<S: TrackSink>(
        &mut self,
        completion: Completion,
        sinks: &mut TrackSinks<S>,
    ) -> TrackResult<()> {
        if self.next_chrom() == Some(completion.chrom.as_str()) {
            flush(completion, sinks)?;
            self.next += 1;
            // Release every cached successor that is now unblocked.
            loop {
                let Some(parked) = self
                    .order
                    .get(self.next)
                    .and_then(|next| self.cache.remove(next.as_str()))
                else {
                    break;
                };
                flush(parked, sinks)?;
                self.next += 1;
            }
            return Ok(());
        }

        if self.order[self.next..].iter().any(|c| c == &completion.chrom) {
            self.cache.insert(completion.chrom.clone(), completion);
            return Ok(());
        }

        // Unknown or already-flushed chromosome; destroy its regions so
        // nothing leaks, but write nothing.
        warn!("{}: unexpected completion, discarding", completion.chrom);
        for (_, handle) in completion.segments {
            let _ = transport::consume(handle);
        }
        Ok(())
    }
}

/// Consume a completion's regions and append them to the matching sinks.
///
/// Transport failures are recoverable: that track simply contributes no
/// data for the chromosome. Sink failures are fatal and propagate.
fn flush<S: TrackSink>(completion: Completion, sinks: &mut TrackSinks<S>) -> TrackResult<()> {
    let chrom = completion.chrom;
    for (kind, handle) in completion.segments {
        let (starts, ends, values) = match transport::consume(handle) {
            Ok(arrays) => arrays,
            Err(TransportError::NotFound(name)) => {
                warn!("{}/{}: region {} vanished, no data", chrom, kind.label(), name);
                continue;
            }
            Err(e) => {
                warn!("{}/{}: transport failure: {}", chrom, kind.label(), e);
                continue;
            }
        };
        if starts.is_empty() {
            continue;
        }
        match sinks.sink_for(kind) {
            Some(sink) => sink.add_entries(&chrom, &starts, &ends, &values)?,
            None => warn!("{}: no open sink for {} track", chrom, kind.label()),
        }
    }
    Ok(())
}
