//! Reassembly-order tests under adversarial completion timing.
//!
//! The sink must observe chromosomes in size-table order even when the
//! first chromosome is artificially the last to finish.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cutsig::config::{ExtendMode, ShiftProfile};
use cutsig::filter::ReadFilter;
use cutsig::genome::Genome;
use cutsig::reads::{ReadRecord, ReadSource, Result as FetchResult, TextAlignmentSource};
use cutsig::reassembly::{ReassemblyBuffer, TrackSinks};
use cutsig::scheduler::{run_pool, TaskContext};
use cutsig::track::{Result as TrackResult, TrackSink};
use cutsig::transport::RegionStore;

/// Wraps a source and stalls fetches for one chromosome.
struct DelayedSource {
    inner: TextAlignmentSource,
    slow_chrom: String,
    delay: Duration,
}

impl ReadSource for DelayedSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn fetch(&self, chrom: &str, limit: u64) -> FetchResult<Vec<ReadRecord>> {
        if chrom == self.slow_chrom {
            thread::sleep(self.delay);
        }
        self.inner.fetch(chrom, limit)
    }
}

/// Records the chromosome of every entry batch.
#[derive(Default)]
struct OrderSink {
    chroms: Vec<String>,
}

impl TrackSink for OrderSink {
    fn add_header(&mut self, _chroms: &[(String, u64)], _max_zoom: u32) -> TrackResult<()> {
        Ok(())
    }

    fn add_entries(
        &mut self,
        chrom: &str,
        starts: &[u64],
        ends: &[u64],
        values: &[f32],
    ) -> TrackResult<()> {
        assert_eq!(starts.len(), ends.len());
        assert_eq!(starts.len(), values.len());
        for i in 0..starts.len() {
            assert!(starts[i] < ends[i]);
            assert!(values[i] > 0.0);
        }
        self.chroms.push(chrom.to_string());
        Ok(())
    }

    fn close(&mut self) -> TrackResult<()> {
        Ok(())
    }
}

#[test]
fn test_delayed_first_chromosome_still_flushes_first() {
    let chrom_names = ["chr1", "chr2", "chr3", "chr4"];
    let mut genome = Genome::new();
    let mut alignments = String::new();
    for (i, chrom) in chrom_names.iter().enumerate() {
        genome.insert(chrom.to_string(), 10_000);
        let start = 100 * (i as u64 + 1);
        alignments.push_str(&format!("{}\t{}\t{}\t0\t30\t0\n", chrom, start, start + 50));
    }

    let inner =
        TextAlignmentSource::from_reader(alignments.as_bytes(), "delayed".to_string()).unwrap();
    let ctx = TaskContext {
        genome: Arc::new(genome),
        sources: vec![Box::new(DelayedSource {
            inner,
            slow_chrom: "chr1".to_string(),
            delay: Duration::from_millis(200),
        })],
        filter: ReadFilter::new(),
        shifts: ShiftProfile::default(),
        extend: ExtendMode::Fixed(10),
        strand_split: false,
        scale: 1.0,
        store: RegionStore::new().unwrap(),
    };

    let chroms: Vec<String> = chrom_names.iter().map(|s| s.to_string()).collect();
    let mut buffer = ReassemblyBuffer::new(chroms.clone());
    let mut sinks = TrackSinks::Merged(OrderSink::default());

    // With a pool of 4, chr2..chr4 complete long before chr1.
    let delivered = run_pool(&ctx, &chroms, 4, |completion| {
        buffer.accept(completion, &mut sinks)
    })
    .unwrap();

    assert_eq!(delivered, 4);
    assert!(buffer.is_done());
    assert_eq!(ctx.store.live_regions().unwrap(), 0);

    let TrackSinks::Merged(sink) = sinks else {
        unreachable!()
    };
    assert_eq!(sink.chroms, chrom_names);
}

#[test]
fn test_single_worker_pool_is_trivially_ordered() {
    let mut genome = Genome::new();
    genome.insert("chrA".to_string(), 1000);
    genome.insert("chrB".to_string(), 1000);
    let inner = TextAlignmentSource::from_reader(
        "chrA\t10\t60\t0\t30\t0\nchrB\t10\t60\t0\t30\t0\n".as_bytes(),
        "plain".to_string(),
    )
    .unwrap();

    let ctx = TaskContext {
        genome: Arc::new(genome),
        sources: vec![Box::new(inner)],
        filter: ReadFilter::new(),
        shifts: ShiftProfile::default(),
        extend: ExtendMode::Fixed(10),
        strand_split: false,
        scale: 1.0,
        store: RegionStore::new().unwrap(),
    };

    let chroms = vec!["chrA".to_string(), "chrB".to_string()];
    let mut buffer = ReassemblyBuffer::new(chroms.clone());
    let mut sinks = TrackSinks::Merged(OrderSink::default());

    run_pool(&ctx, &chroms, 1, |c| buffer.accept(c, &mut sinks)).unwrap();

    let TrackSinks::Merged(sink) = sinks else {
        unreachable!()
    };
    assert_eq!(sink.chroms, ["chrA", "chrB"]);
}
