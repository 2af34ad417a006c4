//! Shared-region transport for finished interval arrays.
//!
//! A worker publishes one chromosome's intervals as three parallel arrays
//! (starts, ends, values) in a uniquely named region file, written through a
//! memory map; the coordinator attaches, decodes, and destroys the region
//! exactly once. Handles are move-only, so a region cannot be read after
//! destruction by construction; a region that has already vanished reports
//! `NotFound` instead of crashing.
//!
//! Region layout, little-endian: magic u64, count u64, then the three
//! arrays back to back (u64 starts, u64 ends, f32 values).

use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};

use memmap2::{Mmap, MmapMut};
use tempfile::TempDir;
use thiserror::Error;

use crate::sweep::SignalInterval;

const REGION_MAGIC: u64 = 0x5349_4753_4547_3031; // "SIGSEG01"
const HEADER_LEN: usize = 16;

#[derive(Error, Debug)]
pub enum TransportError {
    /// The region no longer exists (already consumed, or never created).
    #[error("transport region not found: {0}")]
    NotFound(String),

    #[error("cannot create transport region {name}: {source}")]
    Create {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("corrupt transport region {0}")]
    Corrupt(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Names one published region. Move-only: consuming takes the handle by
/// value, so a second read of the same region is unrepresentable.
#[derive(Debug)]
pub struct SegmentHandle {
    name: String,
    path: PathBuf,
    /// Element count, recorded for cheap pre-allocation on the consumer side.
    len: usize,
}

impl SegmentHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Directory holding the live regions of one run.
///
/// Backed by a temporary directory owned by the pipeline, so regions
/// orphaned by a failed run are reclaimed when the store drops.
pub struct RegionStore {
    root: PathBuf,
    counter: AtomicU64,
    _tempdir: Option<TempDir>,
}

impl RegionStore {
    /// Create a store in a fresh temporary directory.
    pub fn new() -> io::Result<Self> {
        let tempdir = tempfile::Builder::new().prefix("cutsig-regions-").tempdir()?;
        Ok(Self {
            root: tempdir.path().to_path_buf(),
            counter: AtomicU64::new(0),
            _tempdir: Some(tempdir),
        })
    }

    /// Create a store rooted at an existing directory (not cleaned up).
    pub fn at_path<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            counter: AtomicU64::new(0),
            _tempdir: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of regions currently on disk; zero after a clean run.
    pub fn live_regions(&self) -> io::Result<usize> {
        Ok(fs::read_dir(&self.root)?.count())
    }

    fn next_name(&self, label: &str) -> String {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}-{}.seg", process::id(), seq, label)
    }

    /// Materialize intervals into a newly created region and return its
    /// handle. The caller (a worker) owns the region only until the handle
    /// is handed to the coordinator.
    pub fn publish(&self, label: &str, intervals: &[SignalInterval]) -> Result<SegmentHandle> {
        let name = self.next_name(label);
        let path = self.root.join(&name);
        let n = intervals.len();
        let total = HEADER_LEN + n * (8 + 8 + 4);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| TransportError::Create {
                name: name.clone(),
                source,
            })?;
        file.set_len(total as u64)
            .map_err(|source| TransportError::Create {
                name: name.clone(),
                source,
            })?;

        let mut map = unsafe { MmapMut::map_mut(&file) }.map_err(|source| {
            TransportError::Create {
                name: name.clone(),
                source,
            }
        })?;

        map[0..8].copy_from_slice(&REGION_MAGIC.to_le_bytes());
        map[8..HEADER_LEN].copy_from_slice(&(n as u64).to_le_bytes());

        let mut off = HEADER_LEN;
        for iv in intervals {
            map[off..off + 8].copy_from_slice(&iv.start.to_le_bytes());
            off += 8;
        }
        for iv in intervals {
            map[off..off + 8].copy_from_slice(&iv.end.to_le_bytes());
            off += 8;
        }
        for iv in intervals {
            map[off..off + 4].copy_from_slice(&iv.value.to_le_bytes());
            off += 4;
        }
        map.flush()?;

        Ok(SegmentHandle { name, path, len: n })
    }
}

/// Attach to a region, copy out its three arrays, and destroy it.
///
/// The handle is consumed; destruction happens exactly once per region.
pub fn consume(handle: SegmentHandle) -> Result<(Vec<u64>, Vec<u64>, Vec<f32>)> {
    let file = match File::open(&handle.path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(TransportError::NotFound(handle.name));
        }
        Err(e) => return Err(e.into()),
    };

    let map = unsafe { Mmap::map(&file)? };
    if map.len() < HEADER_LEN {
        return Err(TransportError::Corrupt(handle.name));
    }

    let magic = u64::from_le_bytes(map[0..8].try_into().unwrap());
    let n = u64::from_le_bytes(map[8..HEADER_LEN].try_into().unwrap()) as usize;
    if magic != REGION_MAGIC || map.len() != HEADER_LEN + n * (8 + 8 + 4) {
        return Err(TransportError::Corrupt(handle.name));
    }

    let starts_end = HEADER_LEN + n * 8;
    let ends_end = starts_end + n * 8;

    let starts = map[HEADER_LEN..starts_end]
        .chunks_exact(8)
        .map(|b| u64::from_le_bytes(b.try_into().unwrap()))
        .collect();
    let ends = map[starts_end..ends_end]
        .chunks_exact(8)
        .map(|b| u64::from_le_bytes(b.try_into().unwrap()))
        .collect();
    let values = map[ends_end..]
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes(b.try_into().unwrap()))
        .collect();

    drop(map);
    fs::remove_file(&handle.path)?;

    Ok((starts, ends, values))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intervals() -> Vec<SignalInterval> {
        vec![
            SignalInterval {
                start: 100,
                end: 105,
                value: 1.0,
            },
            SignalInterval {
                start: 105,
                end: 110,
                value: 2.5,
            },
        ]
    }

    #[test]
    fn test_publish_consume_destroy() {
        let store = RegionStore::new().unwrap();
        let handle = store.publish("chr1-merged", &intervals()).unwrap();
        assert_eq!(handle.len(), 2);
        assert_eq!(store.live_regions().unwrap(), 1);

        let (starts, ends, values) = consume(handle).unwrap();
        assert_eq!(starts, vec![100, 105]);
        assert_eq!(ends, vec![105, 110]);
        assert_eq!(values, vec![1.0, 2.5]);

        // destroyed after consumption
        assert_eq!(store.live_regions().unwrap(), 0);
    }

    #[test]
    fn test_missing_region_is_not_found() {
        let store = RegionStore::new().unwrap();
        let handle = store.publish("chr1-merged", &intervals()).unwrap();

        // Simulate the region vanishing before the coordinator attaches.
        fs::remove_file(store.root().join(handle.name())).unwrap();

        match consume(handle) {
            Err(TransportError::NotFound(_)) => {}
            other => panic!("expected NotFound, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_empty_region() {
        let store = RegionStore::new().unwrap();
        let handle = store.publish("chrM-merged", &[]).unwrap();
        assert!(handle.is_empty());
        let (starts, ends, values) = consume(handle).unwrap();
        assert!(starts.is_empty() && ends.is_empty() && values.is_empty());
        assert_eq!(store.live_regions().unwrap(), 0);
    }

    #[test]
    fn test_unique_names() {
        let store = RegionStore::new().unwrap();
        let a = store.publish("chr1-merged", &[]).unwrap();
        let b = store.publish("chr1-merged", &[]).unwrap();
        assert_ne!(a.name(), b.name());
    }

    #[test]
    fn test_corrupt_region_detected() {
        let store = RegionStore::new().unwrap();
        let handle = store.publish("chr1-merged", &intervals()).unwrap();
        fs::write(store.root().join(handle.name()), b"short").unwrap();
        assert!(matches!(consume(handle), Err(TransportError::Corrupt(_))));
    }
}
