//! Alignment-source seam.
//!
//! The pipeline only needs a per-chromosome stream of mapped reads; where
//! they come from is behind the [`ReadSource`] trait. The bundled
//! implementation reads tab-delimited alignment tables
//! (`chrom\tstart\tend\tflag\tmapq\ttlen`), the strand taken from the
//! standard 0x10 flag bit. Parsing is byte-level with memchr field scanning.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use memchr::memchr;
use rustc_hash::FxHashMap;
use thiserror::Error;

/// SAM-style flag bit marking a reverse-strand alignment.
pub const FLAG_REVERSE: u16 = 0x10;

/// Errors raised while fetching reads from a source.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("parse error in {source_name} at line {line}: {message}")]
    Parse {
        source_name: String,
        line: usize,
        message: String,
    },

    /// Recoverable: the source simply has no reads for this chromosome.
    #[error("chromosome {chrom} not found in source {source_name}")]
    ChromosomeNotFound { chrom: String, source_name: String },
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// One mapped read, reduced to the fields the pipeline inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRecord {
    /// Leftmost alignment coordinate, 0-based inclusive.
    pub start: u64,
    /// Rightmost alignment coordinate, 0-based exclusive.
    pub end: u64,
    /// SAM-style flag bit field.
    pub flag: u16,
    pub mapping_quality: u8,
    /// Signed observed template (fragment) length.
    pub template_length: i64,
}

impl ReadRecord {
    #[inline]
    pub fn is_reverse(&self) -> bool {
        self.flag & FLAG_REVERSE != 0
    }
}

/// A supplier of reads for one chromosome at a time.
///
/// `fetch` returns every read overlapping `[0, limit)` for the chromosome.
/// A chromosome the source has never seen raises
/// [`FetchError::ChromosomeNotFound`]; callers treat that as zero reads.
pub trait ReadSource: Send + Sync {
    /// Human-readable name for log messages.
    fn name(&self) -> &str;

    fn fetch(&self, chrom: &str, limit: u64) -> Result<Vec<ReadRecord>>;
}

/// Fast u64 parsing over raw bytes - no allocation, no error formatting.
#[inline(always)]
fn parse_u64_fast(bytes: &[u8]) -> Option<u64> {
    if bytes.is_empty() {
        return None;
    }
    let mut n: u64 = 0;
    for &b in bytes {
        let d = b.wrapping_sub(b'0');
        if d > 9 {
            return None;
        }
        n = n.wrapping_mul(10).wrapping_add(d as u64);
    }
    Some(n)
}

/// Signed variant for template lengths.
#[inline(always)]
fn parse_i64_fast(bytes: &[u8]) -> Option<i64> {
    match bytes.split_first() {
        Some((b'-', rest)) => parse_u64_fast(rest).map(|n| -(n as i64)),
        _ => parse_u64_fast(bytes).map(|n| n as i64),
    }
}

/// Take the next tab-separated field, advancing `rest` past the tab.
#[inline(always)]
fn next_field<'a>(rest: &mut &'a [u8]) -> Option<&'a [u8]> {
    let tab = memchr(b'\t', rest)?;
    let field = &rest[..tab];
    *rest = &rest[tab + 1..];
    Some(field)
}

/// Split one alignment line into (chrom, record) using memchr.
#[inline]
fn parse_alignment_bytes(line: &[u8]) -> Option<(&[u8], ReadRecord)> {
    let mut rest = line;

    let chrom = next_field(&mut rest)?;
    let start = parse_u64_fast(next_field(&mut rest)?)?;
    let end = parse_u64_fast(next_field(&mut rest)?)?;
    let flag = parse_u64_fast(next_field(&mut rest)?)?;
    let mapq = parse_u64_fast(next_field(&mut rest)?)?;
    // Last field runs to end of line (any trailing columns are ignored).
    let tlen_end = memchr(b'\t', rest).unwrap_or(rest.len());
    let tlen = parse_i64_fast(&rest[..tlen_end])?;

    if start >= end || flag > u16::MAX as u64 || mapq > u8::MAX as u64 {
        return None;
    }

    Some((
        chrom,
        ReadRecord {
            start,
            end,
            flag: flag as u16,
            mapping_quality: mapq as u8,
            template_length: tlen,
        },
    ))
}

/// An alignment table loaded into memory, grouped by chromosome.
///
/// The whole file is read once at open time; `fetch` is then a cheap map
/// lookup, safe to call from any worker.
pub struct TextAlignmentSource {
    name: String,
    by_chrom: FxHashMap<String, Vec<ReadRecord>>,
}

impl TextAlignmentSource {
    /// Load an alignment table from a file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let name = path.as_ref().display().to_string();
        let file = File::open(path)?;
        Self::from_reader(file, name)
    }

    /// Load an alignment table from any readable source.
    pub fn from_reader<R: Read>(reader: R, name: String) -> Result<Self> {
        let mut by_chrom: FxHashMap<String, Vec<ReadRecord>> = FxHashMap::default();
        let mut reader = BufReader::new(reader);
        let mut buf = String::with_capacity(256);
        let mut line_num = 0;

        loop {
            buf.clear();
            if reader.read_line(&mut buf)? == 0 {
                break;
            }
            line_num += 1;

            let line = buf.trim_end();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (chrom, record) =
                parse_alignment_bytes(line.as_bytes()).ok_or_else(|| FetchError::Parse {
                    source_name: name.clone(),
                    line: line_num,
                    message: format!("malformed alignment record: {}", line),
                })?;

            by_chrom
                .entry(String::from_utf8_lossy(chrom).into_owned())
                .or_default()
                .push(record);
        }

        Ok(Self { name, by_chrom })
    }
}

impl ReadSource for TextAlignmentSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self, chrom: &str, limit: u64) -> Result<Vec<ReadRecord>> {
        let reads = self
            .by_chrom
            .get(chrom)
            .ok_or_else(|| FetchError::ChromosomeNotFound {
                chrom: chrom.to_string(),
                source_name: self.name.clone(),
            })?;

        Ok(reads
            .iter()
            .filter(|r| r.start < limit)
            .copied()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(content: &str) -> TextAlignmentSource {
        TextAlignmentSource::from_reader(content.as_bytes(), "test".to_string()).unwrap()
    }

    #[test]
    fn test_parse_alignment_line() {
        let (chrom, r) = parse_alignment_bytes(b"chr1\t100\t150\t0\t30\t180").unwrap();
        assert_eq!(chrom, b"chr1");
        assert_eq!(r.start, 100);
        assert_eq!(r.end, 150);
        assert!(!r.is_reverse());
        assert_eq!(r.template_length, 180);
    }

    #[test]
    fn test_parse_reverse_and_negative_tlen() {
        let (_, r) = parse_alignment_bytes(b"chr1\t100\t150\t16\t30\t-180").unwrap();
        assert!(r.is_reverse());
        assert_eq!(r.template_length, -180);
    }

    #[test]
    fn test_rejects_inverted_coordinates() {
        assert!(parse_alignment_bytes(b"chr1\t150\t100\t0\t30\t0").is_none());
    }

    #[test]
    fn test_fetch_missing_chromosome() {
        let s = source("chr1\t100\t150\t0\t30\t180\n");
        match s.fetch("chrM", 1000) {
            Err(FetchError::ChromosomeNotFound { chrom, .. }) => assert_eq!(chrom, "chrM"),
            other => panic!("expected ChromosomeNotFound, got {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn test_fetch_respects_limit() {
        let s = source("chr1\t100\t150\t0\t30\t0\nchr1\t900\t950\t0\t30\t0\n");
        let reads = s.fetch("chr1", 500).unwrap();
        assert_eq!(reads.len(), 1);
        assert_eq!(reads[0].start, 100);
    }

    #[test]
    fn test_malformed_line_is_parse_error() {
        let r = TextAlignmentSource::from_reader(
            "chr1\t100\tbogus\t0\t30\t0\n".as_bytes(),
            "bad".to_string(),
        );
        assert!(matches!(r, Err(FetchError::Parse { line: 1, .. })));
    }

    #[test]
    fn test_comments_and_blanks_skipped() {
        let s = source("# header\n\nchr1\t100\t150\t0\t30\t0\n");
        assert_eq!(s.fetch("chr1", 1000).unwrap().len(), 1);
    }
}
