//! Track output.
//!
//! The pipeline only relies on an append contract: header once, ordered
//! entry batches, close once. [`TrackSink`] captures that contract; the
//! bundled implementation writes bedGraph-style text using zero-allocation
//! itoa/ryu formatting. Binary track containers with real zoom levels can
//! implement the same trait.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use thiserror::Error;

/// Output buffer size (256KB).
const BUF_SIZE: usize = 256 * 1024;

#[derive(Error, Debug)]
pub enum TrackError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("track header must be written exactly once, before any entries")]
    HeaderMisuse,

    #[error("entry arrays have mismatched lengths: {starts}/{ends}/{values}")]
    LengthMismatch {
        starts: usize,
        ends: usize,
        values: usize,
    },

    #[error("track writer is already closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TrackError>;

/// Append contract of a track file.
///
/// Callers guarantee `start < end`, positive values, and strictly
/// increasing starts within a chromosome across calls; chromosomes arrive
/// in the order given to `add_header`.
pub trait TrackSink {
    /// Write the header. Exactly once, before any entries.
    fn add_header(&mut self, chroms: &[(String, u64)], max_zoom: u32) -> Result<()>;

    /// Append one batch of equal-length interval arrays for `chrom`.
    fn add_entries(
        &mut self,
        chrom: &str,
        starts: &[u64],
        ends: &[u64],
        values: &[f32],
    ) -> Result<()>;

    /// Flush and finalize. Exactly once.
    fn close(&mut self) -> Result<()>;
}

/// bedGraph-style text writer.
///
/// The header is recorded as a `track` line; zoom levels are a binary
/// container concern and are ignored here.
pub struct BedGraphWriter<W: Write> {
    writer: BufWriter<W>,
    itoa_buf: itoa::Buffer,
    ryu_buf: ryu::Buffer,
    name: String,
    header_written: bool,
    closed: bool,
}

impl BedGraphWriter<File> {
    /// Create the output file, truncating any existing one.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let name = path.as_ref().display().to_string();
        let file = File::create(path)?;
        Ok(Self::new(file, name))
    }
}

impl<W: Write> BedGraphWriter<W> {
    pub fn new(output: W, name: String) -> Self {
        Self {
            writer: BufWriter::with_capacity(BUF_SIZE, output),
            itoa_buf: itoa::Buffer::new(),
            ryu_buf: ryu::Buffer::new(),
            name,
            header_written: false,
            closed: false,
        }
    }
}

impl<W: Write> TrackSink for BedGraphWriter<W> {
    fn add_header(&mut self, _chroms: &[(String, u64)], _max_zoom: u32) -> Result<()> {
        if self.header_written || self.closed {
            return Err(TrackError::HeaderMisuse);
        }
        self.header_written = true;
        writeln!(self.writer, "track type=bedGraph name=\"{}\"", self.name)?;
        Ok(())
    }

    fn add_entries(
        &mut self,
        chrom: &str,
        starts: &[u64],
        ends: &[u64],
        values: &[f32],
    ) -> Result<()> {
        if self.closed {
            return Err(TrackError::Closed);
        }
        if !self.header_written {
            return Err(TrackError::HeaderMisuse);
        }
        if starts.len() != ends.len() || starts.len() != values.len() {
            return Err(TrackError::LengthMismatch {
                starts: starts.len(),
                ends: ends.len(),
                values: values.len(),
            });
        }

        let chrom_bytes = chrom.as_bytes();
        for i in 0..starts.len() {
            self.writer.write_all(chrom_bytes)?;
            self.writer.write_all(b"\t")?;
            self.writer
                .write_all(self.itoa_buf.format(starts[i]).as_bytes())?;
            self.writer.write_all(b"\t")?;
            self.writer
                .write_all(self.itoa_buf.format(ends[i]).as_bytes())?;
            self.writer.write_all(b"\t")?;
            self.writer
                .write_all(self.ryu_buf.format(values[i]).as_bytes())?;
            self.writer.write_all(b"\n")?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(TrackError::Closed);
        }
        self.closed = true;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Vec<(String, u64)> {
        vec![("chr1".to_string(), 1000)]
    }

    #[test]
    fn test_writes_entries() {
        let mut out = Vec::new();
        {
            let mut w = BedGraphWriter::new(&mut out, "test".to_string());
            w.add_header(&header(), 0).unwrap();
            w.add_entries("chr1", &[100, 105], &[105, 110], &[1.0, 2.5])
                .unwrap();
            w.close().unwrap();
        }
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "track type=bedGraph name=\"test\"\nchr1\t100\t105\t1.0\nchr1\t105\t110\t2.5\n"
        );
    }

    #[test]
    fn test_header_exactly_once() {
        let mut out = Vec::new();
        let mut w = BedGraphWriter::new(&mut out, "t".to_string());
        w.add_header(&header(), 0).unwrap();
        assert!(matches!(
            w.add_header(&header(), 0),
            Err(TrackError::HeaderMisuse)
        ));
    }

    #[test]
    fn test_entries_require_header() {
        let mut out = Vec::new();
        let mut w = BedGraphWriter::new(&mut out, "t".to_string());
        assert!(matches!(
            w.add_entries("chr1", &[0], &[1], &[1.0]),
            Err(TrackError::HeaderMisuse)
        ));
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let mut out = Vec::new();
        let mut w = BedGraphWriter::new(&mut out, "t".to_string());
        w.add_header(&header(), 0).unwrap();
        assert!(matches!(
            w.add_entries("chr1", &[0, 5], &[1], &[1.0]),
            Err(TrackError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_closed_rejects_further_use() {
        let mut out = Vec::new();
        let mut w = BedGraphWriter::new(&mut out, "t".to_string());
        w.add_header(&header(), 0).unwrap();
        w.close().unwrap();
        assert!(matches!(
            w.add_entries("chr1", &[0], &[1], &[1.0]),
            Err(TrackError::Closed)
        ));
        assert!(matches!(w.close(), Err(TrackError::Closed)));
    }
}
