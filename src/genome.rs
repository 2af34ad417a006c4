//! Chromosome size table.
//!
//! Parses two-column size files (chrom\tsize) and fixes the output order
//! for the whole pipeline: ascending lexicographic by name, the same order
//! the track header is initialized with. Workers and the coordinator share
//! one immutable instance.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::config::ConfigError;

/// Immutable chromosome-size table.
///
/// Unlike a plain map, this also carries the canonical flush order the
/// reassembly stage must honor.
#[derive(Debug, Clone, Default)]
pub struct Genome {
    sizes: HashMap<String, u64>,
    /// Chromosome names, ascending lexicographic.
    order: Vec<String>,
}

impl Genome {
    pub fn new() -> Self {
        Self {
            sizes: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Load a size table from a file.
    ///
    /// Format: tab-delimited `chrom\tsize` per line; blank lines and `#`
    /// comments are skipped. Any other row that does not parse as
    /// (name, non-negative integer) is a fatal configuration error.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let shown = path.as_ref().display().to_string();
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut genome = Self::new();

        for (line_num, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut fields = line.split('\t');
            let chrom = fields.next().unwrap_or("");
            let size_field = fields.next().ok_or_else(|| ConfigError::SizeTable {
                path: shown.clone(),
                line: line_num + 1,
                message: "expected two columns: chrom and size".to_string(),
            })?;

            let size: u64 = size_field.parse().map_err(|_| ConfigError::SizeTable {
                path: shown.clone(),
                line: line_num + 1,
                message: format!("invalid chromosome size: {}", size_field),
            })?;

            genome.insert(chrom.to_string(), size);
        }

        Ok(genome)
    }

    /// Insert a chromosome, keeping the order sorted.
    pub fn insert(&mut self, chrom: String, size: u64) {
        if !self.sizes.contains_key(&chrom) {
            let at = self.order.partition_point(|c| c < &chrom);
            self.order.insert(at, chrom.clone());
        }
        self.sizes.insert(chrom, size);
    }

    /// Get the size of a chromosome.
    #[inline]
    pub fn chrom_size(&self, chrom: &str) -> Option<u64> {
        self.sizes.get(chrom).copied()
    }

    #[inline]
    pub fn has_chrom(&self, chrom: &str) -> bool {
        self.sizes.contains_key(chrom)
    }

    /// Chromosome names in the canonical (lexicographic) output order.
    pub fn chromosomes(&self) -> impl Iterator<Item = &String> {
        self.order.iter()
    }

    /// (name, size) pairs in canonical order, as the track header wants them.
    pub fn header_entries(&self) -> Vec<(String, u64)> {
        self.order
            .iter()
            .map(|c| (c.clone(), self.sizes[c]))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_genome_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "chr2\t500000").unwrap();
        writeln!(file, "chr1\t1000000").unwrap();
        writeln!(file, "# comment line").unwrap();
        writeln!(file, "chr3\t250000").unwrap();

        let genome = Genome::from_file(file.path()).unwrap();

        assert_eq!(genome.chrom_size("chr1"), Some(1000000));
        assert_eq!(genome.chrom_size("chr4"), None);
        assert_eq!(genome.len(), 3);
    }

    #[test]
    fn test_order_is_lexicographic() {
        let mut genome = Genome::new();
        genome.insert("chr9".to_string(), 100);
        genome.insert("chr10".to_string(), 100);
        genome.insert("chr1".to_string(), 100);

        // "chr10" sorts before "chr9" lexicographically
        let order: Vec<&String> = genome.chromosomes().collect();
        assert_eq!(order, ["chr1", "chr10", "chr9"]);
    }

    #[test]
    fn test_bad_size_is_fatal() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "chr1\tnot-a-number").unwrap();
        assert!(Genome::from_file(file.path()).is_err());
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "chr1").unwrap();
        assert!(Genome::from_file(file.path()).is_err());
    }

    #[test]
    fn test_header_entries() {
        let mut genome = Genome::new();
        genome.insert("chrB".to_string(), 200);
        genome.insert("chrA".to_string(), 100);
        assert_eq!(
            genome.header_entries(),
            vec![("chrA".to_string(), 100), ("chrB".to_string(), 200)]
        );
    }
}
