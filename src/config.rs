//! Run configuration.
//!
//! All knobs for one pipeline run live here, validated once before any
//! worker is spawned. The resulting value is immutable and handed to every
//! task at dispatch time; nothing in the pipeline reads global state.

use std::path::PathBuf;

use thiserror::Error;

/// Errors detected before scheduling. All of these abort the run.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chromosome size table {path}, line {line}: {message}")]
    SizeTable {
        path: String,
        line: usize,
        message: String,
    },

    #[error("fragment mode and strand-split output are mutually exclusive")]
    FragmentWithSplit,

    #[error("worker pool size must be at least 1")]
    EmptyPool,

    #[error("scale factor must be positive, got {0}")]
    NonPositiveScale(f64),

    #[error("fragment length bounds are inverted: {min} > {max}")]
    InvertedFragmentBounds { min: u64, max: u64 },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// How a cut site is expanded into covered bases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendMode {
    /// Expand each cut site downstream by a fixed number of bases.
    Fixed(u64),
    /// Pair plus-strand cut sites (fragment starts) with minus-strand cut
    /// sites (fragment ends); no fixed width is added.
    Fragment,
}

impl ExtendMode {
    /// Fixed width, or 0 in fragment mode.
    #[inline]
    pub fn width_or_zero(&self) -> u64 {
        match self {
            ExtendMode::Fixed(w) => *w,
            ExtendMode::Fragment => 0,
        }
    }
}

/// Optional read-filter bounds, 1:1 with the CLI filter flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterOptions {
    /// Flag bits that must all be set.
    pub required_flag: Option<u16>,
    /// Flag bits that must all be clear.
    pub excluded_flag: Option<u16>,
    /// Minimum mapping quality.
    pub min_quality: Option<u8>,
    /// Minimum absolute template length.
    pub min_fragment: Option<u64>,
    /// Maximum absolute template length.
    pub max_fragment: Option<u64>,
}

/// Signed cut-site shifts, applied additively before extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShiftProfile {
    /// Strand-symmetric shift (negated on the minus strand).
    pub shift: i64,
    /// Extra shift applied only to plus-strand cut sites.
    pub plus: i64,
    /// Extra shift applied only to minus-strand cut sites.
    pub minus: i64,
}

/// Immutable configuration for one pipeline run.
#[derive(Debug, Clone)]
pub struct Config {
    pub extend: ExtendMode,
    pub shifts: ShiftProfile,
    /// Produce two tracks (plus/minus) instead of one merged track.
    pub strand_split: bool,
    pub filter: FilterOptions,
    /// Worker pool size; clamped to the chromosome count at dispatch.
    pub pool_size: usize,
    /// Zoom levels requested from the track writer's header.
    pub max_zoom: u32,
    /// Multiplier applied to interval values before publication.
    pub scale: f64,
    /// Output path (prefix in strand-split mode).
    pub output: PathBuf,
}

impl Config {
    /// Check cross-option consistency. Called once before scheduling.
    pub fn validate(&self) -> Result<()> {
        if self.extend == ExtendMode::Fragment && self.strand_split {
            return Err(ConfigError::FragmentWithSplit);
        }
        if self.pool_size == 0 {
            return Err(ConfigError::EmptyPool);
        }
        if self.scale <= 0.0 {
            return Err(ConfigError::NonPositiveScale(self.scale));
        }
        if let (Some(min), Some(max)) = (self.filter.min_fragment, self.filter.max_fragment) {
            if min > max {
                return Err(ConfigError::InvertedFragmentBounds { min, max });
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extend: ExtendMode::Fixed(200),
            shifts: ShiftProfile::default(),
            strand_split: false,
            filter: FilterOptions::default(),
            pool_size: 1,
            max_zoom: 0,
            scale: 1.0,
            output: PathBuf::new(),
        }
    }
}
