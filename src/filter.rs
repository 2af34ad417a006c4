//! Read filtering.
//!
//! A filter is a small set of tagged conditions combined by explicit
//! conjunction - no closures, no dynamic dispatch. An empty filter accepts
//! everything.

use crate::config::FilterOptions;
use crate::reads::ReadRecord;

/// One acceptance condition over a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterCondition {
    /// Accept iff `(flag & required) == required`.
    RequiredBits(u16),
    /// Accept iff `(flag & excluded) == 0`.
    ExcludedBits(u16),
    /// Accept iff `mapping_quality >= min`.
    QualityFloor(u8),
    /// Accept iff `lo <= |template_length| <= hi`; each bound optional.
    FragmentLength { min: Option<u64>, max: Option<u64> },
}

impl FilterCondition {
    #[inline]
    fn accepts(&self, read: &ReadRecord) -> bool {
        match *self {
            FilterCondition::RequiredBits(required) => read.flag & required == required,
            FilterCondition::ExcludedBits(excluded) => read.flag & excluded == 0,
            FilterCondition::QualityFloor(min) => read.mapping_quality >= min,
            FilterCondition::FragmentLength { min, max } => {
                let len = read.template_length.unsigned_abs();
                min.map(|lo| len >= lo).unwrap_or(true) && max.map(|hi| len <= hi).unwrap_or(true)
            }
        }
    }
}

/// Conjunction of conditions; pure, no side effects.
#[derive(Debug, Clone, Default)]
pub struct ReadFilter {
    conditions: Vec<FilterCondition>,
}

impl ReadFilter {
    /// A filter that accepts every read.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, condition: FilterCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Build from the configuration surface; unset options contribute
    /// nothing.
    pub fn from_options(opts: &FilterOptions) -> Self {
        let mut filter = Self::new();
        if let Some(bits) = opts.required_flag {
            filter = filter.with(FilterCondition::RequiredBits(bits));
        }
        if let Some(bits) = opts.excluded_flag {
            filter = filter.with(FilterCondition::ExcludedBits(bits));
        }
        if let Some(min) = opts.min_quality {
            filter = filter.with(FilterCondition::QualityFloor(min));
        }
        if opts.min_fragment.is_some() || opts.max_fragment.is_some() {
            filter = filter.with(FilterCondition::FragmentLength {
                min: opts.min_fragment,
                max: opts.max_fragment,
            });
        }
        filter
    }

    #[inline]
    pub fn accepts(&self, read: &ReadRecord) -> bool {
        self.conditions.iter().all(|c| c.accepts(read))
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}
