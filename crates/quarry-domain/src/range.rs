//! Row ranges and the row-range planner

use serde::{Deserialize, Serialize};
use std::fmt;

/// Half-open range `[start, end)` of data rows within one sheet
///
/// Ranges are produced once per sheet by [`plan`] and never mutated afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowRange {
    /// First row index (inclusive)
    pub start: usize,
    /// One past the last row index (exclusive)
    pub end: usize,
}

impl RowRange {
    /// Create a new range
    ///
    /// # Panics
    /// Panics if `start > end`
    pub fn new(start: usize, end: usize) -> Self {
        assert!(start <= end, "Range start must be <= end");
        Self { start, end }
    }

    /// Number of rows covered
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the range covers no rows
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Check if a row index falls inside the range
    pub fn contains(&self, row: usize) -> bool {
        row >= self.start && row < self.end
    }

    /// Convert to a std range for slicing
    pub fn as_range(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

impl fmt::Display for RowRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Error returned by [`plan`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanError {
    /// Chunk size must be positive
    ZeroChunkSize,
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanError::ZeroChunkSize => write!(f, "chunk size must be greater than zero"),
        }
    }
}

impl std::error::Error for PlanError {}

/// Split `total_rows` rows into contiguous ranges of `chunk_size` rows
///
/// The ranges are ordered, non-overlapping and cover `[0, total_rows)` exactly
/// once. The last range may be shorter than `chunk_size`. Zero rows yields an
/// empty plan.
///
/// # Examples
///
/// ```
/// use quarry_domain::{plan, RowRange};
///
/// let ranges = plan(70, 30).unwrap();
/// assert_eq!(ranges, vec![RowRange::new(0, 30), RowRange::new(30, 60), RowRange::new(60, 70)]);
/// ```
pub fn plan(total_rows: usize, chunk_size: usize) -> Result<Vec<RowRange>, PlanError> {
    if chunk_size == 0 {
        return Err(PlanError::ZeroChunkSize);
    }

    Ok((0..total_rows)
        .step_by(chunk_size)
        .map(|start| RowRange {
            start,
            end: (start + chunk_size).min(total_rows),
        })
        .collect())
}
