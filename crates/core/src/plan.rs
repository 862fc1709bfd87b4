//! Chunk planning
//!
//! Sizes an archive of known length into fixed-size parts. Part boundaries
//! must be exact: the remote store reassembles parts by byte offset, so an
//! off-by-one here corrupts the archive rather than failing loudly.
//!
//! # Invariants
//!
//! - `part_count == max(1, ceil(total_size / part_size))`
//! - `is_multi_part == (total_size > part_size)`
//! - Ranges are contiguous, non-overlapping and their lengths sum to
//!   `total_size`. Only the last part may be shorter than `part_size`.
//! - A zero-byte archive still has exactly one (empty) part.

use crate::error::{PlanError, PlanResult};

/// Derived transfer layout for one archive
///
/// Never stored; recomputed from the archive size and the configured
/// part size whenever it is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferPlan {
    /// Total archive size in bytes
    pub total_size: u64,
    /// Configured part size in bytes (power of two)
    pub part_size: u64,
    /// Number of parts, at least 1
    pub part_count: u64,
    /// Whether the multi-part protocol is required
    pub is_multi_part: bool,
}

/// Byte range of a single part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartRange {
    /// 0-based part index
    pub index: u64,
    /// Offset of the first byte
    pub start: u64,
    /// Number of bytes in the part
    pub length: u64,
}

impl PartRange {
    /// Offset one past the last byte
    pub fn end(&self) -> u64 {
        self.start + self.length
    }

    /// Inclusive HTTP-style range header, `bytes <first>-<last>/*`
    ///
    /// Returns `None` for an empty range, which has no last byte.
    pub fn content_range(&self) -> Option<String> {
        if self.length == 0 {
            return None;
        }
        Some(format!("bytes {}-{}/*", self.start, self.end() - 1))
    }
}

/// Pure part-boundary arithmetic
pub struct ChunkPlanner;

impl ChunkPlanner {
    /// Check that a part size is a non-zero power of two
    pub fn validate_part_size(part_size: u64) -> PlanResult<()> {
        if part_size == 0 {
            return Err(PlanError::ZeroPartSize);
        }
        if !part_size.is_power_of_two() {
            return Err(PlanError::PartSizeNotPowerOfTwo(part_size));
        }
        Ok(())
    }

    /// Compute the transfer plan for an archive of `total_size` bytes
    pub fn plan(total_size: u64, part_size: u64) -> PlanResult<TransferPlan> {
        Self::validate_part_size(part_size)?;

        let full_parts = total_size / part_size;
        let part_count = if total_size % part_size == 0 {
            full_parts.max(1)
        } else {
            full_parts + 1
        };

        Ok(TransferPlan {
            total_size,
            part_size,
            part_count,
            is_multi_part: total_size > part_size,
        })
    }

    /// Byte range of part `index` within `plan`
    pub fn range_for(plan: &TransferPlan, index: u64) -> PlanResult<PartRange> {
        if index >= plan.part_count {
            return Err(PlanError::PartIndexOutOfRange {
                index,
                part_count: plan.part_count,
            });
        }

        let start = index * plan.part_size;
        let length = if index + 1 == plan.part_count {
            plan.total_size - start
        } else {
            plan.part_size
        };

        Ok(PartRange {
            index,
            start,
            length,
        })
    }
}

impl TransferPlan {
    /// Iterate over every part range in ascending index order
    pub fn ranges(&self) -> PartRanges {
        PartRanges {
            plan: *self,
            next: 0,
        }
    }
}

/// Iterator over the part ranges of a plan
#[derive(Debug, Clone)]
pub struct PartRanges {
    plan: TransferPlan,
    next: u64,
}

impl Iterator for PartRanges {
    type Item = PartRange;

    fn next(&mut self) -> Option<PartRange> {
        let range = ChunkPlanner::range_for(&self.plan, self.next).ok()?;
        self.next += 1;
        Some(range)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.plan.part_count.saturating_sub(self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PartRanges {}
