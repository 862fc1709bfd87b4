//! Error types for transfer planning
//!
//! Planning errors are never retried: a bad part size or an out-of-range
//! part index is a programming or configuration mistake, not a transient
//! condition of the remote store.

use thiserror::Error;

/// Result type alias for planning operations
pub type PlanResult<T> = std::result::Result<T, PlanError>;

/// Errors raised while sizing an archive into parts
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// Part size of zero bytes
    #[error("Part size must be greater than zero")]
    ZeroPartSize,

    /// Part size that is not a power of two
    #[error("Part size must be a power of two, got {0}")]
    PartSizeNotPowerOfTwo(u64),

    /// Part index outside `0..part_count`
    #[error("Part index {index} out of range (part count {part_count})")]
    PartIndexOutOfRange {
        /// Requested index
        index: u64,
        /// Number of parts in the plan
        part_count: u64,
    },
}
