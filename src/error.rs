//! Error type shared by every stage of the pipeline.
//!
//! Degenerate correlations (no overlap, zero variance) are not errors: they are
//! reported through [`crate::similarity::Correlation::Undefined`] and simply
//! produce no similarity pair.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KnnError {
    /// A rating or similarity record could not be decoded.
    /// Readers recover from this locally by skipping the record.
    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    /// The index is too large for the in-memory all-pairs pass.
    #[error("capacity exceeded: {items} items indexed, limit is {limit}; partition the input")]
    CapacityExceeded { items: usize, limit: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type KnnResult<T> = Result<T, KnnError>;

impl KnnError {
    pub(crate) fn malformed(line: usize, reason: impl Into<String>) -> Self {
        KnnError::MalformedRecord {
            line,
            reason: reason.into(),
        }
    }

    /// True for errors a reader recovers from by skipping the record.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, KnnError::MalformedRecord { .. })
    }
}
