//! Frontend Error Types

use thiserror::Error;

/// Errors that can occur while building or driving a frontend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrontendError {
    /// A state table could not be allocated
    #[error("Failed to allocate {what} ({len} elements)")]
    Allocation { what: &'static str, len: usize },

    /// The configuration derives an unusable pipeline shape
    #[error("Invalid frontend configuration: {0}")]
    InvalidConfig(String),

    /// Fewer samples than one step were supplied
    #[error("Insufficient samples: got {actual}, need at least {required}")]
    InsufficientSamples { required: usize, actual: usize },
}

/// Allocate a zero-initialized table, reporting allocation failure instead of aborting
pub(crate) fn zeroed<T: Clone + Default>(
    what: &'static str,
    len: usize,
) -> Result<Vec<T>, FrontendError> {
    let mut table = Vec::new();
    table
        .try_reserve_exact(len)
        .map_err(|_| FrontendError::Allocation { what, len })?;
    table.resize(len, T::default());
    Ok(table)
}
