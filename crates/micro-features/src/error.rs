//! Surface errors

use micro_frontend::FrontendError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeaturesError {
    #[error("invalid or destroyed frontend handle")]
    InvalidHandle,

    #[error("audio length ({actual} bytes) < required chunk size ({required} bytes)")]
    InsufficientAudio { required: usize, actual: usize },

    #[error(transparent)]
    Frontend(#[from] FrontendError),
}
