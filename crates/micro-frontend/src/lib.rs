//! Micro Speech Frontend
//!
//! Streaming feature extraction for small keyword-spotting models. Each call
//! shifts new 16-bit PCM samples into an analysis window and, once a full
//! window is buffered, runs it through:
//!
//! window taper -> FFT power spectrum -> mel filterbank -> noise reduction
//! -> PCAN gain control -> log scale
//!
//! All running state (window buffer, noise estimate) lives in [`Frontend`],
//! one per audio stream.

mod config;
mod error;
mod fft;
mod filterbank;
mod fixed_point;
mod frontend;
mod log_scale;
mod noise_reduction;
mod pcan_gain_control;
mod window;

pub use config::{
    FilterbankConfig, FrontendConfig, LogScaleConfig, NoiseReductionConfig,
    PcanGainControlConfig, SmoothingMode, WindowConfig,
};
pub use error::FrontendError;
pub use frontend::{Frontend, FrontendOutput, FEATURE_SCALE};

/// Fixed-point precision constants shared by the pipeline stages
pub mod bits {
    /// Precision of the window taper coefficients
    pub const WINDOW_BITS: u32 = 12;
    /// Precision of the filterbank weights
    pub const FILTERBANK_BITS: u32 = 12;
    /// Precision of the noise reduction smoothing coefficients
    pub const NOISE_REDUCTION_BITS: u32 = 14;
    /// Precision of the PCAN signal-to-noise ratio
    pub const PCAN_SNR_BITS: u32 = 12;
    /// Output precision of the PCAN shrink function
    pub const PCAN_OUTPUT_BITS: u32 = 6;
}
