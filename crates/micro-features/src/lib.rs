//! Micro Features
//!
//! Fixed-configuration speech features for keyword-spotting models: 40 mel
//! channels computed every 10 ms over a 30 ms window of 16 kHz mono audio.
//!
//! Audio is passed as raw little-endian 16-bit PCM bytes, one 10 ms chunk
//! (320 bytes) per call. Frontends are either owned ([`MicroFrontend`]) or
//! addressed by handle through a [`FrontendRegistry`]; the free functions
//! use a process-wide registry.

mod error;
pub mod pcm;
mod registry;

pub use error::FeaturesError;
pub use registry::{FrontendHandle, FrontendRegistry};

use micro_frontend::{FilterbankConfig, Frontend, FrontendConfig, WindowConfig, FEATURE_SCALE};
use once_cell::sync::Lazy;
use tracing::warn;

/// Feature step (ms)
pub const FEATURES_STEP_SIZE_MS: u32 = 10;
/// Window length of one feature (ms)
pub const FEATURE_DURATION_MS: u32 = 30;
/// Channels per feature vector
pub const PREPROCESSOR_FEATURE_SIZE: usize = 40;
/// Input sample rate (Hz)
pub const AUDIO_SAMPLE_FREQUENCY: u32 = 16000;
pub const SAMPLES_PER_CHUNK: usize =
    (FEATURES_STEP_SIZE_MS * AUDIO_SAMPLE_FREQUENCY / 1000) as usize;
pub const BYTES_PER_CHUNK: usize = SAMPLES_PER_CHUNK * 2;
/// Multiplier from raw 16-bit features to model input floats
pub const FLOAT32_SCALE: f32 = FEATURE_SCALE;

/// The built-in frontend configuration
pub fn fixed_config() -> FrontendConfig {
    FrontendConfig {
        sample_rate: AUDIO_SAMPLE_FREQUENCY,
        window: WindowConfig {
            size_ms: FEATURE_DURATION_MS,
            step_size_ms: FEATURES_STEP_SIZE_MS,
        },
        filterbank: FilterbankConfig {
            num_channels: PREPROCESSOR_FEATURE_SIZE,
            lower_band_limit: 125.0,
            upper_band_limit: 7500.0,
        },
        ..Default::default()
    }
}

/// Features produced by one chunk
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessOutput {
    /// One value per channel; empty until a full window is buffered
    pub features: Vec<f64>,
    pub samples_read: usize,
}

/// Decode one chunk from `audio` and run it through `frontend`
pub(crate) fn feed_chunk(
    frontend: &mut Frontend,
    audio: &[u8],
) -> Result<ProcessOutput, FeaturesError> {
    if audio.len() < BYTES_PER_CHUNK {
        warn!(actual = audio.len(), "Audio shorter than one chunk");
        return Err(FeaturesError::InsufficientAudio {
            required: BYTES_PER_CHUNK,
            actual: audio.len(),
        });
    }

    let samples = pcm::decode_le_i16(&audio[..BYTES_PER_CHUNK]);
    let output = frontend.process_samples(&samples)?;
    Ok(ProcessOutput {
        features: output.features(),
        samples_read: output.samples_read,
    })
}

/// Frontend owned by the caller; released on drop
#[derive(Debug)]
pub struct MicroFrontend {
    frontend: Frontend,
}

impl MicroFrontend {
    pub fn new() -> Result<Self, FeaturesError> {
        Ok(Self {
            frontend: Frontend::new(fixed_config())?,
        })
    }

    /// Process the first [`BYTES_PER_CHUNK`] bytes of `audio`
    pub fn process_samples(&mut self, audio: &[u8]) -> Result<ProcessOutput, FeaturesError> {
        feed_chunk(&mut self.frontend, audio)
    }

    pub fn reset(&mut self) {
        self.frontend.reset();
    }
}

static REGISTRY: Lazy<FrontendRegistry> = Lazy::new(FrontendRegistry::new);

/// Create a frontend in the process-wide registry
pub fn create_frontend() -> Result<FrontendHandle, FeaturesError> {
    REGISTRY.create()
}

pub fn process_samples(
    handle: FrontendHandle,
    audio: &[u8],
) -> Result<ProcessOutput, FeaturesError> {
    REGISTRY.process(handle, audio)
}

pub fn reset_frontend(handle: FrontendHandle) -> Result<(), FeaturesError> {
    REGISTRY.reset(handle)
}

pub fn destroy_frontend(handle: FrontendHandle) -> Result<(), FeaturesError> {
    REGISTRY.destroy(handle)
}
