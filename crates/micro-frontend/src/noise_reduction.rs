//! Noise Floor Estimation and Subtraction

use crate::bits::NOISE_REDUCTION_BITS;
use crate::config::{NoiseReductionConfig, SmoothingMode};
use crate::error::{zeroed, FrontendError};

const ONE: u32 = 1 << NOISE_REDUCTION_BITS;

fn quantize(coefficient: f32) -> u32 {
    (coefficient * ONE as f32) as u32
}

/// Per-channel noise estimate with floored spectral subtraction
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseReduction {
    smoothing_bits: u32,
    smoothing_mode: SmoothingMode,
    /// Q14 coefficients
    even_smoothing: u32,
    odd_smoothing: u32,
    min_signal_remaining: u32,
    /// Running noise estimate per channel, scaled up by `smoothing_bits`
    estimate: Vec<u32>,
}

impl NoiseReduction {
    pub fn new(config: &NoiseReductionConfig, num_channels: usize) -> Result<Self, FrontendError> {
        let coefficients = [
            config.even_smoothing,
            config.odd_smoothing,
            config.min_signal_remaining,
        ];
        if coefficients.iter().any(|c| !(0.0..=1.0).contains(c)) {
            return Err(FrontendError::InvalidConfig(format!(
                "noise reduction coefficients {coefficients:?} must lie in [0, 1]"
            )));
        }
        if config.smoothing_bits >= 16 {
            return Err(FrontendError::InvalidConfig(format!(
                "smoothing_bits {} leaves no headroom for the signal",
                config.smoothing_bits
            )));
        }

        Ok(Self {
            smoothing_bits: config.smoothing_bits,
            smoothing_mode: config.smoothing_mode,
            even_smoothing: quantize(config.even_smoothing),
            odd_smoothing: quantize(config.odd_smoothing),
            min_signal_remaining: quantize(config.min_signal_remaining),
            estimate: zeroed("noise estimate", num_channels)?,
        })
    }

    pub fn smoothing_bits(&self) -> u32 {
        self.smoothing_bits
    }

    /// Noise estimate per channel, scaled up by `smoothing_bits`
    pub fn estimate(&self) -> &[u32] {
        &self.estimate
    }

    /// Update the estimate with `signal` and replace it by the denoised signal
    pub fn apply(&mut self, signal: &mut [u32]) {
        for (channel, (value, estimate)) in signal.iter_mut().zip(&mut self.estimate).enumerate() {
            let scaled_up = *value << self.smoothing_bits;

            let smoothing = match self.smoothing_mode {
                SmoothingMode::Directional if scaled_up > *estimate => self.odd_smoothing,
                SmoothingMode::Directional => self.even_smoothing,
                SmoothingMode::ChannelParity if channel % 2 == 0 => self.even_smoothing,
                SmoothingMode::ChannelParity => self.odd_smoothing,
            };
            let one_minus_smoothing = ONE - smoothing;

            let updated = ((u64::from(scaled_up) * u64::from(smoothing)
                + u64::from(*estimate) * u64::from(one_minus_smoothing))
                >> NOISE_REDUCTION_BITS) as u32;
            *estimate = updated;

            // Never subtract more than the signal itself
            let noise = updated.min(scaled_up);

            let floor = ((u64::from(*value) * u64::from(self.min_signal_remaining))
                >> NOISE_REDUCTION_BITS) as u32;
            let subtracted = (scaled_up - noise) >> self.smoothing_bits;
            *value = subtracted.max(floor);
        }
    }

    pub fn reset(&mut self) {
        self.estimate.fill(0);
    }
}
