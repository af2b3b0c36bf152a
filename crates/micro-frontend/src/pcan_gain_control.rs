//! Per-Channel Amplitude Normalization (PCAN)
//!
//! The gain for each channel is a function of its noise estimate,
//! `2^gain_bits * (noise + offset)^-strength`, evaluated through a
//! piecewise-quadratic lookup table with one segment per power of two.

use crate::bits::{PCAN_OUTPUT_BITS, PCAN_SNR_BITS};
use crate::config::PcanGainControlConfig;
use crate::error::{zeroed, FrontendError};
use crate::fixed_point::most_significant_bit32;

const WIDE_DYNAMIC_FUNCTION_BITS: u32 = 32;
const WIDE_DYNAMIC_FUNCTION_LUT_SIZE: usize = 4 * WIDE_DYNAMIC_FUNCTION_BITS as usize - 3;

#[derive(Debug, Clone, PartialEq)]
pub struct PcanGainControl {
    snr_shift: i32,
    gain_lut: Vec<i16>,
}

impl PcanGainControl {
    /// Build the gain table
    ///
    /// `smoothing_bits` is the precision of the noise estimate and
    /// `input_correction_bits` the filterbank scaling the frontend applies.
    pub fn new(
        config: &PcanGainControlConfig,
        smoothing_bits: u32,
        input_correction_bits: i32,
    ) -> Result<Self, FrontendError> {
        let snr_shift = config.gain_bits - input_correction_bits - PCAN_SNR_BITS as i32;
        if !(0..32).contains(&snr_shift) || !(0..32).contains(&config.gain_bits) {
            return Err(FrontendError::InvalidConfig(format!(
                "gain_bits {} gives an SNR shift of {snr_shift}",
                config.gain_bits
            )));
        }
        let input_bits = smoothing_bits as i32 - input_correction_bits;
        let gain = |x: u32| gain_lookup(config, input_bits, x);

        let mut gain_lut = zeroed::<i16>("pcan gain table", WIDE_DYNAMIC_FUNCTION_LUT_SIZE)?;
        gain_lut[0] = gain(0);
        gain_lut[1] = gain(1);
        for interval in 2..=WIDE_DYNAMIC_FUNCTION_BITS {
            let x0: u32 = 1 << (interval - 1);
            let x1 = x0 + (x0 >> 1);
            let x2 = if interval == WIDE_DYNAMIC_FUNCTION_BITS {
                x0 + (x0 - 1)
            } else {
                2 * x0
            };

            let y0 = gain(x0);
            let y1 = gain(x1);
            let y2 = gain(x2);

            let diff1 = i32::from(y1) - i32::from(y0);
            let diff2 = i32::from(y2) - i32::from(y0);
            let a1 = 4 * diff1 - diff2;
            let a2 = diff2 - a1;

            let base = 4 * interval as usize - 6;
            gain_lut[base] = y0;
            gain_lut[base + 1] = a1 as i16;
            gain_lut[base + 2] = a2 as i16;
        }

        Ok(Self { snr_shift, gain_lut })
    }

    /// Gain for a channel whose noise estimate is `x`
    pub fn gain(&self, x: u32) -> i16 {
        wide_dynamic_function(x, &self.gain_lut)
    }

    /// Normalize `signal` by the gain derived from `noise_estimate`
    pub fn apply(&self, signal: &mut [u32], noise_estimate: &[u32]) {
        for (value, &noise) in signal.iter_mut().zip(noise_estimate) {
            let gain = self.gain(noise) as u32;
            let snr = ((u64::from(*value) * u64::from(gain)) >> self.snr_shift) as u32;
            *value = shrink(snr);
        }
    }
}

fn gain_lookup(config: &PcanGainControlConfig, input_bits: i32, x: u32) -> i16 {
    let x = x as f32 / 2f32.powi(input_bits);
    let gain = 2f32.powi(config.gain_bits) * (x + config.offset).powf(-config.strength);
    if gain > f32::from(i16::MAX) {
        i16::MAX
    } else {
        (gain + 0.5) as i16
    }
}

fn wide_dynamic_function(x: u32, lut: &[i16]) -> i16 {
    if x <= 2 {
        return lut[x as usize];
    }

    let interval = most_significant_bit32(x);
    let lut = &lut[4 * interval as usize - 6..];

    let position = if interval < 11 {
        x << (11 - interval)
    } else {
        x >> (interval - 11)
    };
    let frac = (position & 0x3FF) as i32;

    let mut result = (i32::from(lut[2]) * frac) >> 5;
    result = result.wrapping_add(i32::from(lut[1]) << 5);
    result = result.wrapping_mul(frac);
    result = result.wrapping_add(1 << 14) >> 15;
    result += i32::from(lut[0]);
    result as i16
}

/// Soft knee that compresses small ratios quadratically and large ones linearly
fn shrink(x: u32) -> u32 {
    if x < (2 << PCAN_SNR_BITS) {
        (x * x) >> (2 + 2 * PCAN_SNR_BITS - PCAN_OUTPUT_BITS)
    } else {
        (x >> (PCAN_SNR_BITS - PCAN_OUTPUT_BITS)) - (1 << PCAN_OUTPUT_BITS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Default frontend: smoothing_bits 10, 512-point FFT -> correction 3
    fn default_pcan() -> PcanGainControl {
        PcanGainControl::new(&PcanGainControlConfig::default(), 10, 3).unwrap()
    }

    #[test]
    fn test_snr_shift() {
        assert_eq!(default_pcan().snr_shift, 6);
    }

    #[test]
    fn test_lut_matches_gain_at_powers_of_two() {
        let pcan = default_pcan();
        let config = PcanGainControlConfig::default();
        for x in [0u32, 1, 2, 4, 64, 1024, 1 << 20] {
            assert_eq!(pcan.gain(x), gain_lookup(&config, 7, x), "x = {x}");
        }
    }

    #[test]
    fn test_lut_tracks_gain_between_knots() {
        let pcan = default_pcan();
        let config = PcanGainControlConfig::default();
        for x in [3u32, 100, 777, 5_000, 123_456, 9_999_999] {
            let expected = i32::from(gain_lookup(&config, 7, x));
            let got = i32::from(pcan.gain(x));
            assert!((expected - got).abs() <= 2 + expected / 100, "x = {x}: {got} vs {expected}");
        }
    }

    #[test]
    fn test_gain_decreases_with_noise() {
        let pcan = default_pcan();
        let mut previous = pcan.gain(0);
        for shift in 4..31 {
            let gain = pcan.gain(1 << shift);
            assert!(gain <= previous);
            previous = gain;
        }
        assert!(pcan.gain(1 << 30) < pcan.gain(1 << 10) / 100);
    }

    #[test]
    fn test_quieter_noise_gets_more_gain() {
        let pcan = default_pcan();
        let mut signal = [1000u32, 1000];
        pcan.apply(&mut signal, &[1 << 12, 1 << 22]);
        assert!(signal[0] > signal[1]);
    }

    #[test]
    fn test_shrink_is_continuous_at_knee() {
        let knee = 2 << PCAN_SNR_BITS;
        assert_eq!(shrink(knee - 1), 63);
        assert_eq!(shrink(knee), 64);
        assert_eq!(shrink(0), 0);
    }

    #[test]
    fn test_gain_saturates() {
        let config = PcanGainControlConfig {
            offset: 0.001,
            ..Default::default()
        };
        let pcan = PcanGainControl::new(&config, 10, 3).unwrap();
        assert_eq!(pcan.gain(0), i16::MAX);
    }
}
