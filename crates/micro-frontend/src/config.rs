//! Frontend configuration

use serde::{Deserialize, Serialize};

/// Analysis window configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window length (milliseconds)
    pub size_ms: u32,
    /// Distance between consecutive windows (milliseconds)
    pub step_size_ms: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            size_ms: 30,
            step_size_ms: 10,
        }
    }
}

/// Mel filterbank configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterbankConfig {
    /// Number of output channels
    pub num_channels: usize,
    /// Lower edge of the first channel (Hz)
    pub lower_band_limit: f32,
    /// Upper edge of the last channel (Hz)
    pub upper_band_limit: f32,
}

impl Default for FilterbankConfig {
    fn default() -> Self {
        Self {
            num_channels: 40,
            lower_band_limit: 125.0,
            upper_band_limit: 7500.0,
        }
    }
}

/// Which smoothing coefficient the noise estimator applies to a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmoothingMode {
    /// Rising energy uses `odd_smoothing`, falling energy `even_smoothing`
    #[default]
    Directional,
    /// Even channels use `even_smoothing`, odd channels `odd_smoothing`
    ChannelParity,
}

/// Noise reduction configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseReductionConfig {
    /// Extra precision bits carried by the noise estimate
    pub smoothing_bits: u32,
    /// Smoothing coefficient for falling energy (or even channels)
    pub even_smoothing: f32,
    /// Smoothing coefficient for rising energy (or odd channels)
    pub odd_smoothing: f32,
    /// Fraction of the signal always kept after subtraction
    pub min_signal_remaining: f32,
    /// Coefficient selection rule
    pub smoothing_mode: SmoothingMode,
}

impl Default for NoiseReductionConfig {
    fn default() -> Self {
        Self {
            smoothing_bits: 10,
            even_smoothing: 0.025,
            odd_smoothing: 0.06,
            min_signal_remaining: 0.05,
            smoothing_mode: SmoothingMode::Directional,
        }
    }
}

/// Per-channel energy normalization (PCAN) configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PcanGainControlConfig {
    /// Apply per-channel gain normalization
    pub enable_pcan: bool,
    /// Exponent applied to the noise estimate
    pub strength: f32,
    /// Offset added to the noise estimate before the exponent
    pub offset: f32,
    /// Precision of the gain lookup table
    pub gain_bits: i32,
}

impl Default for PcanGainControlConfig {
    fn default() -> Self {
        Self {
            enable_pcan: true,
            strength: 0.95,
            offset: 80.0,
            gain_bits: 21,
        }
    }
}

/// Log compression configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogScaleConfig {
    /// Compress channel energies with a natural log
    pub enable_log: bool,
    /// Left shift applied to the natural log before truncation
    pub scale_shift: u32,
}

impl Default for LogScaleConfig {
    fn default() -> Self {
        Self {
            enable_log: true,
            scale_shift: 6,
        }
    }
}

/// Complete frontend configuration
///
/// The default is the configuration used by micro wake word models:
/// 16 kHz input, 30 ms windows every 10 ms, 40 channels between 125 Hz
/// and 7.5 kHz, PCAN and log scaling enabled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontendConfig {
    /// Input sample rate (Hz)
    pub sample_rate: u32,
    pub window: WindowConfig,
    pub filterbank: FilterbankConfig,
    pub noise_reduction: NoiseReductionConfig,
    pub pcan_gain_control: PcanGainControlConfig,
    pub log_scale: LogScaleConfig,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            window: WindowConfig::default(),
            filterbank: FilterbankConfig::default(),
            noise_reduction: NoiseReductionConfig::default(),
            pcan_gain_control: PcanGainControlConfig::default(),
            log_scale: LogScaleConfig::default(),
        }
    }
}

impl FrontendConfig {
    /// Window length in samples
    pub fn window_size_samples(&self) -> usize {
        ms_to_samples(self.window.size_ms, self.sample_rate)
    }

    /// Step length in samples
    pub fn step_size_samples(&self) -> usize {
        ms_to_samples(self.window.step_size_ms, self.sample_rate)
    }
}

fn ms_to_samples(ms: u32, sample_rate: u32) -> usize {
    (u64::from(ms) * u64::from(sample_rate) / 1000) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sizes() {
        let config = FrontendConfig::default();
        assert_eq!(config.window_size_samples(), 480);
        assert_eq!(config.step_size_samples(), 160);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{
            "pcan_gain_control": { "enable_pcan": false },
            "noise_reduction": { "smoothing_mode": "channel_parity" }
        }"#;
        let config: FrontendConfig = serde_json::from_str(json).unwrap();

        assert!(!config.pcan_gain_control.enable_pcan);
        assert_eq!(config.pcan_gain_control.gain_bits, 21);
        assert_eq!(config.noise_reduction.smoothing_mode, SmoothingMode::ChannelParity);
        assert_eq!(config.filterbank, FilterbankConfig::default());
        assert_eq!(config.sample_rate, 16_000);
    }

    #[test]
    fn test_other_sample_rate() {
        let config = FrontendConfig {
            sample_rate: 8_000,
            ..Default::default()
        };
        assert_eq!(config.window_size_samples(), 240);
        assert_eq!(config.step_size_samples(), 80);
    }
}
