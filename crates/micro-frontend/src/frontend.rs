//! Frontend Orchestrator

use crate::bits::FILTERBANK_BITS;
use crate::config::FrontendConfig;
use crate::error::FrontendError;
use crate::fft::FftState;
use crate::filterbank::Filterbank;
use crate::fixed_point::most_significant_bit32;
use crate::log_scale::LogScale;
use crate::noise_reduction::NoiseReduction;
use crate::pcan_gain_control::PcanGainControl;
use crate::window::WindowState;
use tracing::{debug, trace};

/// Converts the 16-bit log output into the float range models are trained on
pub const FEATURE_SCALE: f32 = 0.0390625;

/// Result of feeding samples into a [`Frontend`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontendOutput {
    /// Log-compressed channel energies; empty until a full window is buffered
    pub values: Vec<u16>,
    /// Samples taken from the input slice
    pub samples_read: usize,
}

impl FrontendOutput {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Channel energies rescaled by [`FEATURE_SCALE`]
    pub fn features(&self) -> Vec<f64> {
        self.values
            .iter()
            .map(|&value| f64::from(f32::from(value) * FEATURE_SCALE))
            .collect()
    }
}

/// Streaming feature frontend for one audio stream
#[derive(Debug, PartialEq)]
pub struct Frontend {
    config: FrontendConfig,
    window: WindowState,
    fft: FftState,
    filterbank: Filterbank,
    noise_reduction: NoiseReduction,
    /// `None` when PCAN is disabled
    pcan_gain_control: Option<PcanGainControl>,
    log_scale: LogScale,
    /// Shift that undoes the filterbank and FFT scaling before the log
    correction_bits: i32,
}

impl Frontend {
    /// Build every stage for `config`
    pub fn new(config: FrontendConfig) -> Result<Self, FrontendError> {
        let window = WindowState::new(config.window_size_samples(), config.step_size_samples())?;
        let fft = FftState::new(window.size())?;
        let filterbank =
            Filterbank::new(&config.filterbank, config.sample_rate, fft.spectrum_size())?;
        let noise_reduction =
            NoiseReduction::new(&config.noise_reduction, filterbank.num_channels())?;

        let correction_bits = most_significant_bit32(fft.fft_size() as u32) as i32
            - 1
            - (FILTERBANK_BITS / 2) as i32;
        let pcan_gain_control = if config.pcan_gain_control.enable_pcan {
            Some(PcanGainControl::new(
                &config.pcan_gain_control,
                noise_reduction.smoothing_bits(),
                correction_bits,
            )?)
        } else {
            None
        };
        let log_scale = LogScale::new(&config.log_scale)?;

        debug!(
            "Frontend ready: window={} step={} fft={} channels={} pcan={}",
            window.size(),
            window.step(),
            fft.fft_size(),
            filterbank.num_channels(),
            pcan_gain_control.is_some()
        );

        Ok(Self {
            config,
            window,
            fft,
            filterbank,
            noise_reduction,
            pcan_gain_control,
            log_scale,
            correction_bits,
        })
    }

    pub fn config(&self) -> &FrontendConfig {
        &self.config
    }

    pub fn num_channels(&self) -> usize {
        self.filterbank.num_channels()
    }

    /// Window length in samples
    pub fn window_size(&self) -> usize {
        self.window.size()
    }

    /// Samples per step; the minimum accepted by [`process_samples`](Self::process_samples)
    pub fn step_size(&self) -> usize {
        self.window.step()
    }

    pub fn fft_size(&self) -> usize {
        self.fft.fft_size()
    }

    /// Peak frequency of each channel (Hz)
    pub fn channel_center_frequencies(&self) -> Vec<f32> {
        (0..self.num_channels())
            .filter_map(|channel| self.filterbank.channel_center_hz(channel))
            .collect()
    }

    /// Current noise estimate per channel (scaled up by the smoothing bits)
    pub fn noise_estimate(&self) -> &[u32] {
        self.noise_reduction.estimate()
    }

    /// Feed samples and compute the next window's features if one is ready.
    ///
    /// At least one step of samples is required. Only as many samples as
    /// the window still needs are taken; the count is reported in
    /// [`FrontendOutput::samples_read`].
    pub fn process_samples(&mut self, samples: &[i16]) -> Result<FrontendOutput, FrontendError> {
        let required = self.window.step();
        if samples.len() < required {
            return Err(FrontendError::InsufficientSamples {
                required,
                actual: samples.len(),
            });
        }

        let (samples_read, ready) = self.window.process_samples(samples);
        if !ready {
            return Ok(FrontendOutput {
                values: Vec::new(),
                samples_read,
            });
        }

        // Scale up so the FFT input uses the full 16-bit range
        let max_abs = self.window.max_abs_output_value() as u32;
        let input_shift = 15 - most_significant_bit32(max_abs);
        self.fft.compute(self.window.output(), input_shift);

        self.filterbank.convert_to_energy(self.fft.output());
        self.filterbank.accumulate_channels();
        let signal = self.filterbank.sqrt(input_shift);

        self.noise_reduction.apply(signal);
        if let Some(pcan) = &self.pcan_gain_control {
            pcan.apply(signal, self.noise_reduction.estimate());
        }

        let values = self.log_scale.apply(signal, self.correction_bits);
        trace!(samples_read, input_shift, "Computed feature window");

        Ok(FrontendOutput {
            values,
            samples_read,
        })
    }

    /// Return to the freshly created state, keeping the coefficient tables
    pub fn reset(&mut self) {
        self.window.reset();
        self.fft.reset();
        self.filterbank.reset();
        self.noise_reduction.reset();
        debug!("Frontend state reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LogScaleConfig, PcanGainControlConfig, SmoothingMode};
    use proptest::prelude::*;

    fn tone(freq_hz: f64, amplitude: f64, len: usize) -> Vec<i16> {
        (0..len)
            .map(|i| {
                let phase = 2.0 * std::f64::consts::PI * freq_hz * i as f64 / 16_000.0;
                (amplitude * phase.sin()) as i16
            })
            .collect()
    }

    /// Feed `samples` one step at a time, collecting every produced frame
    fn run(frontend: &mut Frontend, samples: &[i16]) -> Vec<Vec<u16>> {
        samples
            .chunks_exact(frontend.step_size())
            .filter_map(|chunk| {
                let output = frontend.process_samples(chunk).unwrap();
                assert_eq!(output.samples_read, chunk.len());
                (!output.is_empty()).then_some(output.values)
            })
            .collect()
    }

    #[test]
    fn test_default_derived_sizes() {
        let frontend = Frontend::new(FrontendConfig::default()).unwrap();
        assert_eq!(frontend.window_size(), 480);
        assert_eq!(frontend.step_size(), 160);
        assert_eq!(frontend.fft_size(), 512);
        assert_eq!(frontend.num_channels(), 40);
        assert_eq!(frontend.correction_bits, 3);
    }

    #[test]
    fn test_first_feature_after_full_window() {
        let mut frontend = Frontend::new(FrontendConfig::default()).unwrap();
        let chunk = [0i16; 160];

        for _ in 0..2 {
            let output = frontend.process_samples(&chunk).unwrap();
            assert_eq!(output.samples_read, 160);
            assert!(output.is_empty());
        }
        for _ in 0..3 {
            let output = frontend.process_samples(&chunk).unwrap();
            assert_eq!(output.samples_read, 160);
            assert_eq!(output.values.len(), 40);
        }
    }

    #[test]
    fn test_zeros_give_zero_features() {
        let mut frontend = Frontend::new(FrontendConfig::default()).unwrap();
        let frames = run(&mut frontend, &[0; 1600]);
        assert_eq!(frames.len(), 8);
        assert!(frames.iter().flatten().all(|&v| v == 0));
    }

    #[test]
    fn test_full_window_in_one_call() {
        let mut frontend = Frontend::new(FrontendConfig::default()).unwrap();
        let output = frontend.process_samples(&tone(1000.0, 8000.0, 480)).unwrap();
        assert_eq!(output.samples_read, 480);
        assert_eq!(output.features().len(), 40);
    }

    #[test]
    fn test_tone_energy_in_matching_channel() {
        let mut frontend = Frontend::new(FrontendConfig::default()).unwrap();
        let frames = run(&mut frontend, &tone(1000.0, 10_000.0, 1440));
        assert_eq!(frames.len(), 7);

        let centers = frontend.channel_center_frequencies();
        let nearest = (0..40)
            .min_by(|&a, &b| (centers[a] - 1000.0).abs().total_cmp(&(centers[b] - 1000.0).abs()))
            .unwrap();
        assert_eq!(nearest, 12);

        for frame in &frames {
            let peak = (0..40).max_by_key(|&c| frame[c]).unwrap();
            assert!((11..=13).contains(&peak), "peak channel {peak}");
            assert!(frame[..4].iter().all(|&v| v == 0));
            assert!(frame[24..].iter().all(|&v| v == 0));
        }
    }

    #[test]
    fn test_higher_tone_moves_up_the_filterbank() {
        let mut low = Frontend::new(FrontendConfig::default()).unwrap();
        let mut high = Frontend::new(FrontendConfig::default()).unwrap();
        let low_frame = run(&mut low, &tone(500.0, 10_000.0, 480)).remove(0);
        let high_frame = run(&mut high, &tone(4000.0, 10_000.0, 480)).remove(0);

        let peak = |frame: &[u16]| (0..40).max_by_key(|&c| frame[c]).unwrap();
        assert!(peak(&high_frame) > peak(&low_frame) + 10);
    }

    #[test]
    fn test_insufficient_samples_leave_state_untouched() {
        let signal = tone(700.0, 5000.0, 960);

        let mut frontend = Frontend::new(FrontendConfig::default()).unwrap();
        let err = frontend.process_samples(&signal[..100]).unwrap_err();
        assert_eq!(
            err,
            FrontendError::InsufficientSamples {
                required: 160,
                actual: 100
            }
        );
        assert_eq!(frontend, Frontend::new(FrontendConfig::default()).unwrap());

        let mut fresh = Frontend::new(FrontendConfig::default()).unwrap();
        assert_eq!(run(&mut frontend, &signal), run(&mut fresh, &signal));
    }

    #[test]
    fn test_reset_equals_fresh() {
        let fresh = Frontend::new(FrontendConfig::default()).unwrap();

        let mut frontend = Frontend::new(FrontendConfig::default()).unwrap();
        frontend.reset();
        assert_eq!(frontend, fresh);

        run(&mut frontend, &tone(440.0, 12_000.0, 3200));
        assert_ne!(frontend, fresh);
        frontend.reset();
        assert_eq!(frontend, fresh);
    }

    #[test]
    fn test_reset_reproduces_output() {
        let signal = tone(1500.0, 9000.0, 4800);
        let mut frontend = Frontend::new(FrontendConfig::default()).unwrap();

        let first = run(&mut frontend, &signal);
        let second = run(&mut frontend, &signal);
        // Without a reset the noise estimate carries over
        assert_ne!(first, second);

        frontend.reset();
        assert_eq!(run(&mut frontend, &signal), first);
    }

    #[test]
    fn test_independent_frontends_are_deterministic() {
        let signal: Vec<i16> = tone(300.0, 4000.0, 8000)
            .iter()
            .zip(tone(2500.0, 3000.0, 8000))
            .map(|(a, b)| a.saturating_add(b))
            .collect();

        let mut a = Frontend::new(FrontendConfig::default()).unwrap();
        let mut b = Frontend::new(FrontendConfig::default()).unwrap();
        assert_eq!(run(&mut a, &signal), run(&mut b, &signal));
    }

    #[test]
    fn test_steady_tone_is_pulled_toward_noise_floor() {
        let config = FrontendConfig {
            pcan_gain_control: PcanGainControlConfig {
                enable_pcan: false,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut frontend = Frontend::new(config).unwrap();
        let frames = run(&mut frontend, &tone(1000.0, 10_000.0, 160 * 400));

        let first = frames.first().unwrap()[12];
        let last = frames.last().unwrap()[12];
        // Once the estimate has caught up only the min_signal_remaining floor is left
        assert!(last < first);
        assert!(last > 0);
        assert!(frontend.noise_estimate()[12] > 0);
    }

    #[test]
    fn test_pcan_and_log_can_be_disabled() {
        let config = FrontendConfig {
            pcan_gain_control: PcanGainControlConfig {
                enable_pcan: false,
                ..Default::default()
            },
            log_scale: LogScaleConfig {
                enable_log: false,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut frontend = Frontend::new(config).unwrap();
        assert!(frontend.pcan_gain_control.is_none());
        let frames = run(&mut frontend, &tone(1000.0, 10_000.0, 480));
        assert_eq!(frames.len(), 1);
        assert!(frames[0][12] > 0);
    }

    #[test]
    fn test_channel_parity_mode_runs() {
        let mut config = FrontendConfig::default();
        config.noise_reduction.smoothing_mode = SmoothingMode::ChannelParity;
        let mut frontend = Frontend::new(config).unwrap();
        let frames = run(&mut frontend, &tone(1000.0, 10_000.0, 960));
        assert_eq!(frames.len(), 4);
    }

    #[test]
    fn test_features_are_rescaled() {
        let output = FrontendOutput {
            values: vec![0, 256, 1000],
            samples_read: 160,
        };
        assert_eq!(output.features(), vec![0.0, 10.0, 39.0625]);
    }

    #[test]
    fn test_invalid_config_is_reported() {
        let mut config = FrontendConfig::default();
        config.window.step_size_ms = 0;
        assert!(matches!(Frontend::new(config), Err(FrontendError::InvalidConfig(_))));
    }

    #[test]
    fn test_upper_band_far_above_nyquist_is_rejected() {
        let mut config = FrontendConfig::default();
        config.filterbank.upper_band_limit = 1.0e12;
        assert!(matches!(Frontend::new(config), Err(FrontendError::InvalidConfig(_))));
    }

    #[test]
    fn test_oversized_log_scale_shift_is_rejected() {
        let mut config = FrontendConfig::default();
        config.log_scale.scale_shift = 32;
        assert!(matches!(Frontend::new(config), Err(FrontendError::InvalidConfig(_))));
    }

    proptest! {
        #[test]
        fn every_chunk_is_consumed(
            samples in proptest::collection::vec(any::<i16>(), 160..2000),
        ) {
            let mut frontend = Frontend::new(FrontendConfig::default()).unwrap();
            let mut total = 0;
            for chunk in samples.chunks_exact(160) {
                let output = frontend.process_samples(chunk).unwrap();
                prop_assert_eq!(output.samples_read, 160);
                prop_assert!(output.values.is_empty() || output.values.len() == 40);
                total += 1;
                prop_assert_eq!(output.values.is_empty(), total < 3);
            }
        }
    }
}
