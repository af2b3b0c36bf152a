//! Mel Filterbank
//!
//! Channels are triangles on the mel scale. Each channel's weights are
//! stored once, padded to blocks of four bins; a channel accumulates its
//! rising edge from `weights` and hands `unweights` (one minus the weight)
//! over to the next channel as that channel's falling edge. One extra
//! leading channel is computed so the first real channel gets its falling
//! edge too.

use crate::bits::FILTERBANK_BITS;
use crate::config::FilterbankConfig;
use crate::error::{zeroed, FrontendError};
use crate::fft::ComplexInt16;
use crate::fixed_point::sqrt64;

const INDEX_ALIGNMENT: usize = 2;
const CHANNEL_BLOCK_SIZE: usize = 4;

/// Convert a frequency in Hz to mels
pub fn freq_to_mel(freq: f32) -> f32 {
    (1127.0 * (f64::from(freq) / 700.0).ln_1p()) as f32
}

/// Convert mels back to Hz
pub fn mel_to_freq(mel: f32) -> f32 {
    (700.0 * (f64::from(mel) / 1127.0).exp_m1()) as f32
}

fn quantize(weight: f32) -> (i16, i16) {
    let scale = f64::from(1u32 << FILTERBANK_BITS);
    let weight = f64::from(weight);
    (
        (weight * scale + 0.5).floor() as i16,
        ((1.0 - weight) * scale + 0.5).floor() as i16,
    )
}

/// Filterbank coefficient tables and working buffers
#[derive(Debug, Clone, PartialEq)]
pub struct Filterbank {
    num_channels: usize,
    /// First spectrum bin used (DC is always skipped)
    start_index: usize,
    /// One past the last spectrum bin used
    end_index: usize,
    /// Upper mel edge of each of the `num_channels + 1` bands
    center_mel_freqs: Vec<f32>,
    channel_frequency_starts: Vec<usize>,
    channel_weight_starts: Vec<usize>,
    channel_widths: Vec<usize>,
    weights: Vec<i16>,
    unweights: Vec<i16>,
    /// Power per spectrum bin, zero outside `start_index..end_index`
    energy: Vec<u32>,
    work: Vec<u64>,
    output: Vec<u32>,
}

impl Filterbank {
    /// Build the coefficient tables for a spectrum of `spectrum_size` bins
    pub fn new(
        config: &FilterbankConfig,
        sample_rate: u32,
        spectrum_size: usize,
    ) -> Result<Self, FrontendError> {
        let num_channels = config.num_channels;
        let lower = config.lower_band_limit;
        let upper = config.upper_band_limit;
        if num_channels == 0 {
            return Err(FrontendError::InvalidConfig(
                "filterbank needs at least one channel".to_string(),
            ));
        }
        if !(lower.is_finite() && upper.is_finite() && lower >= 0.0 && lower < upper) {
            return Err(FrontendError::InvalidConfig(format!(
                "band limits {lower}..{upper} Hz are not an increasing range"
            )));
        }
        if spectrum_size < 2 {
            return Err(FrontendError::InvalidConfig(format!(
                "spectrum of {spectrum_size} bins is too small"
            )));
        }
        let nyquist = sample_rate as f32 / 2.0;
        if upper >= nyquist {
            return Err(FrontendError::InvalidConfig(format!(
                "upper band limit {upper} Hz is not below the {nyquist} Hz Nyquist frequency"
            )));
        }

        let num_channels_plus_1 = num_channels + 1;
        let mel_low = freq_to_mel(lower);
        let mel_spacing = (freq_to_mel(upper) - mel_low) / num_channels_plus_1 as f32;
        let mut center_mel_freqs = zeroed::<f32>("filterbank centers", num_channels_plus_1)?;
        for (i, center) in center_mel_freqs.iter_mut().enumerate() {
            *center = mel_low + mel_spacing * (i + 1) as f32;
        }

        let hz_per_sbin = (0.5 * f64::from(sample_rate) / (spectrum_size as f64 - 1.0)) as f32;
        let start_index = (1.5 + lower / hz_per_sbin) as usize;

        let mut channel_frequency_starts = zeroed::<usize>("channel starts", num_channels_plus_1)?;
        let mut channel_weight_starts =
            zeroed::<usize>("channel weight starts", num_channels_plus_1)?;
        let mut channel_widths = zeroed::<usize>("channel widths", num_channels_plus_1)?;
        let mut actual_starts = zeroed::<usize>("actual channel starts", num_channels_plus_1)?;
        let mut actual_widths = zeroed::<usize>("actual channel widths", num_channels_plus_1)?;

        let mut chan_freq_index_start = start_index;
        let mut weight_index_start = 0;
        let mut needs_zeros = false;

        for chan in 0..num_channels_plus_1 {
            // Take bins until one overshoots the upper edge of this band
            let mut freq_index = chan_freq_index_start;
            while freq_index < spectrum_size
                && freq_to_mel(freq_index as f32 * hz_per_sbin) <= center_mel_freqs[chan]
            {
                freq_index += 1;
            }

            let width = freq_index - chan_freq_index_start;
            actual_starts[chan] = chan_freq_index_start;
            actual_widths[chan] = width;

            if width == 0 {
                // Empty band: point it at a shared block of zero weights placed
                // at the front of the tables
                channel_frequency_starts[chan] = 0;
                channel_weight_starts[chan] = 0;
                channel_widths[chan] = CHANNEL_BLOCK_SIZE;
                if !needs_zeros {
                    needs_zeros = true;
                    for start in &mut channel_weight_starts[..chan] {
                        *start += CHANNEL_BLOCK_SIZE;
                    }
                    weight_index_start += CHANNEL_BLOCK_SIZE;
                }
            } else {
                let aligned_start = (chan_freq_index_start / INDEX_ALIGNMENT) * INDEX_ALIGNMENT;
                let aligned_width = chan_freq_index_start - aligned_start + width;
                let padded_width =
                    ((aligned_width - 1) / CHANNEL_BLOCK_SIZE + 1) * CHANNEL_BLOCK_SIZE;

                channel_frequency_starts[chan] = aligned_start;
                channel_weight_starts[chan] = weight_index_start;
                channel_widths[chan] = padded_width;
                weight_index_start += padded_width;
            }
            chan_freq_index_start = freq_index;
        }

        let mut weights = zeroed::<i16>("filterbank weights", weight_index_start)?;
        let mut unweights = zeroed::<i16>("filterbank unweights", weight_index_start)?;
        let mut end_index = 0;

        for chan in 0..num_channels_plus_1 {
            let mut frequency = actual_starts[chan];
            let frequency_offset = frequency - channel_frequency_starts[chan];
            let weight_start = channel_weight_starts[chan];
            let denom_val = if chan == 0 {
                mel_low
            } else {
                center_mel_freqs[chan - 1]
            };

            for j in 0..actual_widths[chan] {
                let weight = (center_mel_freqs[chan] - freq_to_mel(frequency as f32 * hz_per_sbin))
                    / (center_mel_freqs[chan] - denom_val);
                let index = weight_start + frequency_offset + j;
                (weights[index], unweights[index]) = quantize(weight);
                frequency += 1;
            }
            end_index = end_index.max(frequency);
        }

        if end_index >= spectrum_size {
            return Err(FrontendError::InvalidConfig(format!(
                "filterbank ends at bin {end_index}, beyond the {spectrum_size}-bin spectrum"
            )));
        }

        // Padded blocks may read a few bins past the used range
        let energy_len = channel_frequency_starts
            .iter()
            .zip(&channel_widths)
            .map(|(start, width)| start + width)
            .max()
            .unwrap_or(0)
            .max(spectrum_size);

        Ok(Self {
            num_channels,
            start_index,
            end_index,
            center_mel_freqs,
            channel_frequency_starts,
            channel_weight_starts,
            channel_widths,
            weights,
            unweights,
            energy: zeroed("filterbank energy", energy_len)?,
            work: zeroed("filterbank work", num_channels_plus_1)?,
            output: zeroed("filterbank output", num_channels)?,
        })
    }

    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// Frequency (Hz) at which channel `channel` has its peak weight
    pub fn channel_center_hz(&self, channel: usize) -> Option<f32> {
        self.center_mel_freqs
            .get(channel)
            .filter(|_| channel < self.num_channels)
            .map(|&mel| mel_to_freq(mel))
    }

    /// Square the spectrum bins the filterbank reads
    pub fn convert_to_energy(&mut self, spectrum: &[ComplexInt16]) {
        for (energy, bin) in self.energy[self.start_index..self.end_index]
            .iter_mut()
            .zip(&spectrum[self.start_index..self.end_index])
        {
            *energy = bin.power();
        }
    }

    /// Sum the weighted energy of every band into the work buffer
    pub fn accumulate_channels(&mut self) {
        let mut weight_accumulator: u64 = 0;
        let mut unweight_accumulator: u64 = 0;

        for chan in 0..=self.num_channels {
            let freq_start = self.channel_frequency_starts[chan];
            let weight_start = self.channel_weight_starts[chan];
            let width = self.channel_widths[chan];

            let magnitudes = &self.energy[freq_start..freq_start + width];
            let weights = &self.weights[weight_start..weight_start + width];
            let unweights = &self.unweights[weight_start..weight_start + width];
            for ((&magnitude, &weight), &unweight) in
                magnitudes.iter().zip(weights).zip(unweights)
            {
                weight_accumulator += weight as u64 * u64::from(magnitude);
                unweight_accumulator += unweight as u64 * u64::from(magnitude);
            }

            self.work[chan] = weight_accumulator;
            weight_accumulator = unweight_accumulator;
            unweight_accumulator = 0;
        }
    }

    /// Square root of each channel's energy, scaled down by `scale_down_shift`
    pub fn sqrt(&mut self, scale_down_shift: u32) -> &mut [u32] {
        for (out, &work) in self.output.iter_mut().zip(&self.work[1..]) {
            *out = sqrt64(work) >> scale_down_shift;
        }
        &mut self.output
    }

    pub fn reset(&mut self) {
        self.energy.fill(0);
        self.work.fill(0);
        self.output.fill(0);
    }
}
