//! Sliding Analysis Window

use crate::bits::WINDOW_BITS;
use crate::error::{zeroed, FrontendError};

/// Sliding window over the incoming samples with a quantized Hann taper
#[derive(Debug, Clone, PartialEq)]
pub struct WindowState {
    /// Window length in samples
    size: usize,
    /// Samples discarded after each full window
    step: usize,
    /// Taper coefficients (Q12)
    coefficients: Vec<i16>,
    /// Buffered raw samples
    input: Vec<i16>,
    /// Number of valid samples in `input`
    input_used: usize,
    /// Tapered samples of the last full window
    output: Vec<i16>,
    /// Largest absolute value in `output`
    max_abs_output_value: i16,
}

impl WindowState {
    /// Create a window of `size` samples advancing by `step`
    pub fn new(size: usize, step: usize) -> Result<Self, FrontendError> {
        if size == 0 || step == 0 || step > size {
            return Err(FrontendError::InvalidConfig(format!(
                "window of {size} samples with step {step} is not usable"
            )));
        }

        let mut coefficients = zeroed::<i16>("window coefficients", size)?;
        let arg = std::f32::consts::PI * 2.0 / size as f32;
        for (i, coefficient) in coefficients.iter_mut().enumerate() {
            let value = 0.5 - 0.5 * (arg * (i as f32 + 0.5)).cos();
            *coefficient = (value * (1 << WINDOW_BITS) as f32 + 0.5).floor() as i16;
        }

        Ok(Self {
            size,
            step,
            coefficients,
            input: zeroed("window input", size)?,
            input_used: 0,
            output: zeroed("window output", size)?,
            max_abs_output_value: 0,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn step(&self) -> usize {
        self.step
    }

    /// Tapered samples of the last full window
    pub fn output(&self) -> &[i16] {
        &self.output
    }

    pub fn max_abs_output_value(&self) -> i16 {
        self.max_abs_output_value
    }

    /// Buffer as many samples as the window still needs.
    ///
    /// Returns the number of samples consumed and whether a full window was
    /// tapered into [`output`](Self::output).
    pub fn process_samples(&mut self, samples: &[i16]) -> (usize, bool) {
        let to_copy = (self.size - self.input_used).min(samples.len());
        self.input[self.input_used..self.input_used + to_copy]
            .copy_from_slice(&samples[..to_copy]);
        self.input_used += to_copy;

        if self.input_used < self.size {
            return (to_copy, false);
        }

        let mut max_abs: i32 = 0;
        for ((out, &sample), &coefficient) in self
            .output
            .iter_mut()
            .zip(&self.input)
            .zip(&self.coefficients)
        {
            let value = (i32::from(sample) * i32::from(coefficient)) >> WINDOW_BITS;
            *out = value as i16;
            max_abs = max_abs.max(value.abs());
        }
        self.max_abs_output_value = max_abs.min(i32::from(i16::MAX)) as i16;

        // Slide the buffer so the next window starts one step later
        self.input.copy_within(self.step.., 0);
        self.input_used -= self.step;

        (to_copy, true)
    }

    pub fn reset(&mut self) {
        self.input.fill(0);
        self.output.fill(0);
        self.input_used = 0;
        self.max_abs_output_value = 0;
    }
}
