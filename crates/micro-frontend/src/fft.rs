//! Real-input FFT with 16-bit fixed-point output

use crate::error::{zeroed, FrontendError};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::fmt;
use std::sync::Arc;

/// One spectrum bin in the 16-bit fixed-point output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComplexInt16 {
    pub real: i16,
    pub imag: i16,
}

impl ComplexInt16 {
    /// Squared magnitude of the bin
    #[inline]
    pub fn power(self) -> u32 {
        let real = i32::from(self.real);
        let imag = i32::from(self.imag);
        (real * real) as u32 + (imag * imag) as u32
    }
}

/// FFT stage of the frontend
///
/// The spectrum is scaled by `1 / fft_size` and rounded to `i16`, the same
/// range a 16-bit fixed-point real FFT produces.
pub struct FftState {
    /// Samples taken from the window
    input_size: usize,
    /// Next power of two >= `input_size`
    fft_size: usize,
    plan: Arc<dyn Fft<f64>>,
    buffer: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
    /// Bins `0..=fft_size / 2`
    output: Vec<ComplexInt16>,
}

impl FftState {
    /// Plan a transform large enough for `input_size` samples
    pub fn new(input_size: usize) -> Result<Self, FrontendError> {
        let fft_size = input_size.next_power_of_two();
        let plan = FftPlanner::new().plan_fft_forward(fft_size);
        let scratch_len = plan.get_inplace_scratch_len();

        Ok(Self {
            input_size,
            fft_size,
            plan,
            buffer: zeroed("fft buffer", fft_size)?,
            scratch: zeroed("fft scratch", scratch_len)?,
            output: zeroed("fft output", fft_size / 2 + 1)?,
        })
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of bins in [`output`](Self::output)
    pub fn spectrum_size(&self) -> usize {
        self.fft_size / 2 + 1
    }

    pub fn output(&self) -> &[ComplexInt16] {
        &self.output
    }

    /// Transform `input` shifted left by `input_scale_shift`, zero padded
    pub fn compute(&mut self, input: &[i16], input_scale_shift: u32) {
        let (head, tail) = self.buffer.split_at_mut(self.input_size);
        for (slot, &sample) in head.iter_mut().zip(input) {
            let scaled = (i32::from(sample) << input_scale_shift) as i16;
            *slot = Complex::new(f64::from(scaled), 0.0);
        }
        tail.fill(Complex::new(0.0, 0.0));

        self.plan
            .process_with_scratch(&mut self.buffer, &mut self.scratch);

        let scale = 1.0 / self.fft_size as f64;
        for (bin, value) in self.output.iter_mut().zip(&self.buffer) {
            *bin = ComplexInt16 {
                real: to_i16(value.re * scale),
                imag: to_i16(value.im * scale),
            };
        }
    }

    pub fn reset(&mut self) {
        self.buffer.fill(Complex::new(0.0, 0.0));
        self.output.fill(ComplexInt16::default());
    }
}

fn to_i16(value: f64) -> i16 {
    value
        .round()
        .clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
}

impl fmt::Debug for FftState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftState")
            .field("input_size", &self.input_size)
            .field("fft_size", &self.fft_size)
            .finish_non_exhaustive()
    }
}

// The plan and scratch space are derived from `fft_size`.
impl PartialEq for FftState {
    fn eq(&self, other: &Self) -> bool {
        self.input_size == other.input_size
            && self.fft_size == other.fft_size
            && self.buffer == other.buffer
            && self.output == other.output
    }
}
