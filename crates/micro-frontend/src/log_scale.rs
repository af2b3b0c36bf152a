//! Fixed-Point Log Compression

use crate::config::LogScaleConfig;
use crate::error::FrontendError;
use crate::fixed_point::most_significant_bit32;

const LOG_SEGMENTS_LOG2: u32 = 7;
const LOG_SCALE: u32 = 65536;
const LOG_SCALE_LOG2: u32 = 16;
/// ln(2) in Q16
const LOG_COEFF: u64 = 45426;
/// Natural log of `u32::MAX` in Q16 stays below 2^21
const MAX_SCALE_SHIFT: u32 = 10;

/// `log2(1 + i/128) - i/128` in Q16, for `i` in `0..=128`
const LOG_LUT: [u16; 129] = [
    0, 224, 442, 654, 861, 1063, 1259, 1450, 1636, 1817, 1992, 2163, 2329, 2490, 2646, 2797,
    2944, 3087, 3224, 3358, 3487, 3611, 3732, 3848, 3960, 4068, 4172, 4272, 4368, 4460, 4549,
    4633, 4714, 4791, 4864, 4934, 5001, 5063, 5123, 5178, 5231, 5280, 5326, 5368, 5408, 5444,
    5477, 5507, 5533, 5557, 5578, 5595, 5610, 5622, 5631, 5637, 5640, 5641, 5638, 5633, 5626,
    5615, 5602, 5586, 5568, 5547, 5524, 5498, 5470, 5439, 5406, 5370, 5332, 5291, 5249, 5203,
    5156, 5106, 5054, 5000, 4944, 4885, 4825, 4762, 4697, 4630, 4561, 4490, 4416, 4341, 4264,
    4184, 4103, 4020, 3935, 3848, 3759, 3668, 3575, 3481, 3384, 3286, 3186, 3084, 2981, 2875,
    2768, 2659, 2549, 2437, 2323, 2207, 2090, 1971, 1851, 1729, 1605, 1480, 1353, 1224, 1094,
    963, 830, 695, 559, 421, 282, 142, 0,
];

/// Fractional part of log2(x) in Q16, given `log2x = floor(log2(x))`
fn log2_fraction_part(x: u32, log2x: u32) -> u32 {
    let mut frac = (i64::from(x) - (1i64 << log2x)) as i32;
    if log2x < LOG_SCALE_LOG2 {
        frac <<= LOG_SCALE_LOG2 - log2x;
    } else {
        frac >>= log2x - LOG_SCALE_LOG2;
    }

    // Linear interpolation of the correction table
    let base_seg = (frac >> (LOG_SCALE_LOG2 - LOG_SEGMENTS_LOG2)) as usize;
    let seg_unit = (1i32 << LOG_SCALE_LOG2) >> LOG_SEGMENTS_LOG2;

    let c0 = i32::from(LOG_LUT[base_seg]);
    let c1 = i32::from(LOG_LUT[base_seg + 1]);
    let seg_base = seg_unit * base_seg as i32;
    let rel_pos = ((c1 - c0) * (frac - seg_base)) >> LOG_SCALE_LOG2;
    (frac + c0 + rel_pos) as u32
}

/// Natural log of `x` in Q16, scaled by `2^scale_shift` and truncated
fn log(x: u32, scale_shift: u32) -> u32 {
    let integer = most_significant_bit32(x) - 1;
    let fraction = log2_fraction_part(x, integer);
    let log2 = (integer << LOG_SCALE_LOG2) + fraction;
    let round = LOG_SCALE / 2;
    let loge = (LOG_COEFF * u64::from(log2) + u64::from(round)) >> LOG_SCALE_LOG2;
    let scaled = ((loge << scale_shift) + u64::from(round)) >> LOG_SCALE_LOG2;
    scaled.min(u64::from(u32::MAX)) as u32
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogScale {
    enable_log: bool,
    scale_shift: u32,
}

impl LogScale {
    pub fn new(config: &LogScaleConfig) -> Result<Self, FrontendError> {
        if config.scale_shift > MAX_SCALE_SHIFT {
            return Err(FrontendError::InvalidConfig(format!(
                "scale_shift {} exceeds the maximum of {MAX_SCALE_SHIFT}",
                config.scale_shift
            )));
        }
        Ok(Self {
            enable_log: config.enable_log,
            scale_shift: config.scale_shift,
        })
    }

    /// Compress each value to 16 bits after a `correction_bits` shift
    pub fn apply(&self, signal: &[u32], correction_bits: i32) -> Vec<u16> {
        signal
            .iter()
            .map(|&value| {
                let mut value = value;
                if self.enable_log {
                    value = if correction_bits < 0 {
                        value >> -correction_bits
                    } else {
                        value << correction_bits
                    };
                    value = if value > 1 {
                        log(value, self.scale_shift)
                    } else {
                        0
                    };
                }
                value.min(u32::from(u16::MAX)) as u16
            })
            .collect()
    }
}
