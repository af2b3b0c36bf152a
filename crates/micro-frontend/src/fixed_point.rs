//! Integer helpers shared by the fixed-point stages

/// Number of bits needed to represent `x` (0 for 0)
#[inline]
pub fn most_significant_bit32(x: u32) -> u32 {
    32 - x.leading_zeros()
}

#[inline]
pub fn most_significant_bit64(x: u64) -> u32 {
    64 - x.leading_zeros()
}

/// Rounded integer square root of a 32-bit value
pub fn sqrt32(mut num: u32) -> u16 {
    if num == 0 {
        return 0;
    }
    let mut res: u32 = 0;
    let max_bit_number = (32 - most_significant_bit32(num)) | 1;
    let mut bit: u32 = 1 << (31 - max_bit_number);
    let iterations = (31 - max_bit_number) / 2 + 1;
    for _ in 0..iterations {
        if num >= res + bit {
            num -= res + bit;
            res = (res >> 1) + bit;
        } else {
            res >>= 1;
        }
        bit >>= 2;
    }
    // Round up when the remainder allows it
    if num > res && res != 0xFFFF {
        res += 1;
    }
    res as u16
}

/// Rounded integer square root of a 64-bit value
///
/// Values with a clear upper word go through [`sqrt32`], which can be off
/// by one near 2^32.
pub fn sqrt64(mut num: u64) -> u32 {
    if num >> 32 == 0 {
        return u32::from(sqrt32(num as u32));
    }
    let mut res: u64 = 0;
    let max_bit_number = (64 - most_significant_bit64(num)) | 1;
    let mut bit: u64 = 1 << (63 - max_bit_number);
    let iterations = (63 - max_bit_number) / 2 + 1;
    for _ in 0..iterations {
        if num >= res + bit {
            num -= res + bit;
            res = (res >> 1) + bit;
        } else {
            res >>= 1;
        }
        bit >>= 2;
    }
    if num > res && res != 0xFFFF_FFFF {
        res += 1;
    }
    res as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_most_significant_bit() {
        assert_eq!(most_significant_bit32(0), 0);
        assert_eq!(most_significant_bit32(1), 1);
        assert_eq!(most_significant_bit32(512), 10);
        assert_eq!(most_significant_bit32(u32::MAX), 32);
        assert_eq!(most_significant_bit64(1 << 40), 41);
    }

    #[test]
    fn test_sqrt_exact_squares() {
        assert_eq!(sqrt32(0), 0);
        assert_eq!(sqrt32(1), 1);
        assert_eq!(sqrt32(144), 12);
        assert_eq!(sqrt32(65_535 * 65_535), 65_535);
        assert_eq!(sqrt64(1 << 40), 1 << 20);
        assert_eq!(sqrt64(3_000_000_000u64 * 3_000_000_000u64), 3_000_000_000);
    }

    #[test]
    fn test_sqrt_rounds_to_nearest() {
        // sqrt(12) = 3.46, sqrt(13) = 3.61
        assert_eq!(sqrt32(12), 3);
        assert_eq!(sqrt32(13), 4);
    }

    proptest! {
        #[test]
        fn sqrt32_within_one_of_float(x in 0u32..=u32::MAX) {
            let expected = (x as f64).sqrt();
            let got = sqrt32(x) as f64;
            prop_assert!((got - expected).abs() <= 1.0);
        }

        #[test]
        fn sqrt64_within_one_of_float(x in (1u64 << 32)..(1u64 << 62)) {
            let expected = (x as f64).sqrt();
            let got = sqrt64(x) as f64;
            prop_assert!((got - expected).abs() <= 1.0);
        }
    }
}
