//! Portable bit counting. Results match the POPCNT and LZCNT instructions.

const M1: u64 = 0x5555_5555_5555_5555;
const M2: u64 = 0x3333_3333_3333_3333;
const M4: u64 = 0x0f0f_0f0f_0f0f_0f0f;
const H01: u64 = 0x0101_0101_0101_0101;

/// SWAR population count.
pub fn popcount(mut v: u64) -> u64 {
    v -= (v >> 1) & M1;
    v = (v & M2) + ((v >> 2) & M2);
    v = (v + (v >> 4)) & M4;
    v.wrapping_mul(H01) >> 56
}

/// Leading-zero count by scanning down from the sign bit.
/// Zero yields the full width (64), as LZCNT does.
pub fn leading_zeros(v: u64) -> u64 {
    let mut signed = v as i64;
    let mut zeros = 0;
    for _ in 0..u64::BITS {
        if signed < 0 {
            break;
        }
        zeros += 1;
        signed <<= 1;
    }
    zeros
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn reference_popcount(v: u64) -> u64 {
        (0..64).filter(|i| v & (1u64 << i) != 0).count() as u64
    }

    #[test]
    fn test_popcount_boundaries() {
        assert_eq!(popcount(0), 0);
        assert_eq!(popcount(u64::MAX), 64);
        assert_eq!(popcount(0x5555_5555_5555_5555), 32);
        assert_eq!(popcount(0xaaaa_aaaa_aaaa_aaaa), 32);
        for i in 0..64 {
            assert_eq!(popcount(1u64 << i), 1, "2^{i}");
            assert_eq!(popcount(!(1u64 << i)), 63, "!2^{i}");
        }
    }

    #[test]
    fn test_popcount_matches_reference() {
        let mut rng = rand::thread_rng();
        for _ in 0..10_000 {
            let v: u64 = rng.gen();
            assert_eq!(popcount(v), reference_popcount(v), "{v:#x}");
        }
    }

    #[test]
    fn test_leading_zeros_single_low_bit() {
        assert_eq!(leading_zeros(0x0000_0000_0000_0001), 63);
    }

    // Earlier recordings counted 63 for zero; the scan now covers all 64 bits.
    #[test]
    fn test_leading_zeros_of_zero_is_full_width() {
        assert_eq!(leading_zeros(0), 64);
    }

    #[test]
    fn test_leading_zeros_matches_std() {
        assert_eq!(leading_zeros(u64::MAX), 0);
        for i in 0..64 {
            let v = 1u64 << i;
            assert_eq!(leading_zeros(v), v.leading_zeros() as u64);
            assert_eq!(leading_zeros(v | 1), (v | 1).leading_zeros() as u64);
        }
        let mut rng = rand::thread_rng();
        for _ in 0..10_000 {
            let v: u64 = rng.gen::<u64>() >> rng.gen_range(0..64u32);
            assert_eq!(leading_zeros(v), v.leading_zeros() as u64, "{v:#x}");
        }
    }
}
