//! Strict-timing bit-banged waveforms.
//!
//! One-wire LED protocols and friends encode each bit as a high segment
//! followed by a low segment whose durations distinguish 0 from 1. The
//! engine itself lives on [`crate::Hal::bit_bang`]; this module holds the
//! timing description and bit sources.

/// High/low durations encoding a 0-bit and a 1-bit, in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BitTiming {
    pub t0h_ns: u32,
    pub t0l_ns: u32,
    pub t1h_ns: u32,
    pub t1l_ns: u32,
}

impl BitTiming {
    pub const fn new(t0h_ns: u32, t0l_ns: u32, t1h_ns: u32, t1l_ns: u32) -> Self {
        Self {
            t0h_ns,
            t0l_ns,
            t1h_ns,
            t1l_ns,
        }
    }

    /// Datasheets usually quote these in microseconds.
    pub fn from_us(t0h: f64, t0l: f64, t1h: f64, t1l: f64) -> Self {
        let ns = |us: f64| {
            if us > 0.0 {
                (us * 1000.0 + 0.5) as u32
            } else {
                0
            }
        };
        Self::new(ns(t0h), ns(t0l), ns(t1h), ns(t1l))
    }

    /// Duration of the high segment for `bit`.
    pub fn high_ns(&self, bit: bool) -> u32 {
        if bit {
            self.t1h_ns
        } else {
            self.t0h_ns
        }
    }

    /// Duration of the low segment for `bit`.
    pub fn low_ns(&self, bit: bool) -> u32 {
        if bit {
            self.t1l_ns
        } else {
            self.t0l_ns
        }
    }
}

/// MSB-first bit source over a byte slice.
///
/// The order one-wire LED protocols consume their payload in.
pub fn bits_msb(bytes: &[u8]) -> impl Iterator<Item = bool> + '_ {
    bytes
        .iter()
        .flat_map(|&b| (0..8u8).map(move |i| (b >> (7 - i)) & 1 != 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timing_selects_by_bit() {
        let t = BitTiming::new(400, 850, 850, 400);
        assert_eq!(t.high_ns(false), 400);
        assert_eq!(t.low_ns(false), 850);
        assert_eq!(t.high_ns(true), 850);
        assert_eq!(t.low_ns(true), 400);
    }

    #[test]
    fn test_from_us_rounds() {
        let t = BitTiming::from_us(0.4, 0.85, 0.85, 0.4);
        assert_eq!(t, BitTiming::new(400, 850, 850, 400));
    }

    #[test]
    fn test_bits_msb() {
        let bits: heapless::Vec<bool, 16> = bits_msb(&[0b1010_0001]).collect();
        assert_eq!(
            bits.as_slice(),
            &[true, false, true, false, false, false, false, true]
        );
        assert_eq!(bits_msb(&[]).count(), 0);
        assert_eq!(bits_msb(&[0xFF, 0x00]).count(), 16);
    }
}
