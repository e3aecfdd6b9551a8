//! Deterministic SplitMix64 generator behind the weekly collapse rolls.
//!
//! The whole state is one `u64`, so it goes into snapshots as is. Code that
//! rolls takes a [`RandomSource`] so tests can script the outcome.

/// Source of uniformly distributed integers.
pub trait RandomSource {
    /// A value in `[0, bound)`. A bound of zero yields zero.
    fn below(&mut self, bound: u32) -> u32;
}

/// SplitMix64 pseudo-random number generator.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SimRng {
    state: u64,
}

impl SimRng {
    /// Create a new RNG with the given seed.
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Generate the next `u64` in the sequence.
    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Get the internal state (for hashing/serialization).
    pub fn state(&self) -> u64 {
        self.state
    }
}

impl RandomSource for SimRng {
    fn below(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            return 0;
        }
        // Multiply-shift range reduction.
        (((self.next_u64() >> 32) * bound as u64) >> 32) as u32
    }
}
