use alloc::string::String;

use rand::Rng;
use rand::RngCore;
use rand::SeedableRng;
use rand::rngs::SmallRng;

/// Length of every generated key.
pub const KEY_LEN: usize = 255;

/// Values are drawn from `[0, VALUE_SCALE)`.
pub const VALUE_SCALE: f64 = 90.0;

const ALPHABET: &[u8; 26] = b"abcdefghijklmnopqrstuvwxyz";

/// Seeded source of benchmark keys, values and sampling decisions.
///
/// All three draw from one stream, so the order of calls determines the
/// output. Two generators built from the same seed and driven by the same
/// sequence of calls produce identical results.
#[derive(Debug, Clone)]
pub struct KeyGenerator {
    rng: SmallRng,
}

impl KeyGenerator {
    /// Creates a generator from a fixed seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Draws a value uniformly from `[0, 90)`.
    #[inline]
    pub fn next_value(&mut self) -> f64 {
        self.rng.random::<f64>() * VALUE_SCALE
    }

    /// Draws a [`KEY_LEN`]-character key of lowercase ASCII letters, each
    /// chosen independently.
    pub fn next_key(&mut self) -> String {
        (0..KEY_LEN)
            .map(|_| char::from(ALPHABET[self.rng.random_range(0..ALPHABET.len())]))
            .collect()
    }

    /// Draws one `u32` and reports whether it is a multiple of
    /// `selectivity`, so roughly one call in `selectivity` returns `true`.
    ///
    /// # Panics
    ///
    /// Panics if `selectivity` is zero.
    #[inline]
    pub fn next_sample(&mut self, selectivity: u32) -> bool {
        self.rng.next_u32() % selectivity == 0
    }
}
