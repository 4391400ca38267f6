//! Randomness source for recovery height picks and verification nonces.

use rand::Rng;

pub trait Random: Send + Sync {
    /// A uniformly random integer in `[0, upper)`. Returns 0 when `upper` is 0.
    fn below(&self, upper: u32) -> u32;
}

/// Thread-local CSPRNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadRandom;

impl Random for ThreadRandom {
    fn below(&self, upper: u32) -> u32 {
        if upper == 0 {
            return 0;
        }
        rand::thread_rng().gen_range(0..upper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_in_range() {
        let rng = ThreadRandom;
        assert_eq!(rng.below(0), 0);
        for _ in 0..100 {
            assert!(rng.below(7) < 7);
        }
    }
}
