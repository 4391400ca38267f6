//! Nullable random: deterministic random number generation.

use lmnode_chain::Random;
use std::sync::Mutex;

/// Returns pre-configured values in order, reduced modulo the requested bound.
pub struct NullRandom {
    outputs: Vec<u32>,
    index: Mutex<usize>,
}

impl NullRandom {
    /// Create with a sequence of deterministic values.
    pub fn new(outputs: Vec<u32>) -> Self {
        Self {
            outputs,
            index: Mutex::new(0),
        }
    }

    /// Create with a single value that will be returned for every call.
    pub fn constant(value: u32) -> Self {
        Self::new(vec![value])
    }
}

impl Random for NullRandom {
    fn below(&self, upper: u32) -> u32 {
        if upper == 0 || self.outputs.is_empty() {
            return 0;
        }
        let mut idx = self.index.lock().unwrap();
        let value = self.outputs[*idx % self.outputs.len()];
        *idx += 1;
        value % upper
    }
}
