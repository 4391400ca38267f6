//! 256-bit score arithmetic for masternode ranking.
//!
//! Hashes are read as little-endian integers. Ranks compare the compact
//! "nBits" form of a score rather than the full value.

pub use primitive_types::U256;

/// Read 32 little-endian bytes as an integer.
pub fn u256_from_le(bytes: &[u8; 32]) -> U256 {
    U256::from_little_endian(bytes)
}

/// The 32 little-endian bytes of `value`.
pub fn u256_to_le(value: &U256) -> [u8; 32] {
    let mut out = [0u8; 32];
    for (chunk, limb) in out.chunks_exact_mut(8).zip(value.0.iter()) {
        chunk.copy_from_slice(&limb.to_le_bytes());
    }
    out
}

/// `|a - b|`.
pub fn abs_diff(a: U256, b: U256) -> U256 {
    if a >= b {
        a - b
    } else {
        b - a
    }
}

pub trait ToCompact {
    /// Compact "nBits" representation: 8-bit size, 23-bit mantissa, sign bit clear.
    ///
    /// Rankings compare this lossy form, so two scores that differ only below
    /// the mantissa tie and fall back to outpoint order.
    fn to_compact(&self) -> u32;
}

impl ToCompact for U256 {
    fn to_compact(&self) -> u32 {
        let mut size = (self.bits() as u32 + 7) / 8;
        let mut compact: u64 = if size <= 3 {
            self.low_u64() << (8 * (3 - size))
        } else {
            (*self >> (8 * (size - 3)) as usize).low_u64()
        };
        if compact & 0x0080_0000 != 0 {
            compact >>= 8;
            size += 1;
        }
        (compact as u32 & 0x007f_ffff) | (size << 24)
    }
}
