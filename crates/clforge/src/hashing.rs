//! FNV-1a hashing used for digests and entry-point suffixes.
//!
//! The exact constants matter: digests surface in generated kernel names and
//! in cache keys, so they must stay stable across releases.

pub const FNV1A_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
pub const FNV1A_PRIME: u64 = 0x0000_0100_0000_01b3;

#[inline]
pub fn fnv1a_init() -> u64 {
    FNV1A_OFFSET
}

#[inline]
pub fn fnv1a_bytes(mut hash: u64, bytes: &[u8]) -> u64 {
    for &byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV1A_PRIME);
    }
    hash
}

#[inline]
pub fn fnv1a_u64(hash: u64, value: u64) -> u64 {
    fnv1a_bytes(hash, &value.to_le_bytes())
}

/// One-shot digest of a byte slice.
#[inline]
pub fn fnv1a_hash(bytes: &[u8]) -> u64 {
    fnv1a_bytes(fnv1a_init(), bytes)
}
