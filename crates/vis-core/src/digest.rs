//! Whole-file content digest.

use sha3::{Digest, Sha3_256};

/// Fixed-width digest carried in the stream header.
pub type ContentHash = [u8; 32];

/// SHA3-256 of `data`. This is the digest the sender writes into the header.
pub fn content_hash(data: &[u8]) -> ContentHash {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha3_256::digest(data));
    out
}
