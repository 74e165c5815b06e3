//! Content hashing used for deterministic document identities

use sha2::{Digest, Sha256};

/// SHA-256 of `data`, lower-case hex encoded (64 characters).
pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_ref());
    hex::encode(hasher.finalize())
}
