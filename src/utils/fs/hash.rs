//! SHA-256 content fingerprints.

use sha2::{Digest, Sha256};

/// Compute the fingerprint of `bytes` as `sha256:<hex>`.
///
/// The engine compares fingerprints of bytes it is about to write with
/// fingerprints of bytes later observed on disk; equal fingerprints mean the
/// event is an echo of its own write.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}
