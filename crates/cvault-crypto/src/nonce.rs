//! Per-encryption nonce generation from the OS CSPRNG.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::NONCE_SIZE;

/// Fresh 96-bit nonce for one AES-GCM call.
pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Random bytes of arbitrary length (salts, non-GCM callers).
pub fn generate_nonce_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    bytes
}
