//! Transport encoding: binary key/nonce values ↔ text for JSON fields and
//! HTTP headers. Standard base64 with padding.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{CryptoError, CryptoResult};
use crate::NONCE_SIZE;

pub fn encode_binary(data: &[u8]) -> String {
    STANDARD.encode(data)
}

pub fn decode_binary(s: &str) -> CryptoResult<Vec<u8>> {
    STANDARD
        .decode(s)
        .map_err(|e| CryptoError::Encoding(format!("base64 decode: {e}")))
}

/// Decode a transport-encoded nonce and check its length.
pub fn decode_nonce(s: &str) -> CryptoResult<[u8; NONCE_SIZE]> {
    let raw = decode_binary(s.trim())?;
    raw.as_slice().try_into().map_err(|_| {
        CryptoError::Encoding(format!(
            "nonce is {} bytes (expected {NONCE_SIZE})",
            raw.len()
        ))
    })
}
