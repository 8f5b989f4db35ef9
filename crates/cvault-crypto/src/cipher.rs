//! Whole-file AES-GCM encryption/decryption
//!
//! Encrypted payload (binary body + separately carried nonce):
//! ```text
//! body  = [N bytes: ciphertext][16 bytes: GCM tag]
//! nonce = 12 random bytes, sent beside the body as base64 metadata
//! ```
//!
//! The cipher width (AES-128/192/256) follows the key's length. Files are
//! encrypted in one shot, so the whole file must fit in memory.

use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{Aead, AeadCore, KeyInit, Nonce};
use aes_gcm::aes::Aes192;
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm};

use crate::encoding::encode_binary;
use crate::error::{CryptoError, CryptoResult};
use crate::keys::{Algorithm, SecurityLevel, SymmetricKey};
use crate::nonce::generate_nonce;
use crate::{NONCE_SIZE, TAG_SIZE};

type Aes192Gcm = AesGcm<Aes192, U12>;

/// Result of one encryption: ciphertext with trailing tag, the nonce used,
/// and the algorithm the key is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; NONCE_SIZE],
    pub algorithm: Algorithm,
}

impl EncryptedPayload {
    /// Nonce in transport encoding (16 base64 chars).
    pub fn nonce_encoded(&self) -> String {
        encode_binary(&self.nonce)
    }
}

/// Encrypt a complete file body under `key` with a fresh random nonce.
pub fn encrypt(plaintext: &[u8], key: &SymmetricKey) -> CryptoResult<EncryptedPayload> {
    let nonce = generate_nonce();

    let ciphertext = match key.level() {
        SecurityLevel::Low => seal::<Aes128Gcm>(key.as_bytes(), &nonce, plaintext),
        SecurityLevel::Medium => seal::<Aes192Gcm>(key.as_bytes(), &nonce, plaintext),
        SecurityLevel::High => seal::<Aes256Gcm>(key.as_bytes(), &nonce, plaintext),
    }
    .map_err(CryptoError::Encryption)?;

    Ok(EncryptedPayload {
        ciphertext,
        nonce,
        algorithm: key.algorithm(),
    })
}

/// Decrypt and verify a file body.
///
/// Any integrity problem (wrong key, modified ciphertext or nonce,
/// truncation) returns `AuthenticationFailed` and no bytes.
pub fn decrypt(ciphertext: &[u8], key: &SymmetricKey, nonce: &[u8]) -> CryptoResult<Vec<u8>> {
    let Ok(nonce) = <&[u8; NONCE_SIZE]>::try_from(nonce) else {
        tracing::debug!(
            nonce_len = nonce.len(),
            "rejecting decrypt: nonce has wrong length"
        );
        return Err(CryptoError::AuthenticationFailed);
    };
    if ciphertext.len() < TAG_SIZE {
        tracing::debug!(
            len = ciphertext.len(),
            "rejecting decrypt: ciphertext shorter than GCM tag"
        );
        return Err(CryptoError::AuthenticationFailed);
    }

    let result = match key.level() {
        SecurityLevel::Low => open::<Aes128Gcm>(key.as_bytes(), nonce, ciphertext),
        SecurityLevel::Medium => open::<Aes192Gcm>(key.as_bytes(), nonce, ciphertext),
        SecurityLevel::High => open::<Aes256Gcm>(key.as_bytes(), nonce, ciphertext),
    };

    result.map_err(|detail| {
        tracing::debug!(
            key = %key.fingerprint(),
            len = ciphertext.len(),
            "decrypt failed: {detail}"
        );
        CryptoError::AuthenticationFailed
    })
}

/// Decrypt after checking that `algorithm_tag` names a supported cipher and
/// matches the one `key` is bound to.
pub fn decrypt_with_algorithm(
    ciphertext: &[u8],
    key: &SymmetricKey,
    nonce: &[u8],
    algorithm_tag: &str,
) -> CryptoResult<Vec<u8>> {
    let algorithm: Algorithm = algorithm_tag.parse()?;
    if algorithm != key.algorithm() {
        return Err(CryptoError::UnsupportedAlgorithm(format!(
            "{algorithm} does not match key bound to {}",
            key.algorithm()
        )));
    }
    decrypt(ciphertext, key, nonce)
}

fn seal<C>(key: &[u8], nonce: &[u8; NONCE_SIZE], plaintext: &[u8]) -> Result<Vec<u8>, String>
where
    C: KeyInit + Aead + AeadCore<NonceSize = U12>,
{
    let cipher = C::new_from_slice(key).map_err(|e| format!("cipher rejected key: {e}"))?;
    cipher
        .encrypt(Nonce::<C>::from_slice(nonce), plaintext)
        .map_err(|e| format!("AES-GCM seal: {e}"))
}

fn open<C>(key: &[u8], nonce: &[u8; NONCE_SIZE], ciphertext: &[u8]) -> Result<Vec<u8>, String>
where
    C: KeyInit + Aead + AeadCore<NonceSize = U12>,
{
    let cipher = C::new_from_slice(key).map_err(|e| format!("cipher rejected key: {e}"))?;
    cipher
        .decrypt(Nonce::<C>::from_slice(nonce), ciphertext)
        .map_err(|_| "tag mismatch: invalid key, corrupted data, or wrong nonce".to_string())
}
