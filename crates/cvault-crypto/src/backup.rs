//! Passphrase-sealed key backups
//!
//! Sealed format (base64 of):
//! ```text
//! [16 bytes: Argon2id salt][12 bytes: nonce][key ciphertext + 16-byte tag]
//! ```
//!
//! The wrapping key is always AES-256 regardless of the sealed key's size.

use secrecy::SecretString;
use zeroize::Zeroize;

use crate::cipher::{decrypt, encrypt};
use crate::encoding::{decode_binary, encode_binary};
use crate::error::{CryptoError, CryptoResult};
use crate::kdf::{derive_wrapping_key, KdfParams, SALT_SIZE};
use crate::keys::SymmetricKey;
use crate::nonce::generate_nonce_bytes;
use crate::{NONCE_SIZE, TAG_SIZE};

/// Seal `key` under a passphrase for offline backup or device transfer.
pub fn seal_key(
    key: &SymmetricKey,
    passphrase: &SecretString,
    params: &KdfParams,
) -> CryptoResult<String> {
    let mut salt = [0u8; SALT_SIZE];
    salt.copy_from_slice(&generate_nonce_bytes(SALT_SIZE));

    let wrapping = derive_wrapping_key(passphrase, &salt, params)?;
    let sealed = encrypt(key.as_bytes(), &wrapping)?;

    let mut out = Vec::with_capacity(SALT_SIZE + NONCE_SIZE + sealed.ciphertext.len());
    out.extend_from_slice(&salt);
    out.extend_from_slice(&sealed.nonce);
    out.extend_from_slice(&sealed.ciphertext);

    tracing::debug!(key = %key.fingerprint(), "sealed key backup");
    Ok(encode_binary(&out))
}

/// Open a backup produced by [`seal_key`].
///
/// A wrong passphrase or a modified backup fails with `AuthenticationFailed`.
pub fn open_key(
    sealed: &str,
    passphrase: &SecretString,
    params: &KdfParams,
) -> CryptoResult<SymmetricKey> {
    let raw = decode_binary(sealed.trim())?;
    if raw.len() < SALT_SIZE + NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::KeyFormat(format!(
            "sealed key too short: {} bytes",
            raw.len()
        )));
    }

    let (salt, rest) = raw.split_at(SALT_SIZE);
    let (nonce, ciphertext) = rest.split_at(NONCE_SIZE);

    let mut salt_arr = [0u8; SALT_SIZE];
    salt_arr.copy_from_slice(salt);

    let wrapping = derive_wrapping_key(passphrase, &salt_arr, params)?;
    let mut plaintext = decrypt(ciphertext, &wrapping, nonce)?;

    let key = SymmetricKey::from_slice(&plaintext);
    plaintext.zeroize();
    key
}
