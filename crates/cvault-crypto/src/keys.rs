//! Symmetric file keys: generation, algorithm binding, export/import

use std::fmt;
use std::str::FromStr;

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::encoding::{decode_binary, encode_binary};
use crate::error::{CryptoError, CryptoResult};
use crate::KEY_SIZE;

/// Key strength selector. `High` (256-bit) is the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SecurityLevel {
    /// AES-128-GCM
    Low,
    /// AES-192-GCM
    Medium,
    /// AES-256-GCM
    #[default]
    High,
}

impl SecurityLevel {
    pub fn key_len(self) -> usize {
        match self {
            SecurityLevel::Low => 16,
            SecurityLevel::Medium => 24,
            SecurityLevel::High => 32,
        }
    }

    pub fn algorithm(self) -> Algorithm {
        match self {
            SecurityLevel::Low => Algorithm::Aes128Gcm,
            SecurityLevel::Medium => Algorithm::Aes192Gcm,
            SecurityLevel::High => Algorithm::Aes256Gcm,
        }
    }

    /// Map a raw key length back to its level.
    pub fn from_key_len(len: usize) -> Option<Self> {
        match len {
            16 => Some(SecurityLevel::Low),
            24 => Some(SecurityLevel::Medium),
            32 => Some(SecurityLevel::High),
            _ => None,
        }
    }
}

impl FromStr for SecurityLevel {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(SecurityLevel::Low),
            "MEDIUM" => Ok(SecurityLevel::Medium),
            "HIGH" => Ok(SecurityLevel::High),
            other => Err(CryptoError::UnsupportedAlgorithm(format!(
                "unknown security level '{other}'"
            ))),
        }
    }
}

/// The authenticated cipher a key is bound to. The string form is the
/// algorithm tag carried in upload/download metadata.
///
/// Deserialization goes through [`FromStr`], so JSON metadata and headers
/// accept the same spellings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum Algorithm {
    #[serde(rename = "AES-128-GCM")]
    Aes128Gcm,
    #[serde(rename = "AES-192-GCM")]
    Aes192Gcm,
    #[serde(rename = "AES-256-GCM")]
    Aes256Gcm,
}

impl Algorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::Aes128Gcm => "AES-128-GCM",
            Algorithm::Aes192Gcm => "AES-192-GCM",
            Algorithm::Aes256Gcm => "AES-256-GCM",
        }
    }

    pub fn level(self) -> SecurityLevel {
        match self {
            Algorithm::Aes128Gcm => SecurityLevel::Low,
            Algorithm::Aes192Gcm => SecurityLevel::Medium,
            Algorithm::Aes256Gcm => SecurityLevel::High,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses canonical tags and the legacy `LOW`/`MEDIUM`/`HIGH` aliases,
/// case-insensitively. Unknown tags are rejected, never defaulted.
impl FromStr for Algorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AES-128-GCM" | "LOW" => Ok(Algorithm::Aes128Gcm),
            "AES-192-GCM" | "MEDIUM" => Ok(Algorithm::Aes192Gcm),
            "AES-256-GCM" | "HIGH" => Ok(Algorithm::Aes256Gcm),
            _ => Err(CryptoError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

impl TryFrom<String> for Algorithm {
    type Error = CryptoError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// A user's symmetric file key. Zeroized on drop.
///
/// The key length fixes the algorithm it may be used with.
#[derive(Clone)]
pub struct SymmetricKey {
    bytes: [u8; KEY_SIZE],
    level: SecurityLevel,
}

impl SymmetricKey {
    /// Build a key from raw bytes. Fails with `KeyFormat` unless the slice
    /// is 16, 24, or 32 bytes long.
    pub fn from_slice(raw: &[u8]) -> CryptoResult<Self> {
        let level = SecurityLevel::from_key_len(raw.len()).ok_or_else(|| {
            CryptoError::KeyFormat(format!(
                "key is {} bytes (expected 16, 24, or 32)",
                raw.len()
            ))
        })?;
        let mut bytes = [0u8; KEY_SIZE];
        bytes[..raw.len()].copy_from_slice(raw);
        Ok(Self { bytes, level })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.level.key_len()]
    }

    pub fn level(&self) -> SecurityLevel {
        self.level
    }

    pub fn algorithm(&self) -> Algorithm {
        self.level.algorithm()
    }

    /// Short BLAKE3 fingerprint, safe to log and display.
    pub fn fingerprint(&self) -> String {
        blake3::hash(self.as_bytes()).to_hex().as_str()[..16].to_string()
    }
}

impl PartialEq for SymmetricKey {
    fn eq(&self, other: &Self) -> bool {
        self.level == other.level && self.as_bytes() == other.as_bytes()
    }
}

impl Eq for SymmetricKey {}

impl Drop for SymmetricKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("algorithm", &self.algorithm())
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generate a random key at the given security level.
pub fn generate_key(level: SecurityLevel) -> SymmetricKey {
    let mut bytes = [0u8; KEY_SIZE];
    OsRng.fill_bytes(&mut bytes[..level.key_len()]);
    SymmetricKey { bytes, level }
}

/// Serialize raw key bytes to the transport encoding (standard base64).
pub fn export_key(key: &SymmetricKey) -> String {
    encode_binary(key.as_bytes())
}

/// Inverse of [`export_key`].
pub fn import_key(encoded: &str) -> CryptoResult<SymmetricKey> {
    let mut raw = decode_binary(encoded.trim())?;
    let key = SymmetricKey::from_slice(&raw);
    raw.zeroize();
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_generation() {
        let k1 = generate_key(SecurityLevel::High);
        let k2 = generate_key(SecurityLevel::High);
        assert_ne!(k1.as_bytes(), k2.as_bytes(), "random keys must differ");
        assert_eq!(k1.as_bytes().len(), 32);
    }

    #[test]
    fn test_key_length_per_level() {
        assert_eq!(generate_key(SecurityLevel::Low).as_bytes().len(), 16);
        assert_eq!(generate_key(SecurityLevel::Medium).as_bytes().len(), 24);
        assert_eq!(
            generate_key(SecurityLevel::Medium).algorithm(),
            Algorithm::Aes192Gcm
        );
    }

    #[test]
    fn test_export_import_roundtrip() {
        let key = generate_key(SecurityLevel::High);
        let exported = export_key(&key);
        // 32 bytes -> 44 base64 chars with padding
        assert_eq!(exported.len(), 44);

        let imported = import_key(&exported).unwrap();
        assert_eq!(imported, key);
        assert_eq!(imported.algorithm(), Algorithm::Aes256Gcm);
    }

    #[test]
    fn test_import_wrong_length() {
        let encoded = encode_binary(&[7u8; 20]);
        let err = import_key(&encoded).unwrap_err();
        assert!(matches!(err, CryptoError::KeyFormat(_)));
    }

    #[test]
    fn test_import_bad_base64() {
        let err = import_key("not base64 !!").unwrap_err();
        assert!(matches!(err, CryptoError::Encoding(_)));
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = SymmetricKey::from_slice(&[0xAB; 32]).unwrap();
        let dbg = format!("{key:?}");
        assert!(dbg.contains("REDACTED"));
        assert!(!dbg.contains("171"));
        assert!(!dbg.to_lowercase().contains("abab"));
    }

    #[test]
    fn test_fingerprint_stable_and_short() {
        let key = SymmetricKey::from_slice(&[1u8; 16]).unwrap();
        assert_eq!(key.fingerprint(), key.clone().fingerprint());
        assert_eq!(key.fingerprint().len(), 16);
    }

    #[test]
    fn test_algorithm_tags() {
        assert_eq!("AES-256-GCM".parse::<Algorithm>().unwrap(), Algorithm::Aes256Gcm);
        assert_eq!("aes-128-gcm".parse::<Algorithm>().unwrap(), Algorithm::Aes128Gcm);
        assert_eq!("medium".parse::<Algorithm>().unwrap(), Algorithm::Aes192Gcm);
        assert_eq!(Algorithm::Aes256Gcm.to_string(), "AES-256-GCM");

        let err = "ChaCha20-Poly1305".parse::<Algorithm>().unwrap_err();
        assert!(matches!(err, CryptoError::UnsupportedAlgorithm(_)));
    }

    #[test]
    fn test_algorithm_serde_tag() {
        let json = serde_json::to_string(&Algorithm::Aes256Gcm).unwrap();
        assert_eq!(json, "\"AES-256-GCM\"");
        let parsed: Algorithm = serde_json::from_str("\"HIGH\"").unwrap();
        assert_eq!(parsed, Algorithm::Aes256Gcm);
    }

    #[test]
    fn test_algorithm_serde_matches_from_str() {
        for tag in ["aes-256-gcm", "Aes-192-Gcm", " AES-128-GCM ", "low"] {
            let from_json: Algorithm = serde_json::from_value(serde_json::json!(tag)).unwrap();
            assert_eq!(from_json, tag.parse::<Algorithm>().unwrap());
        }

        let err = serde_json::from_str::<Algorithm>("\"AES-256-CBC\"").unwrap_err();
        assert!(err.to_string().contains("unsupported encryption algorithm"));
    }
}
