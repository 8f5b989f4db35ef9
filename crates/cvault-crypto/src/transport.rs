//! Upload/download metadata contract
//!
//! The ciphertext travels as the request/response body. The nonce and the
//! algorithm tag travel beside it, either as form fields in the upload's
//! JSON metadata or as `X-File-IV` / `X-File-Algo` response headers.

use serde::{Deserialize, Serialize};

use crate::cipher::EncryptedPayload;
use crate::error::{CryptoError, CryptoResult};
use crate::keys::Algorithm;

/// Header carrying the base64 nonce on download.
pub const IV_HEADER: &str = "X-File-IV";

/// Header carrying the algorithm tag on download.
pub const ALGO_HEADER: &str = "X-File-Algo";

/// Upload metadata fields sent alongside the ciphertext body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    /// Base64 nonce
    pub iv: String,
    pub algo: Algorithm,
    pub original_size: u64,
    pub encrypted_size: u64,
}

/// Everything the upload collaborator needs: body + metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPayload {
    pub ciphertext: Vec<u8>,
    pub nonce_encoded: String,
    pub algorithm: Algorithm,
    pub original_size: u64,
}

impl UploadPayload {
    pub fn from_encrypted(payload: EncryptedPayload, original_size: u64) -> Self {
        let nonce_encoded = payload.nonce_encoded();
        Self {
            ciphertext: payload.ciphertext,
            nonce_encoded,
            algorithm: payload.algorithm,
            original_size,
        }
    }

    pub fn metadata(&self) -> FileMetadata {
        FileMetadata {
            iv: self.nonce_encoded.clone(),
            algo: self.algorithm,
            original_size: self.original_size,
            encrypted_size: self.ciphertext.len() as u64,
        }
    }

    /// Header pairs for transports that carry metadata in headers.
    pub fn headers(&self) -> [(&'static str, String); 2] {
        [
            (IV_HEADER, self.nonce_encoded.clone()),
            (ALGO_HEADER, self.algorithm.as_str().to_string()),
        ]
    }
}

/// What the download collaborator hands back: body plus raw metadata.
///
/// The algorithm tag stays a string here; it is validated only when the
/// payload is decrypted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedPayload {
    pub ciphertext: Vec<u8>,
    pub nonce_encoded: String,
    pub algorithm_tag: String,
}

impl DownloadedPayload {
    pub fn new(
        ciphertext: Vec<u8>,
        nonce_encoded: impl Into<String>,
        algorithm_tag: impl Into<String>,
    ) -> Self {
        Self {
            ciphertext,
            nonce_encoded: nonce_encoded.into(),
            algorithm_tag: algorithm_tag.into(),
        }
    }

    /// Build from a response body and its headers. Header names match
    /// case-insensitively.
    pub fn from_headers<'a, I>(ciphertext: Vec<u8>, headers: I) -> CryptoResult<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut iv = None;
        let mut algo = None;
        for (name, value) in headers {
            if name.eq_ignore_ascii_case(IV_HEADER) {
                iv = Some(value.trim().to_string());
            } else if name.eq_ignore_ascii_case(ALGO_HEADER) {
                algo = Some(value.trim().to_string());
            }
        }

        let nonce_encoded =
            iv.ok_or_else(|| CryptoError::Encoding(format!("missing {IV_HEADER} header")))?;
        let algorithm_tag = algo.ok_or_else(|| {
            CryptoError::UnsupportedAlgorithm(format!("missing {ALGO_HEADER} header"))
        })?;

        Ok(Self {
            ciphertext,
            nonce_encoded,
            algorithm_tag,
        })
    }

    /// Build from the JSON metadata that was sent at upload time.
    pub fn from_metadata(ciphertext: Vec<u8>, metadata: &FileMetadata) -> Self {
        Self {
            ciphertext,
            nonce_encoded: metadata.iv.clone(),
            algorithm_tag: metadata.algo.as_str().to_string(),
        }
    }
}
