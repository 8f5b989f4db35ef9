//! Upload/download pipeline: Key Store + AES-GCM, off the async runtime.

use std::sync::Arc;

use crate::cipher;
use crate::encoding::decode_nonce;
use crate::error::{CryptoError, CryptoResult};
use crate::store::{KeyStore, UserScope};
use crate::transport::{DownloadedPayload, UploadPayload};

/// Encrypt-before-upload / decrypt-after-download for one key store.
#[derive(Debug, Clone)]
pub struct FileCrypto {
    store: Arc<KeyStore>,
}

impl FileCrypto {
    pub fn new(store: Arc<KeyStore>) -> Self {
        Self { store }
    }

    pub fn key_store(&self) -> &KeyStore {
        &self.store
    }

    /// Encrypt a file body for upload, creating the user's key on first use.
    pub async fn encrypt_for_upload(
        &self,
        scope: &UserScope,
        plaintext: Vec<u8>,
    ) -> CryptoResult<UploadPayload> {
        let key = self.store.get_or_create_key(scope).await?;
        let original_size = plaintext.len() as u64;

        let payload = tokio::task::spawn_blocking(move || cipher::encrypt(&plaintext, &key))
            .await
            .map_err(|e| task_failed("encrypt", e))??;

        tracing::debug!(
            scope = %scope,
            bytes = original_size,
            algorithm = %payload.algorithm,
            "encrypted file for upload"
        );
        Ok(UploadPayload::from_encrypted(payload, original_size))
    }

    /// Decrypt a downloaded body. Fails with `KeyNotFound` rather than
    /// creating a key when the scope has none.
    pub async fn decrypt_download(
        &self,
        scope: &UserScope,
        download: DownloadedPayload,
    ) -> CryptoResult<Vec<u8>> {
        let key = self.store.get_key(scope).await?;
        let nonce = decode_nonce(&download.nonce_encoded)?;
        let DownloadedPayload {
            ciphertext,
            algorithm_tag,
            ..
        } = download;

        let result = tokio::task::spawn_blocking(move || {
            cipher::decrypt_with_algorithm(&ciphertext, &key, &nonce, &algorithm_tag)
        })
        .await
        .map_err(|e| task_failed("decrypt", e))?;

        match &result {
            Ok(plaintext) => {
                tracing::debug!(scope = %scope, bytes = plaintext.len(), "decrypted download")
            }
            Err(e) => tracing::warn!(scope = %scope, "download rejected: {e}"),
        }
        result
    }
}

/// A cipher task that panicked or was cancelled says nothing about the data.
fn task_failed(stage: &str, e: tokio::task::JoinError) -> CryptoError {
    tracing::error!("{stage} task failed: {e}");
    CryptoError::Encryption(format!("{stage} task: {e}"))
}
