//! End-to-end upload/download scenarios through `FileCrypto`.
//!
//! Each test plays the UI and transport collaborators: it hands raw file
//! bytes in, ships the ciphertext and metadata through a simulated
//! response, and checks what comes back out.

use std::sync::Arc;

use cvault_crypto::{
    export_key, import_key, CryptoError, DownloadedPayload, FileCrypto, FileMetadata, KeyStore,
    MemoryBackend, SecurityLevel, UserScope,
};

fn scope(id: &str) -> UserScope {
    UserScope::new(id).expect("valid scope")
}

/// Simulate the server echoing metadata back as response headers.
fn through_headers(upload: &cvault_crypto::UploadPayload) -> DownloadedPayload {
    let headers = upload.headers();
    DownloadedPayload::from_headers(
        upload.ciphertext.clone(),
        headers.iter().map(|(k, v)| (*k, v.as_str())),
    )
    .expect("headers carry iv and algo")
}

#[tokio::test]
async fn cross_session_persistence() {
    let alice = scope("alice");
    let original = b"tax-return-2025.pdf contents".to_vec();

    // Session A: first upload creates the key, user exports it.
    let session_a = FileCrypto::new(Arc::new(KeyStore::in_memory()));
    let upload = session_a
        .encrypt_for_upload(&alice, original.clone())
        .await
        .expect("encrypt");
    let key_a = session_a.key_store().get_key(&alice).await.expect("key exists");
    let exported = export_key(&key_a);

    // Session B: fresh store, key imported from the exported string.
    let session_b = FileCrypto::new(Arc::new(KeyStore::in_memory()));
    let imported = import_key(&exported).expect("import");
    session_b
        .key_store()
        .store_key(&alice, &imported)
        .await
        .expect("store imported key");

    let plaintext = session_b
        .decrypt_download(&alice, through_headers(&upload))
        .await
        .expect("decrypt in session B");
    assert_eq!(plaintext, original);
}

#[tokio::test]
async fn metadata_json_roundtrip_decrypts() {
    let bob = scope("bob");
    let crypto = FileCrypto::new(Arc::new(KeyStore::in_memory()));

    let upload = crypto
        .encrypt_for_upload(&bob, b"hello world".to_vec())
        .await
        .unwrap();

    let json = serde_json::to_string(&upload.metadata()).unwrap();
    let meta: FileMetadata = serde_json::from_str(&json).unwrap();
    assert_eq!(meta.original_size, 11);
    assert_eq!(meta.encrypted_size, 11 + 16);

    let download = DownloadedPayload::from_metadata(upload.ciphertext.clone(), &meta);
    let plaintext = crypto.decrypt_download(&bob, download).await.unwrap();
    assert_eq!(plaintext, b"hello world");
}

#[tokio::test]
async fn corrupted_download_is_rejected() {
    let carol = scope("carol");
    let crypto = FileCrypto::new(Arc::new(KeyStore::in_memory()));

    let upload = crypto
        .encrypt_for_upload(&carol, vec![0x5A; 4096])
        .await
        .unwrap();

    let mut truncated = through_headers(&upload);
    truncated.ciphertext.truncate(upload.ciphertext.len() - 1);
    let err = crypto.decrypt_download(&carol, truncated).await.unwrap_err();
    assert!(matches!(err, CryptoError::AuthenticationFailed));
    assert_eq!(err.to_string(), "unable to decrypt this file");

    let mut flipped = through_headers(&upload);
    flipped.ciphertext[100] ^= 0x80;
    let err = crypto.decrypt_download(&carol, flipped).await.unwrap_err();
    assert!(matches!(err, CryptoError::AuthenticationFailed));
}

#[tokio::test]
async fn large_file_roundtrip() {
    let dave = scope("dave");
    let crypto = FileCrypto::new(Arc::new(KeyStore::in_memory()));
    let body: Vec<u8> = (0..8 * 1024 * 1024).map(|i: u32| (i % 251) as u8).collect();

    let upload = crypto.encrypt_for_upload(&dave, body.clone()).await.unwrap();
    let plaintext = crypto
        .decrypt_download(&dave, through_headers(&upload))
        .await
        .unwrap();
    assert_eq!(plaintext, body);
}

#[tokio::test]
async fn configured_security_level_is_used() {
    let erin = scope("erin");
    let store = KeyStore::new(Arc::new(MemoryBackend::new()), SecurityLevel::Low);
    let crypto = FileCrypto::new(Arc::new(store));

    let upload = crypto.encrypt_for_upload(&erin, b"small".to_vec()).await.unwrap();
    assert_eq!(upload.algorithm.as_str(), "AES-128-GCM");

    let plaintext = crypto
        .decrypt_download(&erin, through_headers(&upload))
        .await
        .unwrap();
    assert_eq!(plaintext, b"small");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_uploads_share_one_key() {
    let frank = scope("frank");
    let crypto = FileCrypto::new(Arc::new(KeyStore::in_memory()));

    let uploads = spawn_uploads(&crypto, &frank).await;
    for (body, upload) in uploads {
        let plaintext = crypto
            .decrypt_download(&frank, through_headers(&upload))
            .await
            .expect("every racer encrypted under the surviving key");
        assert_eq!(plaintext, body);
    }
}

async fn spawn_uploads(
    crypto: &FileCrypto,
    scope: &UserScope,
) -> Vec<(Vec<u8>, cvault_crypto::UploadPayload)> {
    let mut handles = Vec::new();
    for i in 0..8u8 {
        let crypto = crypto.clone();
        let scope = scope.clone();
        handles.push(tokio::spawn(async move {
            let body = vec![i; 64];
            let upload = crypto.encrypt_for_upload(&scope, body.clone()).await.unwrap();
            (body, upload)
        }));
    }
    let mut out = Vec::new();
    for h in handles {
        out.push(h.await.unwrap());
    }
    out
}
