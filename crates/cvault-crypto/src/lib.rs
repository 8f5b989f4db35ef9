//! cvault-crypto: client-side file encryption for CryptoVault
//!
//! Architecture: encrypt-before-upload, decrypt-after-download with AES-GCM
//!
//! Upload:   plaintext → KeyStore::get_or_create_key → fresh 96-bit nonce → AES-GCM → ciphertext + base64(nonce)
//! Download: base64(nonce) + algorithm tag → KeyStore::get_key → AES-GCM verify/decrypt → plaintext
//!
//! Key model:
//! ```text
//! User scope (user id)
//!   └── SymmetricKey (128/192/256-bit random, bound to AES-{128,192,256}-GCM)
//!         ├── persisted as one base64 string per scope (KeyBackend)
//!         ├── optional passphrase-sealed backup (Argon2id → AES-256-GCM)
//!         └── File AEAD: AES-GCM (nonce = random 96-bit, carried beside the ciphertext)
//! ```
//!
//! The server never sees key material. Losing the key makes every file
//! encrypted under it unrecoverable.

pub mod backup;
pub mod cipher;
pub mod encoding;
pub mod engine;
pub mod error;
pub mod kdf;
pub mod keys;
pub mod nonce;
pub mod store;
pub mod transport;

pub use backup::{open_key, seal_key};
pub use cipher::{decrypt, decrypt_with_algorithm, encrypt, EncryptedPayload};
pub use encoding::{decode_binary, decode_nonce, encode_binary};
pub use engine::FileCrypto;
pub use error::{CryptoError, CryptoResult};
pub use kdf::KdfParams;
pub use keys::{export_key, generate_key, import_key, Algorithm, SecurityLevel, SymmetricKey};
pub use nonce::{generate_nonce, generate_nonce_bytes};
pub use store::{KeyBackend, KeyStore, MemoryBackend, UserScope};
pub use transport::{DownloadedPayload, FileMetadata, UploadPayload};

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of an AES-GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// Size of a default (AES-256) key in bytes
pub const KEY_SIZE: usize = 32;
