//! cvault-secrets: persistent backends for per-user encryption keys
//!
//! Backends (selected by `[keystore] backend` in cvault.toml):
//!   - `file`     JSON key file, atomic writes, 0600 on Unix (default)
//!   - `keychain` platform keychain via the `keyring` crate
//!   - `memory`   process memory only; keys are lost on exit

pub mod file;
pub mod keychain;

pub use file::FileBackend;
pub use keychain::KeychainBackend;

use std::sync::Arc;

use anyhow::Result;
use cvault_core::config::{BackendKind, KeyStoreConfig};
use cvault_crypto::{KeyBackend, KeyStore, MemoryBackend, SecurityLevel};

/// Build the backend named by the config.
pub fn open_backend(config: &KeyStoreConfig) -> Result<Arc<dyn KeyBackend>> {
    let backend: Arc<dyn KeyBackend> = match config.backend {
        BackendKind::File => Arc::new(FileBackend::new(config.resolved_path())),
        BackendKind::Keychain => {
            if !keychain::is_available() {
                anyhow::bail!("platform keychain is not available on this system");
            }
            Arc::new(KeychainBackend::new(config.service_name.clone()))
        }
        BackendKind::Memory => {
            tracing::warn!("memory key backend: keys will not survive this process");
            Arc::new(MemoryBackend::new())
        }
    };
    tracing::debug!(backend = backend.name(), "opened key backend");
    Ok(backend)
}

/// Open the configured backend and wrap it in a key store.
pub fn open_key_store(config: &KeyStoreConfig, level: SecurityLevel) -> Result<KeyStore> {
    Ok(KeyStore::new(open_backend(config)?, level))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvault_crypto::UserScope;

    fn file_config(dir: &std::path::Path) -> KeyStoreConfig {
        KeyStoreConfig {
            backend: BackendKind::File,
            path: dir.join("keys.json"),
            ..Default::default()
        }
    }

    #[test]
    fn test_open_memory_backend() {
        let config = KeyStoreConfig {
            backend: BackendKind::Memory,
            ..Default::default()
        };
        assert_eq!(open_backend(&config).unwrap().name(), "memory");
    }

    #[test]
    fn test_open_file_backend() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(open_backend(&file_config(dir.path())).unwrap().name(), "file");
    }

    #[tokio::test]
    async fn test_file_store_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(dir.path());
        let alice = UserScope::new("alice").unwrap();

        let first = open_key_store(&config, SecurityLevel::High).unwrap();
        let created = first.get_or_create_key(&alice).await.unwrap();
        drop(first);

        let second = open_key_store(&config, SecurityLevel::High).unwrap();
        let loaded = second.get_key(&alice).await.unwrap();
        assert_eq!(created, loaded);
    }

    #[tokio::test]
    async fn test_file_store_keeps_users_apart() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_key_store(&file_config(dir.path()), SecurityLevel::Low).unwrap();
        let alice = UserScope::new("alice").unwrap();
        let bob = UserScope::new("bob").unwrap();

        let a = store.get_or_create_key(&alice).await.unwrap();
        let b = store.get_or_create_key(&bob).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(a.level(), SecurityLevel::Low);

        store.clear_key(&alice).await.unwrap();
        assert!(!store.has_key(&alice).await.unwrap());
        assert!(store.has_key(&bob).await.unwrap());
    }
}
