//! Key Store: per-user key lifecycle over a pluggable persistence backend.
//!
//! The store is an explicit object handed to whoever needs a key; the user
//! scope is always passed in, never read from ambient session state.
//!
//! Backends persist exactly one transport-encoded string per scope. The
//! store keeps an in-memory copy of loaded keys and serializes creation per
//! scope, so two uploads racing on a fresh account end up with one key.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex as StdMutex};

use anyhow::Result;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{Mutex, RwLock};

use crate::error::{CryptoError, CryptoResult};
use crate::keys::{export_key, generate_key, import_key, SecurityLevel, SymmetricKey};

/// Identity a key belongs to (the user id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserScope(String);

impl UserScope {
    pub fn new(id: impl Into<String>) -> CryptoResult<Self> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(CryptoError::InvalidScope);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persistence for transport-encoded keys, one entry per scope.
pub trait KeyBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Read the stored entry, `None` if the scope has no key.
    fn load(&self, scope: &UserScope) -> Result<Option<SecretString>>;

    /// Write (or replace) the entry for a scope.
    fn save(&self, scope: &UserScope, encoded: &SecretString) -> Result<()>;

    /// Delete the entry. Deleting a missing entry is not an error.
    fn remove(&self, scope: &UserScope) -> Result<()>;
}

/// Session-only backend. Entries vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: StdMutex<HashMap<UserScope, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn load(&self, scope: &UserScope) -> Result<Option<SecretString>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory key backend lock poisoned"))?;
        Ok(entries.get(scope).map(|s| SecretString::from(s.clone())))
    }

    fn save(&self, scope: &UserScope, encoded: &SecretString) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory key backend lock poisoned"))?;
        entries.insert(scope.clone(), encoded.expose_secret().to_string());
        Ok(())
    }

    fn remove(&self, scope: &UserScope) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory key backend lock poisoned"))?;
        entries.remove(scope);
        Ok(())
    }
}

/// Per-user key lifecycle: lazy creation, lookup, import, and reset.
pub struct KeyStore {
    backend: Arc<dyn KeyBackend>,
    level: SecurityLevel,
    cache: RwLock<HashMap<UserScope, SymmetricKey>>,
    creating: Mutex<HashMap<UserScope, Arc<Mutex<()>>>>,
}

impl KeyStore {
    /// Store that generates keys at `level` when a scope has none.
    pub fn new(backend: Arc<dyn KeyBackend>, level: SecurityLevel) -> Self {
        Self {
            backend,
            level,
            cache: RwLock::new(HashMap::new()),
            creating: Mutex::new(HashMap::new()),
        }
    }

    /// Store backed by [`MemoryBackend`] with 256-bit keys.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()), SecurityLevel::High)
    }

    pub fn security_level(&self) -> SecurityLevel {
        self.level
    }

    /// Encrypt-path lookup: return the scope's key, generating and
    /// persisting one first if none exists.
    pub async fn get_or_create_key(&self, scope: &UserScope) -> CryptoResult<SymmetricKey> {
        if let Some(key) = self.cached(scope).await {
            return Ok(key);
        }

        let lock = self.creation_lock(scope).await;
        let _guard = lock.lock().await;

        // Another caller may have created the key while we waited.
        if let Some(key) = self.lookup(scope).await? {
            return Ok(key);
        }

        let key = generate_key(self.level);
        self.persist(scope, &key)?;
        self.cache.write().await.insert(scope.clone(), key.clone());

        tracing::info!(
            scope = %scope,
            key = %key.fingerprint(),
            algorithm = %key.algorithm(),
            backend = self.backend.name(),
            "created encryption key"
        );
        Ok(key)
    }

    /// Decrypt-path lookup: never creates a key.
    pub async fn get_key(&self, scope: &UserScope) -> CryptoResult<SymmetricKey> {
        self.lookup(scope)
            .await?
            .ok_or_else(|| CryptoError::KeyNotFound {
                scope: scope.to_string(),
            })
    }

    /// Whether a key exists for the scope, without loading it into the cache.
    pub async fn has_key(&self, scope: &UserScope) -> CryptoResult<bool> {
        if self.cache.read().await.contains_key(scope) {
            return Ok(true);
        }
        Ok(self
            .backend
            .load(scope)
            .map_err(CryptoError::Storage)?
            .is_some())
    }

    /// Persist an imported key for a scope, replacing any existing one.
    pub async fn store_key(&self, scope: &UserScope, key: &SymmetricKey) -> CryptoResult<()> {
        let lock = self.creation_lock(scope).await;
        let _guard = lock.lock().await;

        match self.lookup(scope).await {
            Ok(Some(existing)) if existing != *key => {
                tracing::warn!(
                    scope = %scope,
                    old = %existing.fingerprint(),
                    new = %key.fingerprint(),
                    "replacing stored key; files encrypted under the old key become unreadable"
                );
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(scope = %scope, "replacing unreadable stored key: {e}"),
        }

        self.persist(scope, key)?;
        self.cache.write().await.insert(scope.clone(), key.clone());
        tracing::info!(scope = %scope, key = %key.fingerprint(), "stored imported key");
        Ok(())
    }

    /// Remove the scope's key. Irreversible for every file encrypted under it.
    pub async fn clear_key(&self, scope: &UserScope) -> CryptoResult<()> {
        let lock = self.creation_lock(scope).await;
        let _guard = lock.lock().await;

        self.backend.remove(scope).map_err(CryptoError::Storage)?;
        self.cache.write().await.remove(scope);
        self.release_creation_lock(scope, &lock).await;
        tracing::info!(scope = %scope, backend = self.backend.name(), "cleared encryption key");
        Ok(())
    }

    async fn cached(&self, scope: &UserScope) -> Option<SymmetricKey> {
        self.cache.read().await.get(scope).cloned()
    }

    async fn lookup(&self, scope: &UserScope) -> CryptoResult<Option<SymmetricKey>> {
        if let Some(key) = self.cached(scope).await {
            tracing::debug!(scope = %scope, "key cache hit");
            return Ok(Some(key));
        }

        let Some(encoded) = self.backend.load(scope).map_err(CryptoError::Storage)? else {
            return Ok(None);
        };
        let key = import_key(encoded.expose_secret())?;
        self.cache.write().await.insert(scope.clone(), key.clone());
        tracing::debug!(
            scope = %scope,
            key = %key.fingerprint(),
            backend = self.backend.name(),
            "loaded stored key"
        );
        Ok(Some(key))
    }

    fn persist(&self, scope: &UserScope, key: &SymmetricKey) -> CryptoResult<()> {
        let encoded = SecretString::from(export_key(key));
        self.backend
            .save(scope, &encoded)
            .map_err(CryptoError::Storage)
    }

    async fn creation_lock(&self, scope: &UserScope) -> Arc<Mutex<()>> {
        let mut locks = self.creating.lock().await;
        locks
            .entry(scope.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the scope's lock entry unless another caller already holds a
    /// clone. New clones are only handed out under the map lock held here.
    async fn release_creation_lock(&self, scope: &UserScope, lock: &Arc<Mutex<()>>) {
        let mut locks = self.creating.lock().await;
        // one reference in the map, one held by the caller
        if Arc::strong_count(lock) == 2 {
            locks.remove(scope);
        }
    }
}

impl fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyStore")
            .field("backend", &self.backend.name())
            .field("level", &self.level)
            .finish()
    }
}
