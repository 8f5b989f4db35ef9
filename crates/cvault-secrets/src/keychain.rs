//! Platform keychain backend for user keys.
//!
//! Uses the `keyring` crate for cross-platform access:
//! - macOS: Keychain Services
//! - Linux: GNOME Keyring / Secret Service (D-Bus)
//! - Windows: Credential Manager (DPAPI)

use anyhow::Result;
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroize;

use cvault_crypto::{KeyBackend, UserScope};

/// Default keychain service name
pub const SERVICE_NAME: &str = "cvault";

pub struct KeychainBackend {
    service: String,
}

impl KeychainBackend {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self, scope: &UserScope) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service, &entry_name(scope))
            .map_err(|e| anyhow::anyhow!("keychain entry creation: {e}"))
    }
}

impl Default for KeychainBackend {
    fn default() -> Self {
        Self::new(SERVICE_NAME)
    }
}

impl KeyBackend for KeychainBackend {
    fn name(&self) -> &'static str {
        "keychain"
    }

    fn load(&self, scope: &UserScope) -> Result<Option<SecretString>> {
        match self.entry(scope)?.get_password() {
            Ok(mut password) => {
                let secret = SecretString::from(password.clone());
                password.zeroize();
                Ok(Some(secret))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(anyhow::anyhow!("keychain get for '{scope}': {e}")),
        }
    }

    fn save(&self, scope: &UserScope, encoded: &SecretString) -> Result<()> {
        self.entry(scope)?
            .set_password(encoded.expose_secret())
            .map_err(|e| anyhow::anyhow!("keychain store for '{scope}': {e}"))?;
        tracing::debug!(scope = %scope, "stored key in platform keychain");
        Ok(())
    }

    fn remove(&self, scope: &UserScope) -> Result<()> {
        match self.entry(scope)?.delete_credential() {
            Ok(()) => {
                tracing::debug!(scope = %scope, "deleted key from platform keychain");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()), // already deleted
            Err(e) => Err(anyhow::anyhow!("keychain delete for '{scope}': {e}")),
        }
    }
}

/// Keychain account name for a scope's key.
pub fn entry_name(scope: &UserScope) -> String {
    format!("key:{}", scope.as_str())
}

/// Check if the platform keychain is available.
pub fn is_available() -> bool {
    keyring::Entry::new(SERVICE_NAME, "__cvault_probe__").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_name_is_scoped() {
        let alice = UserScope::new("alice").unwrap();
        let bob = UserScope::new("bob").unwrap();
        assert_eq!(entry_name(&alice), "key:alice");
        assert_ne!(entry_name(&alice), entry_name(&bob));
    }

    #[test]
    fn test_default_service() {
        assert_eq!(KeychainBackend::default().service(), "cvault");
        assert_eq!(KeychainBackend::new("other").service(), "other");
    }
}
