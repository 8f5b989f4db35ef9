use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use cvault_crypto::{KdfParams, SecurityLevel};

use crate::error::{VaultError, VaultResult};

/// Top-level client configuration (loaded from cvault.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    pub keystore: KeyStoreConfig,
    pub crypto: CryptoConfig,
    pub logging: LoggingConfig,
}

impl VaultConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> VaultResult<Self> {
        if !path.exists() {
            tracing::warn!("config file not found: {}  (using defaults)", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| VaultError::Config(format!("parsing {}: {e}", path.display())))
    }
}

/// Where keys are persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// JSON file with one entry per user (default)
    #[default]
    File,
    /// Platform keychain (macOS Keychain, Secret Service, Credential Manager)
    Keychain,
    /// Process memory only; keys are lost on exit
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyStoreConfig {
    /// Backend kind: "file", "keychain", or "memory"
    pub backend: BackendKind,
    /// Key file for the file backend (default: ~/.local/share/cvault/keys.json)
    pub path: PathBuf,
    /// Keychain service name (default: cvault)
    pub service_name: String,
}

impl KeyStoreConfig {
    /// Key file path with `~` expanded.
    pub fn resolved_path(&self) -> PathBuf {
        expand_tilde(&self.path)
    }
}

/// File encryption settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Key size for newly created keys: LOW (128), MEDIUM (192), HIGH (256)
    pub security_level: SecurityLevel,
    /// Argon2id memory cost in KiB for sealed key backups (default: 65536 = 64 MiB)
    pub argon2_mem_cost_kib: u32,
    /// Argon2id time cost (iterations, default: 3)
    pub argon2_time_cost: u32,
    /// Argon2id parallelism (default: 4)
    pub argon2_parallelism: u32,
}

impl CryptoConfig {
    pub fn kdf_params(&self) -> KdfParams {
        KdfParams {
            mem_cost_kib: self.argon2_mem_cost_kib,
            time_cost: self.argon2_time_cost,
            parallelism: self.argon2_parallelism,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for KeyStoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::File,
            path: PathBuf::from("~/.local/share/cvault/keys.json"),
            service_name: "cvault".into(),
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        let kdf = KdfParams::default();
        Self {
            security_level: SecurityLevel::High,
            argon2_mem_cost_kib: kdf.mem_cost_kib,
            argon2_time_cost: kdf.time_cost,
            argon2_parallelism: kdf.parallelism,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Expand `~` in path to the user's home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        let home = std::env::var("HOME").unwrap_or_default();
        PathBuf::from(home).join(rest)
    } else {
        path.to_path_buf()
    }
}
