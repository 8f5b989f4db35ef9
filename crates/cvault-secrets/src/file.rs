//! JSON key file backend: one transport-encoded key per user scope.
//!
//! The whole map is rewritten on every change using an atomic write
//! (write temp file, then rename). On Unix the file is created 0600.

use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use zeroize::Zeroize;

use cvault_crypto::{KeyBackend, UserScope};

pub struct FileBackend {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let mut content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading key file: {}", self.path.display()))?;
        let parsed = serde_json::from_str(&content)
            .with_context(|| format!("parsing key file: {}", self.path.display()));
        content.zeroize();
        parsed
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating key dir: {}", parent.display()))?;
        }

        let mut json = serde_json::to_string_pretty(entries).context("serializing key file")?;

        let tmp_path = self.path.with_extension("tmp");
        let written = write_private(&tmp_path, json.as_bytes());
        json.zeroize();
        written.with_context(|| format!("writing key file temp: {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("renaming key file: {}", self.path.display()))
    }

    fn modify<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> bool,
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("key file lock poisoned"))?;
        let mut entries = self.read_entries()?;
        let changed = f(&mut entries);
        let result = if changed {
            self.write_entries(&entries)
        } else {
            Ok(())
        };
        for value in entries.values_mut() {
            value.zeroize();
        }
        result
    }
}

impl KeyBackend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    fn load(&self, scope: &UserScope) -> Result<Option<SecretString>> {
        let mut entries = self.read_entries()?;
        let found = entries.remove(scope.as_str()).map(SecretString::from);
        for value in entries.values_mut() {
            value.zeroize();
        }
        Ok(found)
    }

    fn save(&self, scope: &UserScope, encoded: &SecretString) -> Result<()> {
        self.modify(|entries| {
            entries.insert(scope.to_string(), encoded.expose_secret().to_string());
            true
        })?;
        tracing::debug!(scope = %scope, path = %self.path.display(), "saved key to file");
        Ok(())
    }

    fn remove(&self, scope: &UserScope) -> Result<()> {
        self.modify(|entries| entries.remove(scope.as_str()).is_some())
    }
}

#[cfg(unix)]
fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(data)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(id: &str) -> UserScope {
        UserScope::new(id).unwrap()
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("keys.json"));
        assert!(backend.load(&scope("alice")).unwrap().is_none());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/keys.json");
        let backend = FileBackend::new(&path);

        backend
            .save(&scope("alice"), &SecretString::from("a2V5LWE="))
            .unwrap();
        backend
            .save(&scope("bob"), &SecretString::from("a2V5LWI="))
            .unwrap();

        // a fresh backend on the same path sees both entries
        let reopened = FileBackend::new(&path);
        let alice = reopened.load(&scope("alice")).unwrap().unwrap();
        let bob = reopened.load(&scope("bob")).unwrap().unwrap();
        assert_eq!(alice.expose_secret(), "a2V5LWE=");
        assert_eq!(bob.expose_secret(), "a2V5LWI=");
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_remove_only_touches_one_scope() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("keys.json"));

        backend.save(&scope("alice"), &SecretString::from("AAAA")).unwrap();
        backend.save(&scope("bob"), &SecretString::from("BBBB")).unwrap();
        backend.remove(&scope("alice")).unwrap();
        backend.remove(&scope("nobody")).unwrap();

        assert!(backend.load(&scope("alice")).unwrap().is_none());
        assert!(backend.load(&scope("bob")).unwrap().is_some());
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.json");
        std::fs::write(&path, "{not json").unwrap();

        let backend = FileBackend::new(&path);
        assert!(backend.load(&scope("alice")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.json");
        let backend = FileBackend::new(&path);
        backend.save(&scope("alice"), &SecretString::from("AAAA")).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
