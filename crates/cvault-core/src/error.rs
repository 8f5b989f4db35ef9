use thiserror::Error;

pub type VaultResult<T> = Result<T, VaultError>;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(path: &std::path::Path) -> VaultResult<String> {
        Ok(std::fs::read_to_string(path)?)
    }

    #[test]
    fn test_io_error_converts() {
        let dir = tempfile::tempdir().unwrap();
        // a directory cannot be read as a string
        let err = read(dir.path()).unwrap_err();
        assert!(matches!(err, VaultError::Io(_)));
        assert!(err.to_string().starts_with("I/O error"));
    }

    #[test]
    fn test_config_error_display() {
        let err = VaultError::Config("parsing cvault.toml: bad key".into());
        assert_eq!(err.to_string(), "config error: parsing cvault.toml: bad key");
    }
}
