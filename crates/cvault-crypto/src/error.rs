use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors raised by the encryption engine.
///
/// Every variant is terminal for the file operation in progress. Display
/// strings are safe to show to the user: `AuthenticationFailed` in
/// particular never says whether the key or the data was at fault.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("no encryption key established for user '{scope}'")]
    KeyNotFound { scope: String },

    #[error("could not load your encryption key: {0}")]
    KeyFormat(String),

    #[error("could not load your encryption key: {0}")]
    Encoding(String),

    #[error("unable to decrypt this file")]
    AuthenticationFailed,

    #[error("unsupported encryption algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("user scope must not be empty")]
    InvalidScope,

    #[error("key storage error: {0}")]
    Storage(#[source] anyhow::Error),
}

impl CryptoError {
    /// True for the integrity-failure case that must never be retried with
    /// the same inputs.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, CryptoError::AuthenticationFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_failure_message_is_generic() {
        let msg = CryptoError::AuthenticationFailed.to_string();
        assert_eq!(msg, "unable to decrypt this file");
        assert!(!msg.contains("key"));
    }

    #[test]
    fn test_key_errors_share_user_message() {
        let a = CryptoError::KeyFormat("bad length".into()).to_string();
        let b = CryptoError::Encoding("bad padding".into()).to_string();
        assert!(a.starts_with("could not load your encryption key"));
        assert!(b.starts_with("could not load your encryption key"));
    }
}
