//! Secret vault error types.

use thiserror::Error;

/// Errors from sealing or opening the client registration at rest.
#[derive(Debug, Clone, Error)]
pub enum VaultError {
    /// The authentication tag did not verify: wrong password, different
    /// machine, or a tampered file.
    #[error("integrity check failed while decrypting")]
    Integrity,

    /// The ciphertext is too short to contain a nonce and a tag.
    #[error("ciphertext too short ({len} bytes)")]
    Truncated { len: usize },

    /// Key derivation failed.
    #[error("key derivation failed: {message}")]
    KeyDerivation { message: String },

    /// Encryption failed.
    #[error("encryption failed: {message}")]
    Encrypt { message: String },
}

impl VaultError {
    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            VaultError::Integrity | VaultError::Truncated { .. } => {
                "The stored client registration could not be decrypted. The password is wrong, the file was modified, or it was created on another machine.".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            VaultError::Integrity => "E_VAULT_INTEGRITY",
            VaultError::Truncated { .. } => "E_VAULT_TRUNCATED",
            VaultError::KeyDerivation { .. } => "E_VAULT_KDF",
            VaultError::Encrypt { .. } => "E_VAULT_ENCRYPT",
        }
    }
}
