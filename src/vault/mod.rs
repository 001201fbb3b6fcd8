//! At-rest protection for the client registration.
//!
//! The key is derived from the user's password and the host identity on every
//! call and dropped (wiped) right after use; nothing key-shaped is stored.

mod cipher;
mod machine_id;
mod password;

pub use cipher::{decrypt, derive_key, encrypt, VaultKey, NONCE_LEN};
pub use machine_id::{parse_container_id, MachineIdentity};
pub use password::{
    ask_with_default, create_passphrase, existing_passphrase, Passphrase, Prompter,
    TerminalPrompter, NO_PASSWORD_PLACEHOLDER,
};

#[cfg(test)]
pub use password::ScriptedPrompter;

use tracing::debug;

use crate::error::VaultError;

/// Seals and opens blobs for one host identity.
#[derive(Debug, Clone)]
pub struct SecretVault {
    identity: MachineIdentity,
}

impl SecretVault {
    pub fn new(identity: MachineIdentity) -> Self {
        Self { identity }
    }

    /// Vault bound to the identity of the current host.
    pub fn for_host() -> Self {
        Self::new(MachineIdentity::detect())
    }

    pub fn identity(&self) -> &MachineIdentity {
        &self.identity
    }

    pub fn seal(&self, plaintext: &[u8], passphrase: &Passphrase) -> Result<Vec<u8>, VaultError> {
        debug!("vault: sealing {} bytes", plaintext.len());
        let key = derive_key(passphrase.as_bytes(), &self.identity)?;
        encrypt(plaintext, &key)
    }

    pub fn open(&self, sealed: &[u8], passphrase: &Passphrase) -> Result<Vec<u8>, VaultError> {
        debug!("vault: opening {} bytes", sealed.len());
        let key = derive_key(passphrase.as_bytes(), &self.identity)?;
        decrypt(sealed, &key)
    }
}
