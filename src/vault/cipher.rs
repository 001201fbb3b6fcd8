//! Key derivation and AES-256-GCM sealing.
//!
//! The sealed format is `nonce (12 bytes) || ciphertext || tag (16 bytes)`.

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::Aes256Gcm;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::VaultError;

use super::machine_id::MachineIdentity;

pub const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// A derived AES-256 key. Wiped on drop.
pub struct VaultKey(Zeroizing<[u8; 32]>);

impl VaultKey {
    fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("VaultKey(..)")
    }
}

/// HMAC-SHA256 of the password, keyed by the machine identity.
pub fn derive_key(password: &[u8], identity: &MachineIdentity) -> Result<VaultKey, VaultError> {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(identity.key_material()).map_err(|e| {
        VaultError::KeyDerivation {
            message: e.to_string(),
        }
    })?;
    mac.update(password);

    let mut key = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(&mac.finalize().into_bytes());
    Ok(VaultKey(key))
}

pub fn encrypt(plaintext: &[u8], key: &VaultKey) -> Result<Vec<u8>, VaultError> {
    let cipher = Aes256Gcm::new(GenericArray::from_slice(key.as_bytes()));

    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    let nonce_ga = GenericArray::from_slice(&nonce);

    let ciphertext = cipher
        .encrypt(nonce_ga, plaintext)
        .map_err(|e| VaultError::Encrypt {
            message: e.to_string(),
        })?;

    let mut sealed = nonce.to_vec();
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Fails closed with [`VaultError::Integrity`] when the tag does not verify.
pub fn decrypt(sealed: &[u8], key: &VaultKey) -> Result<Vec<u8>, VaultError> {
    if sealed.len() < NONCE_LEN + TAG_LEN {
        return Err(VaultError::Truncated { len: sealed.len() });
    }

    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(GenericArray::from_slice(key.as_bytes()));

    cipher
        .decrypt(GenericArray::from_slice(nonce), ciphertext)
        .map_err(|_| VaultError::Integrity)
}
