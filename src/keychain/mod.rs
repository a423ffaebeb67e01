//! Reversible encryption for secrets kept in the session catalogue.
//!
//! Passwords and passphrases never touch disk in clear text. They are sealed
//! with AES-256-GCM under a per-installation key that lives in the OS keychain,
//! or in a `0600` key file when no keychain is available.

use crate::error::{AppError, AppResult};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use keyring::Entry;
use rand::RngCore;
use std::fs;
use std::path::Path;

const SERVICE_NAME: &str = "fileman";
const KEY_ENTRY: &str = "credential-codec-key";
const KEY_FILE: &str = ".keyfile";
const NONCE_LEN: usize = 12;

/// Seals and opens secret fields of persisted sessions
#[derive(Clone)]
pub struct CredentialCodec {
    key: [u8; 32],
}

impl std::fmt::Debug for CredentialCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCodec").finish_non_exhaustive()
    }
}

impl CredentialCodec {
    pub fn from_key(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Load the codec key from the OS keychain, falling back to a key file in
    /// `config_dir`. A fresh key is generated on first run.
    pub fn load_or_create(config_dir: &Path) -> AppResult<Self> {
        match Entry::new(SERVICE_NAME, KEY_ENTRY) {
            Ok(entry) => match entry.get_password() {
                Ok(encoded) => {
                    if let Some(key) = decode_key(&encoded) {
                        tracing::debug!("Loaded credential key from OS keychain");
                        return Ok(Self::from_key(key));
                    }
                    tracing::warn!("Credential key in OS keychain is malformed, ignoring it");
                }
                Err(keyring::Error::NoEntry) => {
                    let key = Self::load_or_create_key_file(config_dir)?;
                    match entry.set_password(&STANDARD.encode(key)) {
                        Ok(()) => tracing::debug!("Stored credential key in OS keychain"),
                        Err(e) => tracing::warn!("OS keychain failed, keeping key file only: {}", e),
                    }
                    return Ok(Self::from_key(key));
                }
                Err(e) => {
                    tracing::warn!("OS keychain unavailable, using key file: {}", e);
                }
            },
            Err(e) => {
                tracing::warn!("OS keychain unavailable, using key file: {}", e);
            }
        }

        Ok(Self::from_key(Self::load_or_create_key_file(config_dir)?))
    }

    /// WARNING: the key file is only as safe as the user's home directory
    fn load_or_create_key_file(config_dir: &Path) -> AppResult<[u8; 32]> {
        let key_path = config_dir.join(KEY_FILE);

        if key_path.exists() {
            let key_data = fs::read(&key_path)
                .map_err(|e| AppError::Credential(format!("Failed to read key file: {}", e)))?;
            if key_data.len() == 32 {
                let mut key = [0u8; 32];
                key.copy_from_slice(&key_data);
                return Ok(key);
            }
            tracing::warn!("Key file {:?} has the wrong length, regenerating", key_path);
        }

        let mut key = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);

        fs::create_dir_all(config_dir)?;
        fs::write(&key_path, key)
            .map_err(|e| AppError::Credential(format!("Failed to write key file: {}", e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            let _ = fs::set_permissions(&key_path, perms);
        }

        Ok(key)
    }

    fn cipher(&self) -> AppResult<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| AppError::Credential(format!("Failed to create cipher: {}", e)))
    }

    /// Encrypt a secret into `base64(nonce || ciphertext)`
    pub fn encrypt(&self, plaintext: &str) -> AppResult<String> {
        let cipher = self.cipher()?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| AppError::Credential(format!("Failed to encrypt secret: {}", e)))?;

        let mut output = nonce_bytes.to_vec();
        output.extend(ciphertext);
        Ok(STANDARD.encode(output))
    }

    pub fn decrypt(&self, sealed: &str) -> AppResult<String> {
        let data = STANDARD
            .decode(sealed)
            .map_err(|e| AppError::Credential(format!("Sealed secret is not base64: {}", e)))?;

        if data.len() <= NONCE_LEN {
            return Err(AppError::Credential("Sealed secret is too short".to_string()));
        }

        let cipher = self.cipher()?;
        let nonce = Nonce::from_slice(&data[..NONCE_LEN]);
        let plaintext = cipher
            .decrypt(nonce, &data[NONCE_LEN..])
            .map_err(|e| AppError::Credential(format!("Failed to decrypt secret: {}", e)))?;

        String::from_utf8(plaintext)
            .map_err(|e| AppError::Credential(format!("Invalid UTF-8 in secret: {}", e)))
    }

    /// Seal an optional field; absent and empty secrets are not stored
    pub fn seal(&self, secret: Option<&str>) -> AppResult<Option<String>> {
        match secret {
            Some(s) if !s.is_empty() => self.encrypt(s).map(Some),
            _ => Ok(None),
        }
    }

    pub fn open(&self, sealed: Option<&str>) -> AppResult<Option<String>> {
        match sealed {
            Some(s) if !s.is_empty() => self.decrypt(s).map(Some),
            _ => Ok(None),
        }
    }
}

fn decode_key(encoded: &str) -> Option<[u8; 32]> {
    let bytes = STANDARD.decode(encoded.trim()).ok()?;
    bytes.try_into().ok()
}
