//! Chiffrement des secrets de configuration
//!
//! Les clés d'API (MASV) et mots de passe de portail peuvent être stockés
//! dans `config.yaml` sous la forme `encrypted:BASE64`. La clé AES-256-GCM
//! est dérivée de l'identifiant matériel du poste : un `config.yaml` copié
//! sur une autre machine ne se déchiffre pas.
//!
//! Format de la partie encodée : `nonce (12 octets) || ciphertext+tag`.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD as B64, Engine};
use sha2::{Digest, Sha256};

const ENCRYPTED_PREFIX: &str = "encrypted:";
const NONCE_LEN: usize = 12;

const KEY_SALT: &[u8] = b"bouncensend-config-encryption-v1";
const NONCE_SALT: &[u8] = b"bouncensend-nonce-v1";

/// Chiffreur lié à un identifiant de machine
pub struct SecretBox {
    cipher: Aes256Gcm,
}

impl SecretBox {
    /// Clé dérivée de l'identifiant du poste courant
    pub fn for_this_machine() -> Result<Self> {
        Self::from_machine_id(&machine_id()?)
    }

    pub fn from_machine_id(machine_id: &str) -> Result<Self> {
        let key = Sha256::new()
            .chain_update(machine_id.trim().as_bytes())
            .chain_update(KEY_SALT)
            .finalize();
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| anyhow!("Failed to create cipher: {}", e))?;
        Ok(Self { cipher })
    }

    /// Chiffre `secret` en `encrypted:BASE64`.
    ///
    /// Le nonce est dérivé du secret : une même valeur donne toujours le
    /// même texte chiffré, `config.yaml` reste stable d'une sauvegarde à
    /// l'autre.
    pub fn seal(&self, secret: &str) -> Result<String> {
        let digest = Sha256::new()
            .chain_update(secret.as_bytes())
            .chain_update(NONCE_SALT)
            .finalize();
        let nonce = Nonce::from_slice(&digest[..NONCE_LEN]);

        let sealed = self
            .cipher
            .encrypt(nonce, secret.as_bytes())
            .map_err(|e| anyhow!("Encryption failed: {}", e))?;

        let mut payload = nonce.to_vec();
        payload.extend(sealed);
        Ok(format!("{}{}", ENCRYPTED_PREFIX, B64.encode(payload)))
    }

    /// Déchiffre une valeur produite par [`SecretBox::seal`]
    pub fn open(&self, stored: &str) -> Result<String> {
        let encoded = stored
            .strip_prefix(ENCRYPTED_PREFIX)
            .ok_or_else(|| anyhow!("Secret is not in the encrypted:... format"))?;
        let payload = B64
            .decode(encoded.trim())
            .context("Encrypted secret is not valid base64")?;
        if payload.len() <= NONCE_LEN {
            return Err(anyhow!("Encrypted secret is truncated"));
        }

        let (nonce, sealed) = payload.split_at(NONCE_LEN);
        let plain = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| anyhow!("Cannot decrypt secret (encrypted on another machine?)"))?;
        String::from_utf8(plain).context("Decrypted secret is not UTF-8")
    }
}

/// Identifiant matériel stable du poste
pub(crate) fn machine_id() -> Result<String> {
    let id = platform_machine_id()?;
    let id = id.trim();
    if id.is_empty() {
        return Err(anyhow!("Machine identifier is empty"));
    }
    Ok(id.to_string())
}

#[cfg(target_os = "macos")]
fn platform_machine_id() -> Result<String> {
    // "IOPlatformUUID" = "XXXXXXXX-XXXX-..."
    let output = std::process::Command::new("ioreg")
        .args(["-rd1", "-c", "IOPlatformExpertDevice"])
        .output()
        .context("Failed to run ioreg")?;
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .find(|line| line.contains("IOPlatformUUID"))
        .and_then(|line| line.rsplit('"').nth(1))
        .map(str::to_string)
        .ok_or_else(|| anyhow!("IOPlatformUUID not found in ioreg output"))
}

#[cfg(target_os = "linux")]
fn platform_machine_id() -> Result<String> {
    ["/etc/machine-id", "/var/lib/dbus/machine-id"]
        .iter()
        .find_map(|path| {
            std::fs::read_to_string(path)
                .ok()
                .filter(|id| !id.trim().is_empty())
        })
        .ok_or_else(|| anyhow!("No machine-id file found"))
}

#[cfg(target_os = "windows")]
fn platform_machine_id() -> Result<String> {
    let output = std::process::Command::new("wmic")
        .args(["csproduct", "get", "UUID"])
        .output()
        .context("Failed to run wmic")?;
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .skip(1)
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("UUID not found in wmic output"))
}

#[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
fn platform_machine_id() -> Result<String> {
    Err(anyhow!("No machine identifier available on this platform"))
}

/// Chiffre `secret` pour ce poste (`encrypted:BASE64`)
///
/// ```rust,ignore
/// let stored = encrypt_secret("my-masv-api-key")?;
/// assert!(stored.starts_with("encrypted:"));
/// ```
pub fn encrypt_secret(secret: &str) -> Result<String> {
    SecretBox::for_this_machine()?.seal(secret)
}

/// Déchiffre une valeur `encrypted:BASE64` produite sur ce poste
pub fn decrypt_secret(stored: &str) -> Result<String> {
    SecretBox::for_this_machine()?.open(stored)
}

pub fn is_encrypted(value: &str) -> bool {
    value.starts_with(ENCRYPTED_PREFIX)
}

/// Valeur en clair d'un secret, chiffré ou non
pub fn get_secret(value: &str) -> Result<String> {
    if is_encrypted(value) {
        decrypt_secret(value)
    } else {
        Ok(value.to_string())
    }
}
