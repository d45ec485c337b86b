//! Password-based sealing of the key file.
//!
//! - Argon2id derives a 256-bit key from the key password
//! - AES-256-GCM encrypts the serialized context (AEAD)
//! - Fresh random salt and nonce per seal
//!
//! Sealed blobs start with [`SEALED_MAGIC`] so a loader can tell them apart
//! from an unsealed context without trying to decrypt.

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use argon2::{password_hash::SaltString, Algorithm, Argon2, Params, PasswordHasher, Version};
use rand::RngCore;
use thiserror::Error;
use zeroize::Zeroizing;

/// Prefix identifying a sealed key file.
pub const SEALED_MAGIC: &[u8; 8] = b"PVSEAL01";

const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum KdfError {
    #[error("Key derivation failed: {0}")]
    Derivation(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: authentication tag mismatch")]
    Decryption,

    #[error("Invalid sealed key format")]
    InvalidFormat,
}

/// Sealed key material with everything needed to open it again.
#[derive(Debug, Clone)]
pub struct SealedKey {
    pub ciphertext: Vec<u8>,
    /// Argon2 salt in PHC base64 form
    pub salt: String,
    pub nonce: [u8; NONCE_LEN],
}

impl SealedKey {
    /// `MAGIC | salt_len (u32 LE) | salt | nonce | ciphertext`
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let salt_bytes = self.salt.as_bytes();
        let salt_len = salt_bytes.len() as u32;

        let mut out = Vec::with_capacity(
            SEALED_MAGIC.len() + 4 + salt_bytes.len() + NONCE_LEN + self.ciphertext.len(),
        );
        out.extend_from_slice(SEALED_MAGIC);
        out.extend_from_slice(&salt_len.to_le_bytes());
        out.extend_from_slice(salt_bytes);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// # Errors
    /// Returns `KdfError::InvalidFormat` if the layout does not parse.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KdfError> {
        let rest = bytes
            .strip_prefix(SEALED_MAGIC.as_slice())
            .ok_or(KdfError::InvalidFormat)?;

        let (len_bytes, rest) = rest.split_first_chunk::<4>().ok_or(KdfError::InvalidFormat)?;
        let salt_len = u32::from_le_bytes(*len_bytes) as usize;
        if rest.len() < salt_len + NONCE_LEN {
            return Err(KdfError::InvalidFormat);
        }

        let (salt_bytes, rest) = rest.split_at(salt_len);
        let salt = std::str::from_utf8(salt_bytes)
            .map_err(|_| KdfError::InvalidFormat)?
            .to_string();

        let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(nonce_bytes);

        Ok(Self {
            ciphertext: ciphertext.to_vec(),
            salt,
            nonce,
        })
    }
}

/// Whether a key-file blob is sealed.
#[must_use]
pub fn is_sealed(bytes: &[u8]) -> bool {
    bytes.starts_with(SEALED_MAGIC)
}

fn derive_key(password: &str, salt: &SaltString) -> Result<Zeroizing<[u8; 32]>, KdfError> {
    let params = Params::new(47104, 1, 1, Some(32))
        .map_err(|e| KdfError::Derivation(format!("Invalid Argon2 params: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let hash = argon2
        .hash_password(password.as_bytes(), salt)
        .map_err(|e| KdfError::Derivation(e.to_string()))?;
    let output = hash
        .hash
        .ok_or_else(|| KdfError::Derivation("Hash output missing".to_string()))?;

    let bytes = output.as_bytes();
    if bytes.len() < 32 {
        return Err(KdfError::Derivation("Hash too short".to_string()));
    }

    let mut key = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(&bytes[..32]);
    Ok(key)
}

/// Seal key material under a password.
///
/// # Errors
/// Returns error if key derivation or encryption fails.
pub fn seal(plaintext: &[u8], password: &str) -> Result<SealedKey, KdfError> {
    let salt = SaltString::generate(&mut OsRng);
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);

    let key = derive_key(password, &salt)?;
    let cipher = Aes256Gcm::new_from_slice(key.as_slice())
        .map_err(|e| KdfError::Encryption(e.to_string()))?;

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| KdfError::Encryption(e.to_string()))?;

    Ok(SealedKey {
        ciphertext,
        salt: salt.to_string(),
        nonce: nonce_bytes,
    })
}

/// Open sealed key material.
///
/// # Errors
/// Returns `KdfError::Decryption` if the password is wrong or the data was
/// tampered with.
pub fn open(sealed: &SealedKey, password: &str) -> Result<Zeroizing<Vec<u8>>, KdfError> {
    let salt = SaltString::from_b64(&sealed.salt).map_err(|_| KdfError::InvalidFormat)?;

    let key = derive_key(password, &salt)?;
    let cipher = Aes256Gcm::new_from_slice(key.as_slice())
        .map_err(|e| KdfError::Derivation(e.to_string()))?;

    cipher
        .decrypt(Nonce::from_slice(&sealed.nonce), sealed.ciphertext.as_ref())
        .map(Zeroizing::new)
        .map_err(|_| KdfError::Decryption)
}
