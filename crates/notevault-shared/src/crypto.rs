use argon2::{Algorithm, Argon2, ParamsBuilder, Version};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use zeroize::{Zeroize, Zeroizing};

use crate::constants::{
    ARGON2_M_COST_KIB, ARGON2_P_COST, ARGON2_T_COST, KDF_SALT_DOCUMENT_KEY, NONCE_SIZE, SALT_SIZE,
    SYMMETRIC_KEY_SIZE,
};
use crate::error::CryptoError;

pub type SymmetricKey = [u8; SYMMETRIC_KEY_SIZE];

/// The opaque key a document is opened and saved under.
///
/// Holds the password-derived composite key. The actual cipher key is
/// bound to each document's salt through [`DocumentKey::cipher_key`], so the
/// same password produces a different cipher key for every saved copy.
#[derive(Clone)]
pub struct DocumentKey {
    composite: SymmetricKey,
}

impl DocumentKey {
    /// Derive a key from a user password using Argon2id.
    ///
    /// The salt here is the application-wide one; per-document salting
    /// happens later in [`DocumentKey::cipher_key`].
    pub fn from_password(password: &str) -> Result<Self, CryptoError> {
        let params = ParamsBuilder::new()
            .m_cost(ARGON2_M_COST_KIB)
            .t_cost(ARGON2_T_COST)
            .p_cost(ARGON2_P_COST)
            .output_len(SYMMETRIC_KEY_SIZE)
            .build()
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut key = Zeroizing::new([0u8; SYMMETRIC_KEY_SIZE]);
        argon2
            .hash_password_into(password.as_bytes(), KDF_SALT_DOCUMENT_KEY, &mut *key)
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

        let mut composite = [0u8; SYMMETRIC_KEY_SIZE];
        composite.copy_from_slice(&key[..]);
        Ok(Self { composite })
    }

    /// Restore a key from raw composite bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != SYMMETRIC_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength);
        }
        let mut composite = [0u8; SYMMETRIC_KEY_SIZE];
        composite.copy_from_slice(bytes);
        Ok(Self { composite })
    }

    /// Sentinel key a freshly created document is saved under before the
    /// user picks a password. No password derives to the all-zero key.
    pub fn unencrypted_default() -> Self {
        Self {
            composite: [0u8; SYMMETRIC_KEY_SIZE],
        }
    }

    pub fn is_unencrypted_default(&self) -> bool {
        *self == Self::unencrypted_default()
    }

    /// Cipher key for a document with the given salt.
    pub fn cipher_key(&self, salt: &[u8; SALT_SIZE]) -> SymmetricKey {
        let hash = blake3::keyed_hash(&self.composite, salt);
        let mut key = [0u8; SYMMETRIC_KEY_SIZE];
        key.copy_from_slice(hash.as_bytes());
        key
    }

    /// Short, non-reversible fingerprint for log lines.
    pub fn fingerprint(&self) -> String {
        hex::encode(&blake3::hash(&self.composite).as_bytes()[..4])
    }
}

// blake3::Hash comparison is constant-time
impl PartialEq for DocumentKey {
    fn eq(&self, other: &Self) -> bool {
        blake3::Hash::from(self.composite) == blake3::Hash::from(other.composite)
    }
}

impl Eq for DocumentKey {}

impl std::fmt::Debug for DocumentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentKey")
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

impl Drop for DocumentKey {
    fn drop(&mut self) {
        self.composite.zeroize();
    }
}

pub fn generate_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}

pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    nonce
}

// Returns nonce || ciphertext (24 bytes nonce prepended)
pub fn encrypt(key: &SymmetricKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(key.into());
    let nonce_bytes = generate_nonce();
    let nonce = XNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut output = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    output.extend_from_slice(&nonce_bytes);
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

pub fn decrypt(key: &SymmetricKey, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if data.len() < NONCE_SIZE {
        return Err(CryptoError::DecryptionFailed);
    }

    let (nonce_bytes, ciphertext) = data.split_at(NONCE_SIZE);
    let cipher = XChaCha20Poly1305::new(key.into());
    let nonce = XNonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)
}
