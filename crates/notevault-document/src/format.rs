//! On-disk document format.
//!
//! ```text
//! "NVDB" | version: u8 | salt: [u8; 16] | nonce: [u8; 24] | ciphertext
//! ```
//!
//! The ciphertext is XChaCha20-Poly1305 over the JSON document body, keyed
//! by the document key bound to this copy's salt. Every save draws a fresh
//! salt and nonce.

use std::io::Read;

use notevault_shared::constants::{DOCUMENT_MAGIC, DOCUMENT_VERSION, SALT_SIZE};
use notevault_shared::crypto::{self, generate_salt};
use notevault_shared::DocumentKey;
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{DbError, Result};
use crate::tree::{DocumentBody, Tree};

const HEADER_SIZE: usize = DOCUMENT_MAGIC.len() + 1 + SALT_SIZE;

pub(crate) fn encode(tree: &Tree, key: &DocumentKey) -> Result<Vec<u8>> {
    let body = Zeroizing::new(serde_json::to_vec(&tree.to_body())?);
    let salt = generate_salt();
    let cipher_key = Zeroizing::new(key.cipher_key(&salt));
    let sealed = crypto::encrypt(&cipher_key, &body)?;

    let mut out = Vec::with_capacity(HEADER_SIZE + sealed.len());
    out.extend_from_slice(DOCUMENT_MAGIC);
    out.push(DOCUMENT_VERSION);
    out.extend_from_slice(&salt);
    out.extend_from_slice(&sealed);

    debug!(size = out.len(), key = %key.fingerprint(), "encoded document");
    Ok(out)
}

pub(crate) fn decode(data: &[u8], key: &DocumentKey) -> Result<Tree> {
    if data.len() < HEADER_SIZE || &data[..DOCUMENT_MAGIC.len()] != DOCUMENT_MAGIC {
        return Err(DbError::Format("not a notevault document".into()));
    }
    let version = data[DOCUMENT_MAGIC.len()];
    if version != DOCUMENT_VERSION {
        return Err(DbError::Format(format!("unsupported document version {version}")));
    }

    let mut salt = [0u8; SALT_SIZE];
    salt.copy_from_slice(&data[DOCUMENT_MAGIC.len() + 1..HEADER_SIZE]);
    let cipher_key = Zeroizing::new(key.cipher_key(&salt));

    let body = Zeroizing::new(crypto::decrypt(&cipher_key, &data[HEADER_SIZE..])?);
    let body: DocumentBody = serde_json::from_slice(&body)?;
    Tree::from_body(body)
}

/// Decode a document straight from a byte stream.
pub(crate) fn read(mut reader: impl Read, key: &DocumentKey) -> Result<Tree> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    decode(&data, key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Note;
    use std::io;

    fn password_key(password: &str) -> DocumentKey {
        DocumentKey::from_password(password).unwrap()
    }

    fn sample() -> Tree {
        let mut tree = Tree::new("Vault");
        tree.insert_note(Note::new(tree.root_uid(), "Email")).unwrap();
        tree
    }

    #[test]
    fn decode_what_was_encoded() {
        let key = password_key("k1");
        let tree = sample();
        let bytes = encode(&tree, &key).unwrap();
        assert_eq!(&bytes[..4], b"NVDB");
        assert_eq!(decode(&bytes, &key).unwrap(), tree);
    }

    #[test]
    fn wrong_key_is_auth_error() {
        let bytes = encode(&sample(), &password_key("k1")).unwrap();
        assert!(matches!(
            decode(&bytes, &password_key("k2")),
            Err(DbError::Auth)
        ));
    }

    #[test]
    fn garbage_is_format_error() {
        let key = password_key("k1");
        assert!(matches!(decode(b"hello", &key), Err(DbError::Format(_))));

        let mut bytes = encode(&sample(), &key).unwrap();
        bytes[4] = 9;
        assert!(matches!(decode(&bytes, &key), Err(DbError::Format(_))));
    }

    #[test]
    fn valid_ciphertext_with_bad_body_is_format_error() {
        let key = password_key("k1");
        let salt = [3u8; SALT_SIZE];
        let sealed = crypto::encrypt(&key.cipher_key(&salt), b"{\"groups\":[]}").unwrap();
        let mut bytes = DOCUMENT_MAGIC.to_vec();
        bytes.push(DOCUMENT_VERSION);
        bytes.extend_from_slice(&salt);
        bytes.extend_from_slice(&sealed);

        assert!(matches!(decode(&bytes, &key), Err(DbError::Format(_))));
    }

    #[test]
    fn stream_failure_is_io_error() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            }
        }
        let key = password_key("k1");
        assert!(matches!(read(Broken, &key), Err(DbError::Io(_))));
    }
}
