use notevault_remote::ProviderError;
use notevault_shared::CryptoError;
use notevault_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Wrong key or credentials")]
    Auth,

    #[error("Remote unreachable: {0}")]
    Network(String),

    #[error("Remote rejected the request: {0}")]
    Api(String),

    #[error("Invalid document: {0}")]
    Format(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Local and remote versions of {0} diverged")]
    VersionConflict(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("A group cannot be moved into its own subtree")]
    InvalidMove,

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache error: {0}")]
    Store(#[from] StoreError),
}

impl From<ProviderError> for DbError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Auth => DbError::Auth,
            ProviderError::Network(msg) => DbError::Network(msg),
            ProviderError::Api(msg) => DbError::Api(msg),
            ProviderError::NotFound(path) => DbError::NotFound(path),
            ProviderError::VersionConflict(path) => DbError::VersionConflict(path),
            ProviderError::Unsupported(msg) => DbError::Unsupported(msg),
            ProviderError::Store(e) => DbError::Store(e),
            ProviderError::Io(e) => DbError::Io(e),
        }
    }
}

// A failed AEAD tag means the key is wrong (or the bytes were tampered with).
impl From<CryptoError> for DbError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::DecryptionFailed => DbError::Auth,
            other => DbError::Format(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for DbError {
    fn from(e: serde_json::Error) -> Self {
        DbError::Format(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DbError>;
