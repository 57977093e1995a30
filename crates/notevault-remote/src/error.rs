use notevault_store::StoreError;
use thiserror::Error;

/// Failures reported by a [`RemoteApiClient`](crate::RemoteApiClient).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Authentication with the remote failed")]
    Auth,

    #[error("Remote unreachable: {0}")]
    Network(String),

    #[error("Remote rejected the request: {0}")]
    Api(String),

    #[error("Remote file not found: {0}")]
    NotFound(String),
}

/// Errors surfaced by the file provider and the sync processor.
///
/// Backend failures are always translated into one of these variants at the
/// provider boundary; nothing opaque escapes it.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Authentication with the remote failed")]
    Auth,

    #[error("Remote unreachable: {0}")]
    Network(String),

    #[error("Remote rejected the request: {0}")]
    Api(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Local and remote versions of {0} diverged")]
    VersionConflict(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Cache error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RemoteError> for ProviderError {
    fn from(e: RemoteError) -> Self {
        match e {
            RemoteError::Auth => ProviderError::Auth,
            RemoteError::Network(msg) => ProviderError::Network(msg),
            RemoteError::Api(msg) => ProviderError::Api(msg),
            RemoteError::NotFound(path) => ProviderError::NotFound(path),
        }
    }
}

impl ProviderError {
    pub fn is_network(&self) -> bool {
        matches!(self, ProviderError::Network(_))
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;
