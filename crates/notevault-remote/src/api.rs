//! The remote backend capability.
//!
//! Concrete backends (WebDAV, cloud drives, a shared folder) implement
//! [`RemoteApiClient`]; everything above it only sees typed
//! [`RemoteError`]s and [`RemoteMetadata`].

use std::path::Path;

use notevault_shared::{FileDescriptor, FsAuthority};
use serde::{Deserialize, Serialize};

use crate::error::RemoteError;

/// What the backend knows about one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteMetadata {
    pub uid: Option<String>,
    pub path: String,
    pub name: String,
    /// Opaque token identifying this version of the content.
    pub revision: Option<String>,
    /// When the server last saw the content change (epoch millis).
    pub server_modified: Option<i64>,
    /// Modification time reported by the uploading client (epoch millis).
    pub client_modified: Option<i64>,
    pub is_directory: bool,
}

impl RemoteMetadata {
    pub fn to_descriptor(&self, authority: &FsAuthority) -> FileDescriptor {
        FileDescriptor {
            fs_authority: authority.clone(),
            path: self.path.clone(),
            uid: self.uid.clone(),
            name: self.name.clone(),
            is_directory: self.is_directory,
            modified: self.server_modified,
        }
    }

    /// Most recent modification instant known for this version.
    pub fn modified(&self) -> Option<i64> {
        match (self.server_modified, self.client_modified) {
            (Some(s), Some(c)) => Some(s.max(c)),
            (s, c) => s.or(c),
        }
    }
}

/// Blocking access to one remote backend account.
pub trait RemoteApiClient: Send + Sync {
    /// Authority every file of this client is scoped to.
    fn authority(&self) -> &FsAuthority;

    fn list_files(&self, dir: &FileDescriptor) -> Result<Vec<FileDescriptor>, RemoteError>;

    fn get_parent(&self, file: &FileDescriptor) -> Result<FileDescriptor, RemoteError>;

    fn get_root(&self) -> Result<FileDescriptor, RemoteError>;

    /// Fails with [`RemoteError::NotFound`] when the file does not exist.
    fn get_file_metadata(&self, file: &FileDescriptor) -> Result<RemoteMetadata, RemoteError>;

    fn download_file(&self, remote_path: &str, dest: &Path) -> Result<RemoteMetadata, RemoteError>;

    fn upload_file(&self, remote_path: &str, local: &Path) -> Result<RemoteMetadata, RemoteError>;
}
