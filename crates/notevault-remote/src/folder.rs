//! A [`RemoteApiClient`] backed by a plain directory.
//!
//! Used for shared folders and mounted drives, and as the reference backend
//! in tests. The folder has no file ids, so every descriptor is addressed
//! by path; revisions are BLAKE3 content hashes.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

use notevault_shared::constants::REMOTE_ROOT;
use notevault_shared::types::{file_name, join_path};
use notevault_shared::{FileDescriptor, FsAuthority, FsType};
use tracing::debug;

use crate::api::{RemoteApiClient, RemoteMetadata};
use crate::error::RemoteError;

#[derive(Debug, Clone)]
pub struct FolderApiClient {
    root: PathBuf,
    authority: FsAuthority,
}

impl FolderApiClient {
    pub fn new(root: PathBuf, user: Option<String>) -> Result<Self, RemoteError> {
        fs::create_dir_all(&root).map_err(|e| io_error(&root, e))?;
        Ok(Self {
            root,
            authority: FsAuthority::new(FsType::Folder, user),
        })
    }

    pub fn root_dir(&self) -> &Path {
        &self.root
    }

    /// Map a `/`-separated remote path onto the folder, rejecting anything
    /// that would leave it.
    fn resolve(&self, remote_path: &str) -> Result<PathBuf, RemoteError> {
        let mut resolved = self.root.clone();
        for component in Path::new(remote_path.trim_start_matches('/')).components() {
            match component {
                Component::Normal(c) => resolved.push(c),
                Component::CurDir => {}
                _ => {
                    return Err(RemoteError::Api(format!(
                        "path escapes the folder: {remote_path}"
                    )))
                }
            }
        }
        Ok(resolved)
    }

    fn metadata_for(&self, remote_path: &str) -> Result<RemoteMetadata, RemoteError> {
        let path = self.resolve(remote_path)?;
        let meta = fs::metadata(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => RemoteError::NotFound(remote_path.to_string()),
            _ => io_error(&path, e),
        })?;

        let modified = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64);

        let revision = if meta.is_dir() {
            None
        } else {
            let data = fs::read(&path).map_err(|e| io_error(&path, e))?;
            Some(hex::encode(&blake3::hash(&data).as_bytes()[..16]))
        };

        Ok(RemoteMetadata {
            uid: None,
            path: normalize(remote_path),
            name: file_name(remote_path).to_string(),
            revision,
            server_modified: modified,
            client_modified: modified,
            is_directory: meta.is_dir(),
        })
    }
}

impl RemoteApiClient for FolderApiClient {
    fn authority(&self) -> &FsAuthority {
        &self.authority
    }

    fn list_files(&self, dir: &FileDescriptor) -> Result<Vec<FileDescriptor>, RemoteError> {
        let path = self.resolve(&dir.path)?;
        let entries = fs::read_dir(&path).map_err(|e| io_error(&path, e))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_error(&path, e))?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let child = join_path(&normalize(&dir.path), &name);
            files.push(self.metadata_for(&child)?.to_descriptor(&self.authority));
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    fn get_parent(&self, file: &FileDescriptor) -> Result<FileDescriptor, RemoteError> {
        let path = normalize(&file.path);
        let parent = match path.trim_end_matches('/').rsplit_once('/') {
            Some(("", _)) | None => REMOTE_ROOT.to_string(),
            Some((parent, _)) => parent.to_string(),
        };
        if parent == REMOTE_ROOT {
            return self.get_root();
        }
        Ok(self.metadata_for(&parent)?.to_descriptor(&self.authority))
    }

    fn get_root(&self) -> Result<FileDescriptor, RemoteError> {
        Ok(FileDescriptor::new(self.authority.clone(), REMOTE_ROOT).directory())
    }

    fn get_file_metadata(&self, file: &FileDescriptor) -> Result<RemoteMetadata, RemoteError> {
        self.metadata_for(&file.path)
    }

    fn download_file(&self, remote_path: &str, dest: &Path) -> Result<RemoteMetadata, RemoteError> {
        let source = self.resolve(remote_path)?;
        if !source.is_file() {
            return Err(RemoteError::NotFound(remote_path.to_string()));
        }
        fs::copy(&source, dest).map_err(|e| io_error(dest, e))?;
        debug!(remote_path, dest = %dest.display(), "downloaded from folder");
        self.metadata_for(remote_path)
    }

    fn upload_file(&self, remote_path: &str, local: &Path) -> Result<RemoteMetadata, RemoteError> {
        let target = self.resolve(remote_path)?;
        if let Some(parent) = target.parent() {
            if !parent.is_dir() {
                return Err(RemoteError::NotFound(parent.display().to_string()));
            }
        }
        fs::copy(local, &target).map_err(|e| io_error(&target, e))?;
        debug!(remote_path, source = %local.display(), "uploaded to folder");
        self.metadata_for(remote_path)
    }
}

fn normalize(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

// An unreadable folder behaves like an unreachable server.
fn io_error(path: &Path, e: std::io::Error) -> RemoteError {
    RemoteError::Network(format!("{}: {e}", path.display()))
}
