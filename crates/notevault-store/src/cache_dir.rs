//! App-private directory holding cached copies of remote files.

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Result, StoreError};

/// Verify that a path stays within the cache directory.
fn ensure_within(base: &Path, target: &Path) -> Result<PathBuf> {
    let relative = target.strip_prefix(base).map_err(|_| {
        StoreError::InvalidPath(format!("{} is outside the cache", target.display()))
    })?;

    let mut resolved = base.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(c) => resolved.push(c),
            Component::CurDir => {}
            _ => {
                return Err(StoreError::InvalidPath(format!(
                    "{} escapes the cache",
                    target.display()
                )))
            }
        }
    }
    Ok(resolved)
}

#[derive(Debug, Clone)]
pub struct CacheDir {
    base_path: PathBuf,
}

impl CacheDir {
    pub fn new(base_path: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_path)?;

        info!(path = %base_path.display(), "cache directory initialized");

        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// A fresh, randomly named path for a new cached file. The file itself
    /// is not created.
    pub fn new_file_path(&self) -> PathBuf {
        self.base_path.join(Uuid::new_v4().simple().to_string())
    }

    pub fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let path = ensure_within(&self.base_path, path)?;
        let data = fs::read(&path)?;
        debug!(path = %path.display(), size = data.len(), "read cached file");
        Ok(data)
    }

    /// Replace the contents of a cached file.
    ///
    /// Bytes land in a sibling temp file first and are renamed over the
    /// target, so a crash never leaves a half-written cache entry.
    pub fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let path = ensure_within(&self.base_path, path)?;
        let tmp = path.with_extension("partial");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &path)?;
        debug!(path = %path.display(), size = data.len(), "wrote cached file");
        Ok(())
    }

    pub fn exists(&self, path: &Path) -> bool {
        ensure_within(&self.base_path, path)
            .map(|p| p.is_file())
            .unwrap_or(false)
    }

    pub fn remove(&self, path: &Path) -> Result<()> {
        let path = ensure_within(&self.base_path, path)?;
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}
