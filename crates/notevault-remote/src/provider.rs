//! Cache-aware access to remote files.
//!
//! [`RemoteFileProvider`] resolves a logical file to bytes, preferring a
//! fresh remote copy, falling back to the local cache when the remote is
//! unreachable, and recording every round-trip in the cache database. All
//! network I/O for a file runs under a single-flight processing unit.

use std::path::Path;
use std::sync::Arc;

use notevault_shared::types::{join_path, now_millis};
use notevault_shared::{FileDescriptor, FsAuthority, Outcome};
use notevault_store::{CacheDir, RemoteFile, SharedDatabase};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::{RemoteApiClient, RemoteMetadata};
use crate::error::{ProviderError, RemoteError, Result};
use crate::processing::{ProcessingGuard, ProcessingRegistry, ProcessingStatus, ProcessingUnit};
use crate::write::{PendingWrite, WriteMode};

/// Where a read or write may go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OpenMode {
    #[default]
    Remote,
    /// Never touch the network.
    CacheOnly,
}

/// What to do when local and remote copies diverged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConflictStrategy {
    /// Refuse with a version conflict.
    #[default]
    Cancel,
    /// Overwrite the other side.
    ForceRewrite,
}

/// Per-call options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileOptions {
    pub mode: OpenMode,
    pub conflict: ConflictStrategy,
    /// Changes are being postponed for this file; writes stay local when
    /// postponed sync is enabled.
    pub postponed: bool,
}

impl FileOptions {
    pub fn cache_only() -> Self {
        Self {
            mode: OpenMode::CacheOnly,
            ..Self::default()
        }
    }

    pub fn force_rewrite() -> Self {
        Self {
            conflict: ConflictStrategy::ForceRewrite,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub cache_enabled: bool,
    pub write_enabled: bool,
    pub postponed_sync_enabled: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            write_enabled: true,
            postponed_sync_enabled: true,
        }
    }
}

#[derive(Clone)]
pub struct RemoteFileProvider {
    api: Arc<dyn RemoteApiClient>,
    db: SharedDatabase,
    cache: CacheDir,
    registry: Arc<ProcessingRegistry>,
    config: ProviderConfig,
}

impl RemoteFileProvider {
    pub fn new(
        api: Arc<dyn RemoteApiClient>,
        db: SharedDatabase,
        cache: CacheDir,
        registry: Arc<ProcessingRegistry>,
        config: ProviderConfig,
    ) -> Self {
        Self {
            api,
            db,
            cache,
            registry,
            config,
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn authority(&self) -> &FsAuthority {
        self.api.authority()
    }

    pub fn api(&self) -> &Arc<dyn RemoteApiClient> {
        &self.api
    }

    pub(crate) fn cache_dir(&self) -> &CacheDir {
        &self.cache
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch the contents of `file`.
    ///
    /// A deferred outcome means the bytes came from the cache because the
    /// remote could not be reached (or the caller asked for cache only).
    pub fn open_file_for_read(
        &self,
        file: &FileDescriptor,
        options: FileOptions,
    ) -> Result<Outcome<Vec<u8>>> {
        if options.mode == OpenMode::CacheOnly {
            return match self.cached_entry(file)? {
                Some(entry) if self.cache.exists(Path::new(&entry.local_path)) => {
                    debug!(path = %file.path, "serving cache-only read");
                    Ok(Outcome::deferred(self.read_cached(&entry)?))
                }
                _ => Err(ProviderError::NotFound(file.path.clone())),
            };
        }

        let _guard = self.begin(ProcessingStatus::Downloading, file)?;
        let cached = self.cached_entry(file)?;

        let meta = match self.api.get_file_metadata(file) {
            Ok(meta) => meta,
            Err(RemoteError::Network(reason)) => {
                return match cached {
                    Some(entry) if self.config.cache_enabled => {
                        warn!(path = %file.path, %reason, "remote unreachable, serving cached copy");
                        Ok(Outcome::deferred(self.read_cached(&entry)?))
                    }
                    _ => Err(ProviderError::Network(reason)),
                };
            }
            Err(e) => return Err(e.into()),
        };

        let entry = match cached {
            Some(entry) if self.config.cache_enabled => entry,
            _ => return self.download_fresh(file, &meta).map(Outcome::fresh),
        };

        let cached_copy_present = self.cache.exists(Path::new(&entry.local_path));
        if entry.revision != meta.revision || !cached_copy_present {
            if entry.locally_modified
                && cached_copy_present
                && options.conflict != ConflictStrategy::ForceRewrite
            {
                warn!(
                    path = %file.path,
                    cached = ?entry.revision,
                    remote = ?meta.revision,
                    "remote changed under unsynced local edits"
                );
                return Err(ProviderError::VersionConflict(file.path.clone()));
            }
            let entry = self.download_into(entry, &meta)?;
            return Ok(Outcome::fresh(self.read_cached(&entry)?));
        }

        let mut entry = entry;
        if !entry.locally_modified {
            entry.last_modification_timestamp = meta.modified();
        }
        entry.last_remote_modification_timestamp = meta.modified();
        if entry.uid.is_none() {
            entry.uid = meta.uid.clone();
        }
        self.save_entry(&mut entry)?;
        debug!(path = %file.path, revision = ?meta.revision, "cached copy is current");
        Ok(Outcome::fresh(self.read_cached(&entry)?))
    }

    /// Download into a new cache entry (or a scratch file when caching is
    /// off).
    fn download_fresh(&self, file: &FileDescriptor, meta: &RemoteMetadata) -> Result<Vec<u8>> {
        let local_path = self.cache.new_file_path();
        let confirmed = self.api.download_file(&meta.path, &local_path)?;
        let data = self.cache.read(&local_path)?;

        if !self.config.cache_enabled {
            self.cache.remove(&local_path)?;
            return Ok(data);
        }

        let mut entry = RemoteFile::new(
            self.authority().clone(),
            confirmed.uid.clone().or_else(|| file.uid.clone()),
            local_path.to_string_lossy(),
            confirmed.path.clone(),
        );
        apply_confirmed(&mut entry, &confirmed);
        entry.last_download_timestamp = Some(now_millis());
        self.save_entry(&mut entry)?;

        info!(path = %file.path, revision = ?confirmed.revision, "downloaded new file into cache");
        Ok(data)
    }

    /// Refresh an existing entry from the remote. Caller holds the unit.
    fn download_into(&self, mut entry: RemoteFile, meta: &RemoteMetadata) -> Result<RemoteFile> {
        entry.downloading = true;
        self.save_entry(&mut entry)?;

        let result = self
            .api
            .download_file(&meta.path, Path::new(&entry.local_path));
        entry.downloading = false;

        match result {
            Ok(confirmed) => {
                apply_confirmed(&mut entry, &confirmed);
                entry.last_download_timestamp = Some(now_millis());
                entry.reset_retries();
                self.save_entry(&mut entry)?;
                info!(path = %entry.remote_path, revision = ?entry.revision, "refreshed cached copy");
                Ok(entry)
            }
            Err(e) => {
                entry.record_retry(now_millis());
                self.save_entry(&mut entry)?;
                Err(e.into())
            }
        }
    }

    // ------------------------------------------------------------------
    // Write
    // ------------------------------------------------------------------

    /// Prepare a write of `file`. Nothing reaches the remote until
    /// [`PendingWrite::finish`].
    pub fn open_file_for_write(
        &self,
        file: &FileDescriptor,
        options: FileOptions,
    ) -> Result<PendingWrite> {
        if !self.config.write_enabled {
            return Err(ProviderError::Unsupported(format!(
                "writing is disabled for {}",
                file.path
            )));
        }

        let cached = self.cached_entry(file)?.filter(|_| self.config.cache_enabled);

        // A postponed write with nothing cached yet goes to the remote.
        let stays_local = options.mode == OpenMode::CacheOnly
            || (options.postponed && self.config.postponed_sync_enabled && cached.is_some());
        if stays_local {
            return match cached {
                Some(entry) => {
                    debug!(path = %file.path, "write stays local");
                    Ok(PendingWrite::new(self.clone(), file.clone(), entry, WriteMode::LocalOnly))
                }
                None => Err(ProviderError::NotFound(file.path.clone())),
            };
        }

        let meta = {
            let _guard = self.begin(ProcessingStatus::Uploading, file)?;
            self.api.get_file_metadata(file)
        };

        match meta {
            Err(RemoteError::NotFound(_)) => self.prepare_create(file, cached),
            Err(RemoteError::Network(reason)) => match cached {
                Some(entry) => {
                    warn!(path = %file.path, %reason, "remote unreachable, writing offline");
                    Ok(PendingWrite::new(self.clone(), file.clone(), entry, WriteMode::Offline))
                }
                None => Err(ProviderError::Network(reason)),
            },
            Err(e) => Err(e.into()),
            Ok(meta) => {
                if options.conflict != ConflictStrategy::ForceRewrite {
                    match &cached {
                        Some(entry) if !local_not_older(entry, &meta) => {
                            warn!(
                                path = %file.path,
                                local = ?entry.last_modification_timestamp,
                                remote = ?meta.modified(),
                                "refusing to overwrite newer remote version"
                            );
                            return Err(ProviderError::VersionConflict(file.path.clone()));
                        }
                        // Without caching there is no base version to compare.
                        None if self.config.cache_enabled => {
                            warn!(
                                path = %file.path,
                                remote = ?meta.revision,
                                "refusing to overwrite a remote file never read here"
                            );
                            return Err(ProviderError::VersionConflict(file.path.clone()));
                        }
                        _ => {}
                    }
                }
                let entry = cached.unwrap_or_else(|| self.new_entry(file, &meta.path));
                Ok(PendingWrite::new(
                    self.clone(),
                    file.clone(),
                    entry,
                    WriteMode::Upload {
                        remote_path: meta.path,
                    },
                ))
            }
        }
    }

    fn prepare_create(
        &self,
        file: &FileDescriptor,
        cached: Option<RemoteFile>,
    ) -> Result<PendingWrite> {
        let parent = self.api.get_parent(file)?;
        let remote_path = join_path(&parent.path, &file.name);
        info!(path = %remote_path, "creating new remote file");

        let entry = match cached {
            Some(mut entry) => {
                entry.remote_path = remote_path.clone();
                entry
            }
            None => self.new_entry(file, &remote_path),
        };
        Ok(PendingWrite::new(
            self.clone(),
            file.clone(),
            entry,
            WriteMode::Upload { remote_path },
        ))
    }

    fn new_entry(&self, file: &FileDescriptor, remote_path: &str) -> RemoteFile {
        RemoteFile::new(
            self.authority().clone(),
            file.uid.clone(),
            self.cache.new_file_path().to_string_lossy(),
            remote_path,
        )
    }

    // ------------------------------------------------------------------
    // Explicit transfers (sync)
    // ------------------------------------------------------------------

    /// Push the cached copy of `file` to the remote.
    pub fn upload(&self, file: &FileDescriptor) -> Result<RemoteFile> {
        let mut entry = self
            .cached_entry(file)?
            .ok_or_else(|| ProviderError::NotFound(file.path.clone()))?;
        let _guard = self.begin(ProcessingStatus::Uploading, file)?;

        entry.uploading = true;
        self.save_entry(&mut entry)?;
        let result = self
            .api
            .upload_file(&entry.remote_path, Path::new(&entry.local_path));
        entry.uploading = false;

        match result {
            Ok(confirmed) => {
                apply_confirmed(&mut entry, &confirmed);
                entry.uploaded = true;
                entry.reset_retries();
                self.save_entry(&mut entry)?;
                info!(path = %entry.remote_path, revision = ?entry.revision, "uploaded cached copy");
                Ok(entry)
            }
            Err(e) => {
                if !matches!(e, RemoteError::Network(_)) {
                    entry.upload_failed = true;
                }
                entry.record_retry(now_millis());
                self.save_entry(&mut entry)?;
                Err(e.into())
            }
        }
    }

    /// Replace the cached copy of `file` with the remote version,
    /// discarding local edits.
    pub fn download(&self, file: &FileDescriptor) -> Result<RemoteFile> {
        let cached = self.cached_entry(file)?;
        let _guard = self.begin(ProcessingStatus::Downloading, file)?;
        let meta = self.api.get_file_metadata(file)?;

        match cached {
            Some(entry) => self.download_into(entry, &meta),
            None => {
                self.download_fresh(file, &meta)?;
                self.cached_entry(&meta.to_descriptor(self.authority()))?
                    .ok_or_else(|| ProviderError::NotFound(file.path.clone()))
            }
        }
    }

    /// Live metadata lookup, serialized with other operations on the file.
    pub fn fetch_metadata(&self, file: &FileDescriptor) -> Result<RemoteMetadata> {
        let _guard = self.begin(ProcessingStatus::Downloading, file)?;
        Ok(self.api.get_file_metadata(file)?)
    }

    // ------------------------------------------------------------------
    // Cache bookkeeping
    // ------------------------------------------------------------------

    /// Cache entry for `file`, looked up by uid first, then by remote path.
    pub fn cached_entry(&self, file: &FileDescriptor) -> Result<Option<RemoteFile>> {
        let db = self.db.lock();
        if let Some(uid) = &file.uid {
            if let Some(entry) = db.get_remote_file_by_uid(self.authority(), uid)? {
                return Ok(Some(entry));
            }
        }
        Ok(db.get_remote_file_by_remote_path(self.authority(), &file.path)?)
    }

    /// Cache entries with unsynced local edits.
    pub fn locally_modified(&self) -> Result<Vec<RemoteFile>> {
        Ok(self.db.lock().list_locally_modified(self.authority())?)
    }

    pub(crate) fn save_entry(&self, entry: &mut RemoteFile) -> Result<()> {
        if !self.config.cache_enabled {
            return Ok(());
        }
        let db = self.db.lock();
        match entry.id {
            Some(_) => db.update_remote_file(entry)?,
            None => entry.id = Some(db.insert_remote_file(entry)?),
        }
        Ok(())
    }

    pub(crate) fn read_cached(&self, entry: &RemoteFile) -> Result<Vec<u8>> {
        Ok(self.cache.read(Path::new(&entry.local_path))?)
    }

    /// Register a processing unit for `file`, or fail when the wait for a
    /// previous one timed out.
    pub(crate) fn begin(
        &self,
        status: ProcessingStatus,
        file: &FileDescriptor,
    ) -> Result<ProcessingGuard> {
        let unit = ProcessingUnit::new(status, file.uid.clone(), file.path.clone());
        self.registry.acquire(unit).ok_or_else(|| {
            ProviderError::Network(format!(
                "timed out waiting for another operation on {}",
                file.path
            ))
        })
    }
}

/// Record a server-confirmed state on a cache entry.
pub(crate) fn apply_confirmed(entry: &mut RemoteFile, confirmed: &RemoteMetadata) {
    entry.revision = confirmed.revision.clone();
    if confirmed.uid.is_some() {
        entry.uid = confirmed.uid.clone();
    }
    entry.remote_path = confirmed.path.clone();
    entry.locally_modified = false;
    entry.last_modification_timestamp = confirmed.modified();
    entry.last_remote_modification_timestamp = confirmed.modified();
}

/// A write may replace the remote when the remote has not moved past the
/// state the cached copy is based on.
fn local_not_older(entry: &RemoteFile, meta: &RemoteMetadata) -> bool {
    if entry.revision.is_some() && entry.revision == meta.revision {
        return true;
    }
    match (entry.last_modification_timestamp, meta.modified()) {
        (Some(local), Some(remote)) => local >= remote,
        (_, None) => true,
        (None, Some(_)) => false,
    }
}
