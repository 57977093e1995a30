use std::path::Path;

use notevault_shared::types::now_millis;
use notevault_shared::{FileDescriptor, Outcome};
use notevault_store::RemoteFile;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ProviderError, RemoteError, Result};
use crate::processing::ProcessingStatus;
use crate::provider::{apply_confirmed, RemoteFileProvider};

/// How a finished write was persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteOutcome {
    /// Stored in the cache and confirmed by the remote.
    Uploaded,
    /// The remote was unreachable; the bytes wait in the cache for sync.
    OfflineWriteFinished,
    /// The caller asked to keep the bytes local.
    CachedOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WriteMode {
    LocalOnly,
    Offline,
    Upload { remote_path: String },
}

/// Bytes on their way to a remote file.
///
/// Content accumulates in memory; [`finish`](Self::finish) persists it to
/// the cache and, depending on how the write was opened, uploads it.
/// Dropping a pending write without finishing it discards the content.
pub struct PendingWrite {
    provider: RemoteFileProvider,
    file: FileDescriptor,
    entry: RemoteFile,
    mode: WriteMode,
    buffer: Vec<u8>,
}

impl PendingWrite {
    pub(crate) fn new(
        provider: RemoteFileProvider,
        file: FileDescriptor,
        entry: RemoteFile,
        mode: WriteMode,
    ) -> Self {
        Self {
            provider,
            file,
            entry,
            mode,
            buffer: Vec::new(),
        }
    }

    pub fn write_all(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    pub fn file(&self) -> &FileDescriptor {
        &self.file
    }

    /// Whether finishing will try the network.
    pub fn will_upload(&self) -> bool {
        matches!(self.mode, WriteMode::Upload { .. })
    }

    pub fn finish(self) -> Result<Outcome<WriteOutcome>> {
        let PendingWrite {
            provider,
            file,
            mut entry,
            mode,
            buffer,
        } = self;

        let local = entry.local_path.clone();
        provider.cache_dir().write(Path::new(&local), &buffer)?;

        match mode {
            WriteMode::LocalOnly => {
                keep_local(&provider, &mut entry)?;
                debug!(path = %file.path, size = buffer.len(), "write kept in cache");
                Ok(Outcome::deferred(WriteOutcome::CachedOnly))
            }
            WriteMode::Offline => {
                keep_local(&provider, &mut entry)?;
                info!(path = %file.path, size = buffer.len(), "offline write finished");
                Ok(Outcome::deferred(WriteOutcome::OfflineWriteFinished))
            }
            WriteMode::Upload { remote_path } => {
                let result = upload(&provider, &file, &mut entry, &remote_path);
                if !provider.config().cache_enabled {
                    provider.cache_dir().remove(Path::new(&local))?;
                }
                result
            }
        }
    }
}

fn keep_local(provider: &RemoteFileProvider, entry: &mut RemoteFile) -> Result<()> {
    entry.locally_modified = true;
    entry.uploaded = false;
    entry.last_modification_timestamp = Some(now_millis());
    provider.save_entry(entry)
}

fn upload(
    provider: &RemoteFileProvider,
    file: &FileDescriptor,
    entry: &mut RemoteFile,
    remote_path: &str,
) -> Result<Outcome<WriteOutcome>> {
    let cache_enabled = provider.config().cache_enabled;

    let _guard = match provider.begin(ProcessingStatus::Uploading, file) {
        Ok(guard) => guard,
        Err(e) if cache_enabled => {
            warn!(path = %file.path, error = %e, "upload slot unavailable, keeping write offline");
            keep_local(provider, entry)?;
            return Ok(Outcome::deferred(WriteOutcome::OfflineWriteFinished));
        }
        Err(e) => return Err(e),
    };

    entry.uploading = true;
    provider.save_entry(entry)?;
    let result = provider
        .api()
        .upload_file(remote_path, Path::new(&entry.local_path));
    entry.uploading = false;

    match result {
        Ok(confirmed) => {
            apply_confirmed(entry, &confirmed);
            entry.uploaded = true;
            entry.reset_retries();
            provider.save_entry(entry)?;
            info!(path = %confirmed.path, revision = ?confirmed.revision, "write uploaded");
            Ok(Outcome::fresh(WriteOutcome::Uploaded))
        }
        Err(RemoteError::Network(reason)) if cache_enabled => {
            warn!(path = %remote_path, %reason, "upload failed, keeping write offline");
            keep_local(provider, entry)?;
            Ok(Outcome::deferred(WriteOutcome::OfflineWriteFinished))
        }
        Err(e) => {
            warn!(path = %remote_path, error = %e, "upload rejected");
            if !matches!(e, RemoteError::Network(_)) {
                entry.upload_failed = true;
            }
            entry.record_retry(now_millis());
            keep_local(provider, entry)?;
            Err(ProviderError::from(e))
        }
    }
}
