//! Explicit synchronization of cached files with the remote.

use std::collections::HashMap;
use std::sync::mpsc::{channel, Receiver, Sender};

use notevault_shared::types::file_name;
use notevault_shared::FileDescriptor;
use notevault_store::RemoteFile;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::RemoteMetadata;
use crate::error::{ProviderError, Result};
use crate::provider::RemoteFileProvider;
use crate::resolver::{resolve, SyncResolution, SyncStrategy};

/// Where a file stands relative to its remote copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStatus {
    NoChanges,
    LocalChanges,
    RemoteChanges,
    LocalChangesNoNetwork,
    NoNetwork,
    AuthError,
    Conflict,
    Error,
}

/// Per-file activity, for observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SyncProgress {
    #[default]
    Idle,
    Syncing,
    Uploading,
    Downloading,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// [`FileDescriptor::resource_key`] of the file.
    pub resource: String,
    pub progress: SyncProgress,
}

/// Caller's choice for a file both sides changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictResolution {
    ForceLocal,
    ForceRemote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncAction {
    Upload,
    Download,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub resolution: SyncResolution,
    pub action: SyncAction,
    /// Cache entry after the transfer.
    pub entry: RemoteFile,
}

/// Result of syncing every locally modified file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub uploaded: Vec<String>,
    pub downloaded: Vec<String>,
    pub conflicts: Vec<String>,
    /// Files left for later because the remote was unreachable.
    pub offline: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty() && self.offline.is_empty() && self.failed.is_empty()
    }
}

pub struct SyncProcessor {
    provider: RemoteFileProvider,
    progress: Mutex<HashMap<String, SyncProgress>>,
    subscribers: Mutex<Vec<Sender<ProgressEvent>>>,
}

impl SyncProcessor {
    pub fn new(provider: RemoteFileProvider) -> Self {
        Self {
            provider,
            progress: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn provider(&self) -> &RemoteFileProvider {
        &self.provider
    }

    /// Receive every progress transition from now on.
    pub fn subscribe(&self) -> Receiver<ProgressEvent> {
        let (tx, rx) = channel();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn progress(&self, file: &FileDescriptor) -> SyncProgress {
        self.progress
            .lock()
            .get(file.resource_key())
            .copied()
            .unwrap_or_default()
    }

    /// Compare the cache entry of `file` with live remote metadata.
    ///
    /// Never fails: problems reaching the remote are reported as statuses.
    pub fn sync_status(&self, file: &FileDescriptor, strategy: SyncStrategy) -> SyncStatus {
        let cached = match self.provider.cached_entry(file) {
            Ok(cached) => cached,
            Err(e) => {
                warn!(path = %file.path, error = %e, "cache lookup failed");
                return SyncStatus::Error;
            }
        };

        match self.provider.fetch_metadata(file) {
            Err(ProviderError::Network(_)) => match cached {
                Some(entry) if entry.locally_modified => SyncStatus::LocalChangesNoNetwork,
                _ => SyncStatus::NoNetwork,
            },
            Err(ProviderError::Auth) => SyncStatus::AuthError,
            Err(ProviderError::NotFound(_)) if cached.is_some() => SyncStatus::LocalChanges,
            Err(e) => {
                warn!(path = %file.path, error = %e, "remote metadata lookup failed");
                SyncStatus::Error
            }
            Ok(meta) => match cached {
                None => SyncStatus::RemoteChanges,
                Some(entry) => match classify(strategy, &entry, &meta) {
                    SyncResolution::Equal => SyncStatus::NoChanges,
                    SyncResolution::Local => SyncStatus::LocalChanges,
                    SyncResolution::Remote => SyncStatus::RemoteChanges,
                    SyncResolution::Conflict => SyncStatus::Conflict,
                },
            },
        }
    }

    /// Bring `file` and its remote copy in line.
    ///
    /// A conflict is settled by `conflict` when given and reported as
    /// [`ProviderError::VersionConflict`] otherwise.
    pub fn process(
        &self,
        file: &FileDescriptor,
        strategy: SyncStrategy,
        conflict: Option<ConflictResolution>,
    ) -> Result<SyncOutcome> {
        self.set_progress(file, SyncProgress::Syncing);
        let result = self.run(file, strategy, conflict);
        self.set_progress(file, SyncProgress::Idle);

        match &result {
            Ok(outcome) => info!(
                path = %file.path,
                resolution = ?outcome.resolution,
                action = ?outcome.action,
                "file synchronized"
            ),
            Err(e) => warn!(path = %file.path, error = %e, "sync failed"),
        }
        result
    }

    fn run(
        &self,
        file: &FileDescriptor,
        strategy: SyncStrategy,
        conflict: Option<ConflictResolution>,
    ) -> Result<SyncOutcome> {
        let cached = self.provider.cached_entry(file)?;
        let meta = match self.provider.fetch_metadata(file) {
            Ok(meta) => Some(meta),
            Err(ProviderError::NotFound(_)) if cached.is_some() => None,
            Err(e) => return Err(e),
        };

        let resolution = match (&cached, &meta) {
            (Some(entry), Some(meta)) => classify(strategy, entry, meta),
            (Some(_), None) => SyncResolution::Local,
            (None, _) => SyncResolution::Remote,
        };
        debug!(path = %file.path, ?resolution, "resolved sync direction");

        let action = match resolution {
            SyncResolution::Local => SyncAction::Upload,
            SyncResolution::Remote | SyncResolution::Equal => SyncAction::Download,
            SyncResolution::Conflict => match conflict {
                Some(ConflictResolution::ForceLocal) => SyncAction::Upload,
                Some(ConflictResolution::ForceRemote) => SyncAction::Download,
                None => return Err(ProviderError::VersionConflict(file.path.clone())),
            },
        };

        let entry = match action {
            SyncAction::Upload => {
                self.set_progress(file, SyncProgress::Uploading);
                self.provider.upload(file)?
            }
            SyncAction::Download => {
                self.set_progress(file, SyncProgress::Downloading);
                self.provider.download(file)?
            }
        };

        Ok(SyncOutcome {
            resolution,
            action,
            entry,
        })
    }

    /// Sync every cache entry that carries unsynced local edits.
    pub fn sync_all(&self, strategy: SyncStrategy) -> Result<SyncReport> {
        let pending = self.provider.locally_modified()?;
        info!(count = pending.len(), "syncing locally modified files");

        let mut report = SyncReport::default();
        for entry in pending {
            let file = descriptor_for(&entry);
            match self.process(&file, strategy, None) {
                Ok(outcome) => match outcome.action {
                    SyncAction::Upload => report.uploaded.push(file.path),
                    SyncAction::Download => report.downloaded.push(file.path),
                },
                Err(ProviderError::VersionConflict(_)) => report.conflicts.push(file.path),
                Err(e) if e.is_network() => report.offline.push(file.path),
                Err(e) => report.failed.push((file.path, e.to_string())),
            }
        }
        Ok(report)
    }

    /// Record a progress change and tell subscribers, skipping repeats.
    fn set_progress(&self, file: &FileDescriptor, progress: SyncProgress) {
        let key = file.resource_key().to_string();
        {
            let mut states = self.progress.lock();
            let previous = states.get(&key).copied().unwrap_or_default();
            if previous == progress {
                return;
            }
            if progress == SyncProgress::Idle {
                states.remove(&key);
            } else {
                states.insert(key.clone(), progress);
            }
        }

        let event = ProgressEvent {
            resource: key,
            progress,
        };
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Run the resolver over a cache entry and live metadata.
///
/// A side counts as changed only when its content actually differs from
/// the last confirmed state: the local side through the locally-modified
/// flag, the remote side through its revision.
fn classify(strategy: SyncStrategy, entry: &RemoteFile, meta: &RemoteMetadata) -> SyncResolution {
    let base = entry.last_remote_modification_timestamp;
    let local = if entry.locally_modified {
        entry.last_modification_timestamp
    } else {
        base
    };
    let remote = if entry.revision.is_some() && entry.revision == meta.revision {
        base
    } else {
        meta.modified()
    };

    match resolve(local, base, remote, strategy) {
        // Content changed while the clock did not move.
        SyncResolution::Equal if entry.locally_modified && remote == base => SyncResolution::Local,
        SyncResolution::Equal if entry.revision != meta.revision && !entry.locally_modified => {
            SyncResolution::Remote
        }
        resolution => resolution,
    }
}

fn descriptor_for(entry: &RemoteFile) -> FileDescriptor {
    FileDescriptor {
        fs_authority: entry.fs_authority.clone(),
        path: entry.remote_path.clone(),
        uid: entry.uid.clone(),
        name: file_name(&entry.remote_path).to_string(),
        is_directory: false,
        modified: entry.last_modification_timestamp,
    }
}
