//! Records persisted in the cache database.

use notevault_shared::FsAuthority;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RemoteFile
// ---------------------------------------------------------------------------

/// Local mirror of one remote-backed file and its sync history.
///
/// Rows are never removed implicitly; they accumulate as an audit trail of
/// what was downloaded and uploaded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteFile {
    /// Synthetic row id, `None` until inserted.
    pub id: Option<i64>,
    /// Backend and account the file belongs to.
    pub fs_authority: FsAuthority,
    /// Backend file id, when the backend assigns one.
    pub uid: Option<String>,
    /// Absolute path of the cached copy.
    pub local_path: String,
    /// Path of the file on the remote.
    pub remote_path: String,
    /// Opaque content revision reported by the backend.
    pub revision: Option<String>,
    /// The cached copy carries edits that were never uploaded.
    pub locally_modified: bool,
    /// The cached copy matches what was last uploaded.
    pub uploaded: bool,
    /// The last upload attempt was rejected by the backend.
    pub upload_failed: bool,
    pub uploading: bool,
    pub downloading: bool,
    pub retry_count: i64,
    pub last_retry_timestamp: Option<i64>,
    /// Latest known modification of the content, local or remote (epoch millis).
    pub last_modification_timestamp: Option<i64>,
    /// Latest modification confirmed against the server (epoch millis).
    pub last_remote_modification_timestamp: Option<i64>,
    pub last_download_timestamp: Option<i64>,
}

impl RemoteFile {
    /// A fresh, not yet inserted record.
    pub fn new(
        fs_authority: FsAuthority,
        uid: Option<String>,
        local_path: impl Into<String>,
        remote_path: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            fs_authority,
            uid,
            local_path: local_path.into(),
            remote_path: remote_path.into(),
            revision: None,
            locally_modified: false,
            uploaded: false,
            upload_failed: false,
            uploading: false,
            downloading: false,
            retry_count: 0,
            last_retry_timestamp: None,
            last_modification_timestamp: None,
            last_remote_modification_timestamp: None,
            last_download_timestamp: None,
        }
    }

    /// Clear retry bookkeeping after a successful transfer.
    pub fn reset_retries(&mut self) {
        self.retry_count = 0;
        self.last_retry_timestamp = None;
        self.upload_failed = false;
    }

    /// Record a failed transfer attempt.
    pub fn record_retry(&mut self, now: i64) {
        self.retry_count += 1;
        self.last_retry_timestamp = Some(now);
    }
}
