//! Where document bytes come from and go to.

use notevault_remote::{FileOptions, RemoteFileProvider};
use notevault_shared::{FileDescriptor, Outcome};

use crate::error::Result;

/// What a store allows the document on top of it to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreCapabilities {
    pub writable: bool,
    pub postponed_sync_enabled: bool,
}

/// Byte-level persistence for a whole document.
///
/// A deferred outcome marks bytes served from, or kept only in, a local
/// cache instead of the remote source of truth.
pub trait DocumentStore: Send + Sync {
    fn capabilities(&self) -> StoreCapabilities;

    fn load(&self, file: &FileDescriptor) -> Result<Outcome<Vec<u8>>>;

    /// Replace the stored document. With `postponed`, the bytes may stay in
    /// the local cache until the next explicit sync.
    fn save(&self, file: &FileDescriptor, data: &[u8], postponed: bool) -> Result<Outcome<()>>;

    /// Whether local edits of `file` are waiting to reach the remote.
    fn has_pending_changes(&self, file: &FileDescriptor) -> Result<bool>;
}

impl DocumentStore for RemoteFileProvider {
    fn capabilities(&self) -> StoreCapabilities {
        let config = self.config();
        StoreCapabilities {
            writable: config.write_enabled,
            postponed_sync_enabled: config.postponed_sync_enabled,
        }
    }

    fn load(&self, file: &FileDescriptor) -> Result<Outcome<Vec<u8>>> {
        Ok(self.open_file_for_read(file, FileOptions::default())?)
    }

    fn save(&self, file: &FileDescriptor, data: &[u8], postponed: bool) -> Result<Outcome<()>> {
        let options = FileOptions {
            postponed,
            ..FileOptions::default()
        };
        let mut write = self.open_file_for_write(file, options)?;
        write.write_all(data);
        Ok(write.finish()?.map(|_| ()))
    }

    fn has_pending_changes(&self, file: &FileDescriptor) -> Result<bool> {
        Ok(self
            .cached_entry(file)?
            .map_or(false, |entry| entry.locally_modified))
    }
}
