// Remote storage plumbing: backend capability, cache-aware file provider,
// single-flight coordination and synchronization.

pub mod api;
pub mod error;
pub mod folder;
pub mod processing;
pub mod provider;
pub mod resolver;
pub mod sync;
pub mod write;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use api::{RemoteApiClient, RemoteMetadata};
pub use error::{ProviderError, RemoteError};
pub use folder::FolderApiClient;
pub use processing::{ProcessingGuard, ProcessingRegistry, ProcessingStatus, ProcessingUnit};
pub use provider::{ConflictStrategy, FileOptions, OpenMode, ProviderConfig, RemoteFileProvider};
pub use resolver::{resolve, SyncResolution, SyncStrategy};
pub use sync::{
    ConflictResolution, ProgressEvent, SyncAction, SyncOutcome, SyncProcessor, SyncProgress,
    SyncReport, SyncStatus,
};
pub use write::{PendingWrite, WriteOutcome};
