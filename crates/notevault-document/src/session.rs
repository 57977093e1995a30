//! Wires a remote backend, the cache and the document engine together.

use std::sync::Arc;

use notevault_remote::{
    ConflictResolution, ProcessingRegistry, ProviderConfig, RemoteApiClient, RemoteFileProvider,
    SyncOutcome, SyncProcessor, SyncReport, SyncStatus, SyncStrategy,
};
use notevault_shared::{DocumentKey, FileDescriptor, Outcome};
use notevault_store::{CacheDir, SharedDatabase};
use tracing::info;

use crate::database::EncryptedDatabase;
use crate::error::Result;

/// Everything needed to open documents on one remote account.
pub struct VaultSession {
    provider: RemoteFileProvider,
    sync: SyncProcessor,
}

impl VaultSession {
    pub fn new(
        api: Arc<dyn RemoteApiClient>,
        db: SharedDatabase,
        cache: CacheDir,
        config: ProviderConfig,
    ) -> Self {
        let registry = Arc::new(ProcessingRegistry::new());
        Self::with_provider(RemoteFileProvider::new(api, db, cache, registry, config))
    }

    pub fn with_provider(provider: RemoteFileProvider) -> Self {
        info!(authority = %provider.authority(), config = ?provider.config(), "vault session ready");
        Self {
            sync: SyncProcessor::new(provider.clone()),
            provider,
        }
    }

    pub fn provider(&self) -> &RemoteFileProvider {
        &self.provider
    }

    pub fn sync_processor(&self) -> &SyncProcessor {
        &self.sync
    }

    /// Descriptor for a document at `path` on this session's remote.
    pub fn file(&self, path: &str) -> FileDescriptor {
        FileDescriptor::new(self.provider.authority().clone(), path)
    }

    pub fn open(&self, path: &str, key: DocumentKey) -> Result<Outcome<EncryptedDatabase>> {
        EncryptedDatabase::load(self.store(), self.file(path), key)
    }

    pub fn create(&self, path: &str, key: DocumentKey) -> Result<Outcome<EncryptedDatabase>> {
        EncryptedDatabase::create_new(self.store(), self.file(path), key)
    }

    pub fn sync_status(&self, path: &str, strategy: SyncStrategy) -> SyncStatus {
        self.sync.sync_status(&self.file(path), strategy)
    }

    pub fn sync(
        &self,
        path: &str,
        strategy: SyncStrategy,
        conflict: Option<ConflictResolution>,
    ) -> Result<SyncOutcome> {
        Ok(self.sync.process(&self.file(path), strategy, conflict)?)
    }

    pub fn sync_all(&self, strategy: SyncStrategy) -> Result<SyncReport> {
        Ok(self.sync.sync_all(strategy)?)
    }

    fn store(&self) -> Arc<RemoteFileProvider> {
        Arc::new(self.provider.clone())
    }
}
