//! Fault-injecting backend and a ready-made provider for tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use notevault_shared::{FileDescriptor, FsAuthority};
use notevault_store::{CacheDir, Database, SharedDatabase};
use tempfile::TempDir;

use crate::api::{RemoteApiClient, RemoteMetadata};
use crate::error::RemoteError;
use crate::folder::FolderApiClient;
use crate::processing::ProcessingRegistry;
use crate::provider::{ProviderConfig, RemoteFileProvider};

/// Wraps a [`FolderApiClient`] with switches that make calls fail the way a
/// real backend would.
pub struct FlakyApi {
    inner: FolderApiClient,
    network_down: AtomicBool,
    auth_failing: AtomicBool,
    reject_uploads: AtomicBool,
    delay_ms: AtomicU64,
    calls: AtomicUsize,
    downloads: AtomicUsize,
    uploads: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FlakyApi {
    pub fn new(inner: FolderApiClient) -> Self {
        Self {
            inner,
            network_down: AtomicBool::new(false),
            auth_failing: AtomicBool::new(false),
            reject_uploads: AtomicBool::new(false),
            delay_ms: AtomicU64::new(0),
            calls: AtomicUsize::new(0),
            downloads: AtomicUsize::new(0),
            uploads: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn set_network_down(&self, down: bool) {
        self.network_down.store(down, Ordering::SeqCst);
    }

    pub fn set_auth_failing(&self, failing: bool) {
        self.auth_failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_reject_uploads(&self, reject: bool) {
        self.reject_uploads.store(reject, Ordering::SeqCst);
    }

    /// Make every call sleep this long before answering.
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    /// Highest number of calls that were ever running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn call<T>(&self, f: impl FnOnce() -> Result<T, RemoteError>) -> Result<T, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }

        let result = if self.network_down.load(Ordering::SeqCst) {
            Err(RemoteError::Network("connection refused".into()))
        } else if self.auth_failing.load(Ordering::SeqCst) {
            Err(RemoteError::Auth)
        } else {
            f()
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl RemoteApiClient for FlakyApi {
    fn authority(&self) -> &FsAuthority {
        self.inner.authority()
    }

    fn list_files(&self, dir: &FileDescriptor) -> Result<Vec<FileDescriptor>, RemoteError> {
        self.call(|| self.inner.list_files(dir))
    }

    fn get_parent(&self, file: &FileDescriptor) -> Result<FileDescriptor, RemoteError> {
        self.call(|| self.inner.get_parent(file))
    }

    fn get_root(&self) -> Result<FileDescriptor, RemoteError> {
        self.call(|| self.inner.get_root())
    }

    fn get_file_metadata(&self, file: &FileDescriptor) -> Result<RemoteMetadata, RemoteError> {
        self.call(|| self.inner.get_file_metadata(file))
    }

    fn download_file(&self, remote_path: &str, dest: &Path) -> Result<RemoteMetadata, RemoteError> {
        self.call(|| {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            self.inner.download_file(remote_path, dest)
        })
    }

    fn upload_file(&self, remote_path: &str, local: &Path) -> Result<RemoteMetadata, RemoteError> {
        self.call(|| {
            if self.reject_uploads.load(Ordering::SeqCst) {
                return Err(RemoteError::Api("quota exceeded".into()));
            }
            self.uploads.fetch_add(1, Ordering::SeqCst);
            self.inner.upload_file(remote_path, local)
        })
    }
}

/// A provider over a temporary folder remote, cache directory and
/// in-memory cache database.
pub struct TestEnv {
    pub api: Arc<FlakyApi>,
    pub db: SharedDatabase,
    pub provider: RemoteFileProvider,
    remote_root: PathBuf,
    _dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_config(ProviderConfig::default())
    }

    pub fn with_config(config: ProviderConfig) -> Self {
        Self::build(config, ProcessingRegistry::new())
    }

    pub fn with_registry(config: ProviderConfig, registry: ProcessingRegistry) -> Self {
        Self::build(config, registry)
    }

    fn build(config: ProviderConfig, registry: ProcessingRegistry) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let remote_root = dir.path().join("remote");
        let folder = FolderApiClient::new(remote_root.clone(), Some("tester".into()))
            .expect("folder remote");
        let api = Arc::new(FlakyApi::new(folder));
        let db = Database::open_in_memory().expect("cache db").into_shared();
        let cache = CacheDir::new(dir.path().join("cache")).expect("cache dir");

        let provider = RemoteFileProvider::new(
            api.clone(),
            db.clone(),
            cache,
            Arc::new(registry),
            config,
        );

        Self {
            api,
            db,
            provider,
            remote_root,
            _dir: dir,
        }
    }

    /// Put bytes on the remote behind the provider's back.
    pub fn seed_remote(&self, remote_path: &str, data: &[u8]) -> FileDescriptor {
        std::fs::write(self.remote_file(remote_path), data).expect("seed remote");
        FileDescriptor::new(self.api.authority().clone(), remote_path)
    }

    pub fn remote_bytes(&self, remote_path: &str) -> Vec<u8> {
        std::fs::read(self.remote_file(remote_path)).expect("remote file")
    }

    pub fn remote_exists(&self, remote_path: &str) -> bool {
        self.remote_file(remote_path).is_file()
    }

    fn remote_file(&self, remote_path: &str) -> PathBuf {
        self.remote_root.join(remote_path.trim_start_matches('/'))
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
