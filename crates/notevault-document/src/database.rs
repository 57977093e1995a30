//! The open document: tree, key and the lock that serializes both.
//!
//! Every read, mutation and commit of an [`EncryptedDatabase`] runs under
//! one mutex. Operations that commit internally do so through helpers that
//! take the already-locked state, so a mutation and its commit are a single
//! critical section.

use std::io::Read;
use std::sync::Arc;

use notevault_shared::{DocumentKey, FileDescriptor, Outcome};
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{DbError, Result};
use crate::format;
use crate::storage::{DocumentStore, StoreCapabilities};
use crate::template;
use crate::tree::Tree;
use crate::watcher::Watchers;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatabaseStatus {
    /// Read-write and confirmed by the remote.
    Normal,
    /// Opened on a store that does not accept writes; lasts for the session.
    ReadOnly,
    /// Serving or holding local data because the remote was unreachable.
    Cached,
    /// Changes are queued locally for a later sync.
    PostponedChanges,
}

pub(crate) struct State {
    pub(crate) tree: Tree,
    key: DocumentKey,
    file: FileDescriptor,
    status: DatabaseStatus,
    postpone: bool,
}

impl State {
    pub(crate) fn ensure_writable(&self) -> Result<()> {
        if self.status == DatabaseStatus::ReadOnly {
            return Err(DbError::Unsupported(format!(
                "{} is open read-only",
                self.file.path
            )));
        }
        Ok(())
    }
}

pub struct EncryptedDatabase {
    state: Mutex<Option<State>>,
    store: Arc<dyn DocumentStore>,
    watchers: Watchers,
}

impl EncryptedDatabase {
    /// Parse `bytes` under `key`.
    pub fn open(
        store: Arc<dyn DocumentStore>,
        file: FileDescriptor,
        key: DocumentKey,
        bytes: &[u8],
    ) -> Result<Self> {
        let tree = format::decode(bytes, &key)?;
        Ok(Self::assemble(store, file, key, tree))
    }

    /// [`open`](Self::open) reading the document from a stream.
    pub fn open_reader(
        store: Arc<dyn DocumentStore>,
        file: FileDescriptor,
        key: DocumentKey,
        reader: impl Read,
    ) -> Result<Self> {
        let tree = format::read(reader, &key)?;
        Ok(Self::assemble(store, file, key, tree))
    }

    /// Fetch `file` from the store and open it.
    pub fn load(
        store: Arc<dyn DocumentStore>,
        file: FileDescriptor,
        key: DocumentKey,
    ) -> Result<Outcome<Self>> {
        let loaded = store.load(&file)?;
        let deferred = loaded.deferred;
        let pending = store.has_pending_changes(&file)?;
        let capabilities = store.capabilities();
        let db = Self::open(store, file, key, &loaded.value)?;

        if let Some(state) = db.state.lock().as_mut() {
            if state.status != DatabaseStatus::ReadOnly {
                state.status = settled_status(deferred, pending, capabilities);
            }
        }
        if let Ok(status) = db.status() {
            info!(path = %loaded_path(&db), ?status, "document opened");
        }
        Ok(Outcome { value: db, deferred })
    }

    /// Start a new document from the template, save it under the
    /// unencrypted sentinel and then switch it to `key`.
    pub fn create_new(
        store: Arc<dyn DocumentStore>,
        file: FileDescriptor,
        key: DocumentKey,
    ) -> Result<Outcome<Self>> {
        if !store.capabilities().writable {
            return Err(DbError::Unsupported(format!(
                "cannot create {} on a read-only store",
                file.path
            )));
        }

        let tree = template::seed(&file.name);
        let db = Self::assemble(store, file, DocumentKey::unencrypted_default(), tree);

        let created = db.commit()?;
        let rekeyed = db.change_key(&DocumentKey::unencrypted_default(), &key)?;
        info!(path = %loaded_path(&db), "document created");

        Ok(Outcome {
            value: db,
            deferred: created.deferred || rekeyed.deferred,
        })
    }

    fn assemble(
        store: Arc<dyn DocumentStore>,
        file: FileDescriptor,
        key: DocumentKey,
        tree: Tree,
    ) -> Self {
        let status = if store.capabilities().writable {
            DatabaseStatus::Normal
        } else {
            DatabaseStatus::ReadOnly
        };
        Self {
            state: Mutex::new(Some(State {
                tree,
                key,
                file,
                status,
                postpone: false,
            })),
            store,
            watchers: Watchers::default(),
        }
    }

    /// Drop the tree and key. Every later call fails with `NotFound`.
    pub fn close(&self) {
        if let Some(state) = self.state.lock().take() {
            debug!(path = %state.file.path, "document closed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().is_some()
    }

    pub fn status(&self) -> Result<DatabaseStatus> {
        Ok(self.lock_open()?.status)
    }

    pub fn file(&self) -> Result<FileDescriptor> {
        Ok(self.lock_open()?.file.clone())
    }

    pub fn watchers(&self) -> &Watchers {
        &self.watchers
    }

    /// Keep future commits in the local cache until an explicit sync.
    pub fn set_postpone_changes(&self, postpone: bool) -> Result<()> {
        self.lock_open()?.postpone = postpone;
        Ok(())
    }

    /// Rewrite the whole document through the store.
    pub fn commit(&self) -> Result<Outcome<()>> {
        let mut state = self.lock_open()?;
        state.ensure_writable()?;
        self.commit_locked(&mut state)
    }

    /// Re-encrypt under `new_key`. `old_key` must be the current key. A
    /// new document stays under the unencrypted sentinel until its first
    /// key change, so the sentinel only works as `old_key` until then.
    pub fn change_key(&self, old_key: &DocumentKey, new_key: &DocumentKey) -> Result<Outcome<()>> {
        let mut state = self.lock_open()?;
        state.ensure_writable()?;

        if *old_key != state.key {
            warn!(path = %state.file.path, "key change refused: old key does not match");
            return Err(DbError::Auth);
        }

        let previous = std::mem::replace(&mut state.key, new_key.clone());
        match self.commit_locked(&mut state) {
            Ok(outcome) => {
                info!(path = %state.file.path, key = %new_key.fingerprint(), "document key changed");
                Ok(outcome)
            }
            Err(e) => {
                state.key = previous;
                Err(e)
            }
        }
    }

    pub(crate) fn lock_open(&self) -> Result<MappedMutexGuard<'_, State>> {
        MutexGuard::try_map(self.state.lock(), Option::as_mut)
            .map_err(|_| DbError::NotFound("database is closed".into()))
    }

    /// Serialize and save with the lock already held, then settle the
    /// status from how the store took it.
    pub(crate) fn commit_locked(&self, state: &mut State) -> Result<Outcome<()>> {
        let bytes = format::encode(&state.tree, &state.key)?;
        let capabilities = self.store.capabilities();
        let postponed = state.postpone && capabilities.postponed_sync_enabled;

        let outcome = match self.store.save(&state.file, &bytes, postponed) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(path = %state.file.path, error = %e, "commit failed");
                return Err(e);
            }
        };

        state.status = settled_status(outcome.deferred, outcome.deferred, capabilities);
        debug!(path = %state.file.path, size = bytes.len(), status = ?state.status, "committed");
        Ok(outcome)
    }
}

/// Status once the store has answered a load or save. `pending` marks
/// local edits queued for the remote.
fn settled_status(deferred: bool, pending: bool, capabilities: StoreCapabilities) -> DatabaseStatus {
    if pending && capabilities.postponed_sync_enabled {
        DatabaseStatus::PostponedChanges
    } else if deferred || pending {
        DatabaseStatus::Cached
    } else {
        DatabaseStatus::Normal
    }
}

fn loaded_path(db: &EncryptedDatabase) -> String {
    db.file().map(|f| f.path).unwrap_or_default()
}
