//! # notevault-document
//!
//! The encrypted document engine. A document is a tree of groups holding
//! notes, kept in memory as an arena and written back as one encrypted
//! blob on every change. [`EncryptedDatabase`] owns the tree and its key;
//! [`VaultSession`] opens documents through the cache-aware remote
//! provider.

pub mod database;
pub mod error;
pub mod groups;
pub mod model;
pub mod notes;
pub mod session;
pub mod storage;
pub mod template;
pub mod watcher;

mod format;
mod tree;

pub use database::{DatabaseStatus, EncryptedDatabase};
pub use error::{DbError, Result};
pub use model::{Group, Note, Property, PropertyKind};
pub use session::VaultSession;
pub use storage::{DocumentStore, StoreCapabilities};
pub use watcher::{ContentEvent, ContentWatcher, GroupEvent, NoteEvent, Watchers};
