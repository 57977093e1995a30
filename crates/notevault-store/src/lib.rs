//! # notevault-store
//!
//! Local bookkeeping for remote-backed files.
//!
//! Every remote file that notevault has downloaded or written is mirrored in
//! an app-private cache directory, and its sync history (revision, flags,
//! timestamps) is recorded in a small SQLite table. The crate exposes a
//! synchronous [`Database`] handle with typed CRUD helpers over those
//! records, plus [`CacheDir`] for the cached bytes themselves.

pub mod cache_dir;
pub mod database;
pub mod migrations;
pub mod models;
pub mod remote_files;

mod error;

pub use cache_dir::CacheDir;
pub use database::{Database, SharedDatabase};
pub use error::StoreError;
pub use models::*;
