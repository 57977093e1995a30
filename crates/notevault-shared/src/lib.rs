//! # notevault-shared
//!
//! Types and primitives shared by every notevault crate: the document
//! cipher, filesystem descriptors, and the deferred-result wrapper that the
//! storage and document layers hand back to their callers.

pub mod constants;
pub mod crypto;
pub mod error;
pub mod outcome;
pub mod types;

pub use crypto::DocumentKey;
pub use error::CryptoError;
pub use outcome::Outcome;
pub use types::{FileDescriptor, FsAuthority, FsType};
