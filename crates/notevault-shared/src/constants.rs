/// Application name
pub const APP_NAME: &str = "notevault";

/// Magic bytes at the start of every encrypted document
pub const DOCUMENT_MAGIC: &[u8; 4] = b"NVDB";

/// Current document container version
pub const DOCUMENT_VERSION: u8 = 1;

/// Per-document salt size in bytes
pub const SALT_SIZE: usize = 16;

/// XChaCha20-Poly1305 nonce size in bytes
pub const NONCE_SIZE: usize = 24;

/// Poly1305 authentication tag size in bytes
pub const TAG_SIZE: usize = 16;

/// Symmetric key size in bytes (for XChaCha20-Poly1305)
pub const SYMMETRIC_KEY_SIZE: usize = 32;

/// Application-wide Argon2id salt for password keys
pub const KDF_SALT_DOCUMENT_KEY: &[u8; SALT_SIZE] = b"notevault-doc-v1";

/// Argon2id memory cost in KiB (16 MiB)
pub const ARGON2_M_COST_KIB: u32 = 16384;

/// Argon2id iterations
pub const ARGON2_T_COST: u32 = 2;

/// Argon2id lanes
pub const ARGON2_P_COST: u32 = 2;

/// How long a caller waits on an in-flight network operation before giving up
pub const PROCESSING_WAIT_TIMEOUT_SECS: u64 = 30;

/// Root path of a remote filesystem
pub const REMOTE_ROOT: &str = "/";
