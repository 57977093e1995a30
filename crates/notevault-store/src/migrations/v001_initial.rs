//! v001 -- Initial schema creation.
//!
//! Creates the `remote_files` table holding one row per cached remote file.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS remote_files (
    id                                 INTEGER PRIMARY KEY AUTOINCREMENT,
    fs_authority                       TEXT NOT NULL,             -- e.g. "folder:alice"
    uid                                TEXT,                      -- backend file id, if any
    local_path                         TEXT NOT NULL,             -- cached copy on disk
    remote_path                        TEXT NOT NULL,
    revision                           TEXT,                      -- opaque backend revision
    is_locally_modified                INTEGER NOT NULL DEFAULT 0,
    is_uploaded                        INTEGER NOT NULL DEFAULT 0,
    last_modification_timestamp        INTEGER,                   -- epoch millis
    last_remote_modification_timestamp INTEGER                    -- epoch millis, server-confirmed
);

CREATE INDEX IF NOT EXISTS idx_remote_files_uid
    ON remote_files(fs_authority, uid);

CREATE INDEX IF NOT EXISTS idx_remote_files_remote_path
    ON remote_files(fs_authority, remote_path);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
