//! v003 -- One cache row per remote path.
//!
//! Replaces the plain path index with a unique one so two rows can never
//! claim the same remote file within an authority.

use rusqlite::Connection;

const UP_SQL: &str = r#"
DROP INDEX IF EXISTS idx_remote_files_remote_path;

CREATE UNIQUE INDEX IF NOT EXISTS idx_remote_files_remote_path
    ON remote_files(fs_authority, remote_path);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
