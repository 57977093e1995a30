use rusqlite::Connection;

const UP_SQL: &str = r#"
-- Transfer state and retry bookkeeping
ALTER TABLE remote_files ADD COLUMN is_upload_failed INTEGER NOT NULL DEFAULT 0;
ALTER TABLE remote_files ADD COLUMN is_uploading INTEGER NOT NULL DEFAULT 0;
ALTER TABLE remote_files ADD COLUMN is_downloading INTEGER NOT NULL DEFAULT 0;
ALTER TABLE remote_files ADD COLUMN retry_count INTEGER NOT NULL DEFAULT 0;
ALTER TABLE remote_files ADD COLUMN last_retry_timestamp INTEGER;
ALTER TABLE remote_files ADD COLUMN last_download_timestamp INTEGER;

CREATE INDEX IF NOT EXISTS idx_remote_files_modified
    ON remote_files(fs_authority, is_locally_modified);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
