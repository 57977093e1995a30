//! CRUD operations for [`RemoteFile`] records.

use notevault_shared::FsAuthority;
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::RemoteFile;

const COLUMNS: &str = "id, fs_authority, uid, local_path, remote_path, revision,
    is_locally_modified, is_uploaded, is_upload_failed, is_uploading, is_downloading,
    retry_count, last_retry_timestamp, last_modification_timestamp,
    last_remote_modification_timestamp, last_download_timestamp";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new record and return its row id.
    pub fn insert_remote_file(&self, file: &RemoteFile) -> Result<i64> {
        self.conn().execute(
            "INSERT INTO remote_files (fs_authority, uid, local_path, remote_path, revision,
                is_locally_modified, is_uploaded, is_upload_failed, is_uploading, is_downloading,
                retry_count, last_retry_timestamp, last_modification_timestamp,
                last_remote_modification_timestamp, last_download_timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                file.fs_authority.key(),
                file.uid,
                file.local_path,
                file.remote_path,
                file.revision,
                file.locally_modified as i32,
                file.uploaded as i32,
                file.upload_failed as i32,
                file.uploading as i32,
                file.downloading as i32,
                file.retry_count,
                file.last_retry_timestamp,
                file.last_modification_timestamp,
                file.last_remote_modification_timestamp,
                file.last_download_timestamp,
            ],
        )?;
        let id = self.conn().last_insert_rowid();
        tracing::debug!(id, remote_path = %file.remote_path, "inserted remote file");
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Overwrite every column of an existing record.
    pub fn update_remote_file(&self, file: &RemoteFile) -> Result<()> {
        let id = file.id.ok_or(StoreError::NotFound)?;
        let affected = self.conn().execute(
            "UPDATE remote_files SET fs_authority = ?2, uid = ?3, local_path = ?4,
                remote_path = ?5, revision = ?6, is_locally_modified = ?7, is_uploaded = ?8,
                is_upload_failed = ?9, is_uploading = ?10, is_downloading = ?11,
                retry_count = ?12, last_retry_timestamp = ?13,
                last_modification_timestamp = ?14, last_remote_modification_timestamp = ?15,
                last_download_timestamp = ?16
             WHERE id = ?1",
            params![
                id,
                file.fs_authority.key(),
                file.uid,
                file.local_path,
                file.remote_path,
                file.revision,
                file.locally_modified as i32,
                file.uploaded as i32,
                file.upload_failed as i32,
                file.uploading as i32,
                file.downloading as i32,
                file.retry_count,
                file.last_retry_timestamp,
                file.last_modification_timestamp,
                file.last_remote_modification_timestamp,
                file.last_download_timestamp,
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_remote_file(&self, id: i64) -> Result<RemoteFile> {
        self.conn()
            .query_row(
                &format!("SELECT {COLUMNS} FROM remote_files WHERE id = ?1"),
                params![id],
                row_to_remote_file,
            )
            .map_err(not_found)
    }

    /// Most recent record for a backend uid.
    pub fn get_remote_file_by_uid(
        &self,
        authority: &FsAuthority,
        uid: &str,
    ) -> Result<Option<RemoteFile>> {
        self.optional_row(
            &format!(
                "SELECT {COLUMNS} FROM remote_files
                 WHERE fs_authority = ?1 AND uid = ?2
                 ORDER BY id DESC LIMIT 1"
            ),
            params![authority.key(), uid],
        )
    }

    /// Most recent record for a remote path.
    pub fn get_remote_file_by_remote_path(
        &self,
        authority: &FsAuthority,
        remote_path: &str,
    ) -> Result<Option<RemoteFile>> {
        self.optional_row(
            &format!(
                "SELECT {COLUMNS} FROM remote_files
                 WHERE fs_authority = ?1 AND remote_path = ?2
                 ORDER BY id DESC LIMIT 1"
            ),
            params![authority.key(), remote_path],
        )
    }

    /// Records whose cached copy has edits not yet confirmed by the remote.
    pub fn list_locally_modified(&self, authority: &FsAuthority) -> Result<Vec<RemoteFile>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {COLUMNS} FROM remote_files
             WHERE fs_authority = ?1 AND is_locally_modified = 1
             ORDER BY id ASC"
        ))?;
        let rows = stmt.query_map(params![authority.key()], row_to_remote_file)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    pub fn list_remote_files(&self) -> Result<Vec<RemoteFile>> {
        let mut stmt = self
            .conn()
            .prepare(&format!("SELECT {COLUMNS} FROM remote_files ORDER BY id ASC"))?;
        let rows = stmt.query_map([], row_to_remote_file)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    // only removes the record, not the cached copy on disk
    pub fn delete_remote_file(&self, id: i64) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM remote_files WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    fn optional_row(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Option<RemoteFile>> {
        match self.conn().query_row(sql, params, row_to_remote_file) {
            Ok(file) => Ok(Some(file)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Sqlite(e)),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn not_found(e: rusqlite::Error) -> StoreError {
    match e {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
        other => StoreError::Sqlite(other),
    }
}

/// Map a `rusqlite::Row` to a [`RemoteFile`].
fn row_to_remote_file(row: &rusqlite::Row<'_>) -> rusqlite::Result<RemoteFile> {
    let authority_key: String = row.get(1)?;
    let fs_authority = FsAuthority::from_key(&authority_key).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            format!("unknown filesystem authority '{authority_key}'").into(),
        )
    })?;

    Ok(RemoteFile {
        id: Some(row.get(0)?),
        fs_authority,
        uid: row.get(2)?,
        local_path: row.get(3)?,
        remote_path: row.get(4)?,
        revision: row.get(5)?,
        locally_modified: row.get::<_, i32>(6)? != 0,
        uploaded: row.get::<_, i32>(7)? != 0,
        upload_failed: row.get::<_, i32>(8)? != 0,
        uploading: row.get::<_, i32>(9)? != 0,
        downloading: row.get::<_, i32>(10)? != 0,
        retry_count: row.get(11)?,
        last_retry_timestamp: row.get(12)?,
        last_modification_timestamp: row.get(13)?,
        last_remote_modification_timestamp: row.get(14)?,
        last_download_timestamp: row.get(15)?,
    })
}

#[cfg(test)]
mod tests {
    use notevault_shared::FsType;

    use super::*;

    fn authority() -> FsAuthority {
        FsAuthority::new(FsType::Folder, Some("alice".into()))
    }

    fn sample() -> RemoteFile {
        let mut file = RemoteFile::new(
            authority(),
            Some("uid-1".into()),
            "/cache/3f2a",
            "/vaults/personal.nvdb",
        );
        file.revision = Some("rev-7".into());
        file.locally_modified = true;
        file.upload_failed = true;
        file.retry_count = 2;
        file.last_retry_timestamp = Some(1_700);
        file.last_modification_timestamp = Some(2_000);
        file.last_remote_modification_timestamp = Some(1_500);
        file.last_download_timestamp = Some(1_400);
        file
    }

    #[test]
    fn insert_and_read_back_by_uid_and_path() {
        let db = Database::open_in_memory().unwrap();
        let mut file = sample();
        file.id = Some(db.insert_remote_file(&file).unwrap());

        let by_uid = db
            .get_remote_file_by_uid(&authority(), "uid-1")
            .unwrap()
            .expect("present by uid");
        let by_path = db
            .get_remote_file_by_remote_path(&authority(), "/vaults/personal.nvdb")
            .unwrap()
            .expect("present by path");

        assert_eq!(by_uid, file);
        assert_eq!(by_path, file);
        assert_eq!(db.get_remote_file(file.id.unwrap()).unwrap(), file);
    }

    #[test]
    fn lookups_are_scoped_by_authority() {
        let db = Database::open_in_memory().unwrap();
        db.insert_remote_file(&sample()).unwrap();

        let other = FsAuthority::new(FsType::Folder, Some("bob".into()));
        assert!(db.get_remote_file_by_uid(&other, "uid-1").unwrap().is_none());
        assert!(db.list_locally_modified(&other).unwrap().is_empty());
    }

    #[test]
    fn update_overwrites_fields() {
        let db = Database::open_in_memory().unwrap();
        let mut file = sample();
        file.id = Some(db.insert_remote_file(&file).unwrap());

        file.locally_modified = false;
        file.uploaded = true;
        file.reset_retries();
        file.revision = Some("rev-8".into());
        db.update_remote_file(&file).unwrap();

        let stored = db.get_remote_file(file.id.unwrap()).unwrap();
        assert_eq!(stored, file);
        assert_eq!(stored.retry_count, 0);
        assert!(!stored.upload_failed);
    }

    #[test]
    fn update_without_id_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.update_remote_file(&sample()),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn list_locally_modified_filters() {
        let db = Database::open_in_memory().unwrap();
        db.insert_remote_file(&sample()).unwrap();

        let mut clean = sample();
        clean.uid = Some("uid-2".into());
        clean.remote_path = "/vaults/work.nvdb".into();
        clean.locally_modified = false;
        db.insert_remote_file(&clean).unwrap();

        let modified = db.list_locally_modified(&authority()).unwrap();
        assert_eq!(modified.len(), 1);
        assert_eq!(modified[0].uid.as_deref(), Some("uid-1"));
        assert_eq!(db.list_remote_files().unwrap().len(), 2);
    }

    #[test]
    fn remote_path_is_unique_per_authority() {
        let db = Database::open_in_memory().unwrap();
        db.insert_remote_file(&sample()).unwrap();

        let mut duplicate = sample();
        duplicate.uid = Some("uid-2".into());
        assert!(db.insert_remote_file(&duplicate).is_err());

        let mut elsewhere = sample();
        elsewhere.fs_authority = FsAuthority::new(FsType::Folder, Some("bob".into()));
        db.insert_remote_file(&elsewhere).unwrap();
    }

    #[test]
    fn missing_row_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(db.get_remote_file(99), Err(StoreError::NotFound)));
        assert!(!db.delete_remote_file(99).unwrap());
    }
}
