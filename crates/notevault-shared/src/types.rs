use serde::{Deserialize, Serialize};

/// Kind of storage backend a file lives on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FsType {
    /// Plain local file, never cached.
    Local,
    /// Directory-backed remote (shared folder, mounted drive).
    Folder,
    /// Any network backend reached through a `RemoteApiClient`.
    Remote,
}

impl FsType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FsType::Local => "local",
            FsType::Folder => "folder",
            FsType::Remote => "remote",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "local" => Some(FsType::Local),
            "folder" => Some(FsType::Folder),
            "remote" => Some(FsType::Remote),
            _ => None,
        }
    }

    pub fn is_remote(&self) -> bool {
        !matches!(self, FsType::Local)
    }
}

/// Scope identifying which backend and account a file belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct FsAuthority {
    pub fs_type: FsType,
    pub user: Option<String>,
}

impl FsAuthority {
    pub fn new(fs_type: FsType, user: Option<String>) -> Self {
        Self { fs_type, user }
    }

    /// Stable key persisted next to cached files, e.g. `folder:alice`.
    pub fn key(&self) -> String {
        match &self.user {
            Some(user) => format!("{}:{}", self.fs_type.as_str(), user),
            None => self.fs_type.as_str().to_string(),
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        let (kind, user) = match key.split_once(':') {
            Some((kind, user)) => (kind, Some(user.to_string())),
            None => (key, None),
        };
        FsType::parse(kind).map(|fs_type| Self { fs_type, user })
    }
}

impl std::fmt::Display for FsAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// A file (or directory) as seen by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileDescriptor {
    pub fs_authority: FsAuthority,
    /// Remote path, `/`-separated.
    pub path: String,
    /// Backend identifier if the backend assigns one.
    pub uid: Option<String>,
    pub name: String,
    pub is_directory: bool,
    /// Last modification in epoch milliseconds.
    pub modified: Option<i64>,
}

impl FileDescriptor {
    /// Remote paths are absolute; a missing leading `/` is added.
    pub fn new(fs_authority: FsAuthority, path: impl Into<String>) -> Self {
        let mut path = path.into();
        if fs_authority.fs_type.is_remote() && !path.starts_with('/') {
            path.insert(0, '/');
        }
        let name = file_name(&path).to_string();
        Self {
            fs_authority,
            path,
            uid: None,
            name,
            is_directory: false,
            modified: None,
        }
    }

    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    pub fn directory(mut self) -> Self {
        self.is_directory = true;
        self
    }

    /// Key used to serialize operations on this file: the uid when known,
    /// the remote path otherwise.
    pub fn resource_key(&self) -> &str {
        self.uid.as_deref().unwrap_or(&self.path)
    }
}

/// Last path segment of a `/`-separated path.
pub fn file_name(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or("")
}

/// Join a parent directory path and a child name.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
