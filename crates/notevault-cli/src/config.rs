//! CLI configuration loaded from environment variables.
//!
//! Every setting has a default so the binary runs with no configuration
//! against a folder remote under the platform data directory.

use std::path::PathBuf;

use notevault_remote::{ProviderConfig, SyncStrategy};

#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Where the cache database and cached file copies live.
    /// Env: `NOTEVAULT_DATA_DIR`
    /// Default: the platform data directory, or `./notevault`.
    pub data_dir: PathBuf,

    /// Directory served by the folder remote.
    /// Env: `NOTEVAULT_REMOTE_DIR`
    /// Default: `<data_dir>/remote`
    pub remote_dir: PathBuf,

    /// Account name recorded in the remote authority.
    /// Env: `NOTEVAULT_REMOTE_USER`
    pub remote_user: Option<String>,

    /// Env: `NOTEVAULT_CACHE`, `NOTEVAULT_WRITE`, `NOTEVAULT_POSTPONED_SYNC`
    /// (true/false). All default to `true`.
    pub provider: ProviderConfig,

    /// Env: `NOTEVAULT_SYNC_STRATEGY` (`last-remote` / `last-modification`)
    /// Default: `last-remote`
    pub sync_strategy: SyncStrategy,
}

impl Default for VaultConfig {
    fn default() -> Self {
        let data_dir = notevault_store::database::default_data_dir()
            .unwrap_or_else(|_| PathBuf::from("./notevault"));
        Self {
            remote_dir: data_dir.join("remote"),
            data_dir,
            remote_user: None,
            provider: ProviderConfig::default(),
            sync_strategy: SyncStrategy::default(),
        }
    }
}

impl VaultConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(dir) = var("NOTEVAULT_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
            config.remote_dir = config.data_dir.join("remote");
        }

        if let Some(dir) = var("NOTEVAULT_REMOTE_DIR") {
            config.remote_dir = PathBuf::from(dir);
        }

        if let Some(user) = var("NOTEVAULT_REMOTE_USER") {
            if !user.is_empty() {
                config.remote_user = Some(user);
            }
        }

        if let Some(val) = var("NOTEVAULT_CACHE") {
            config.provider.cache_enabled = parse_flag("NOTEVAULT_CACHE", &val, true);
        }

        if let Some(val) = var("NOTEVAULT_WRITE") {
            config.provider.write_enabled = parse_flag("NOTEVAULT_WRITE", &val, true);
        }

        if let Some(val) = var("NOTEVAULT_POSTPONED_SYNC") {
            config.provider.postponed_sync_enabled =
                parse_flag("NOTEVAULT_POSTPONED_SYNC", &val, true);
        }

        if let Some(val) = var("NOTEVAULT_SYNC_STRATEGY") {
            match SyncStrategy::parse(val.trim()) {
                Some(strategy) => config.sync_strategy = strategy,
                None => {
                    tracing::warn!(
                        value = %val,
                        "Invalid NOTEVAULT_SYNC_STRATEGY, using default"
                    );
                }
            }
        }

        // RUST_LOG is read by tracing-subscriber's EnvFilter directly.

        config
    }

    pub fn cache_db_path(&self) -> PathBuf {
        self.data_dir.join("cache.db")
    }

    pub fn cache_files_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }
}

fn parse_flag(name: &str, value: &str, default: bool) -> bool {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => {
            tracing::warn!(variable = name, value = %value, "Invalid boolean, using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> VaultConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        VaultConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = load(&[]);
        assert_eq!(config.provider, ProviderConfig::default());
        assert_eq!(config.sync_strategy, SyncStrategy::LastRemoteModificationWins);
        assert_eq!(config.remote_dir, config.data_dir.join("remote"));
        assert!(config.remote_user.is_none());
    }

    #[test]
    fn test_data_dir_moves_remote_dir() {
        let config = load(&[("NOTEVAULT_DATA_DIR", "/tmp/nv")]);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/nv"));
        assert_eq!(config.remote_dir, PathBuf::from("/tmp/nv/remote"));
        assert_eq!(config.cache_db_path(), PathBuf::from("/tmp/nv/cache.db"));

        let config = load(&[
            ("NOTEVAULT_DATA_DIR", "/tmp/nv"),
            ("NOTEVAULT_REMOTE_DIR", "/mnt/share"),
        ]);
        assert_eq!(config.remote_dir, PathBuf::from("/mnt/share"));
    }

    #[test]
    fn test_flags() {
        let config = load(&[
            ("NOTEVAULT_CACHE", "false"),
            ("NOTEVAULT_WRITE", "0"),
            ("NOTEVAULT_POSTPONED_SYNC", "maybe"),
        ]);
        assert!(!config.provider.cache_enabled);
        assert!(!config.provider.write_enabled);
        assert!(config.provider.postponed_sync_enabled);
    }

    #[test]
    fn test_sync_strategy() {
        let config = load(&[("NOTEVAULT_SYNC_STRATEGY", "last-modification")]);
        assert_eq!(config.sync_strategy, SyncStrategy::LastModificationWins);

        let config = load(&[("NOTEVAULT_SYNC_STRATEGY", "coin-flip")]);
        assert_eq!(config.sync_strategy, SyncStrategy::LastRemoteModificationWins);
    }
}
