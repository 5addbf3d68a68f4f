use std::env;
use std::path::PathBuf;

/// Database file name used when only a directory is configured.
pub const DB_FILE_NAME: &str = "campus.db";

/// Subdirectory created under the fallback root when the primary data
/// directory is not writable.
pub const FALLBACK_SUBDIR: &str = "campus";

const DEFAULT_SQLITE_BIN: &str = "sqlite3";

/// Storage configuration. Constructed once at process start and handed to
/// [`Database::new`](crate::Database::new); library code never reads the
/// environment on its own.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Full database path. Bypasses directory + file name composition.
    pub db_path: Option<PathBuf>,
    /// Parent directory for the database file.
    pub db_dir: Option<PathBuf>,
    /// Root for the read-only fallback. Defaults to the platform temp dir.
    pub fallback_root: Option<PathBuf>,
    /// Executable probed and invoked for the external driver.
    pub sqlite_bin: String,
    /// Skip the probe and run in-process. For hosts that disallow spawning.
    pub force_embedded: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            db_dir: None,
            fallback_root: None,
            sqlite_bin: DEFAULT_SQLITE_BIN.to_string(),
            force_embedded: false,
        }
    }
}

impl StoreConfig {
    /// Read the `CAMPUS_*` environment surface.
    pub fn from_env() -> Self {
        Self {
            db_path: env_path("CAMPUS_DB_PATH"),
            db_dir: env_path("CAMPUS_DB_DIR"),
            fallback_root: env_path("CAMPUS_TMP_DIR"),
            sqlite_bin: env_str("CAMPUS_SQLITE_BIN")
                .unwrap_or_else(|| DEFAULT_SQLITE_BIN.to_string()),
            force_embedded: env_flag("CAMPUS_FORCE_EMBEDDED"),
        }
    }
}

fn env_str(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_path(name: &str) -> Option<PathBuf> {
    env_str(name).map(PathBuf::from)
}

fn env_flag(name: &str) -> bool {
    matches!(env_str(name).as_deref(), Some("1") | Some("true") | Some("yes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = StoreConfig::default();
        assert!(config.db_path.is_none());
        assert!(config.db_dir.is_none());
        assert!(config.fallback_root.is_none());
        assert_eq!(config.sqlite_bin, "sqlite3");
        assert!(!config.force_embedded);
    }
}
