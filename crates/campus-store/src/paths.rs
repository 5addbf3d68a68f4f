//! Database path resolution and directory provisioning.

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::config::{StoreConfig, DB_FILE_NAME, FALLBACK_SUBDIR};
use crate::error::StoreError;

/// Compute the database path from configuration. Pure; touches nothing.
pub fn resolve_database_path(config: &StoreConfig) -> PathBuf {
    if let Some(path) = &config.db_path {
        return path.clone();
    }
    config
        .db_dir
        .clone()
        .unwrap_or_else(default_data_dir)
        .join(DB_FILE_NAME)
}

/// Default data directory: `~/.campus/database`, `/tmp` when HOME is unset.
fn default_data_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
        .join(".campus")
        .join("database")
}

/// Where statements physically go. Provisions the parent directory before
/// every access; relocates to the fallback at most once per process and
/// stays there.
pub struct StoragePaths {
    resolved: PathBuf,
    fallback_dir: PathBuf,
    active: Option<PathBuf>,
}

impl StoragePaths {
    pub fn new(config: &StoreConfig) -> Self {
        let fallback_root = config
            .fallback_root
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        Self {
            resolved: resolve_database_path(config),
            fallback_dir: fallback_root.join(FALLBACK_SUBDIR),
            active: None,
        }
    }

    /// Path statements currently target, if provisioning already ran.
    pub fn active(&self) -> Option<&Path> {
        self.active.as_deref()
    }

    /// Ensure the target directory exists and return the effective path.
    pub fn ensure(&mut self) -> Result<PathBuf, StoreError> {
        if let Some(path) = self.active.clone() {
            // The fallback decision is already made; from here on any
            // directory failure is fatal.
            create_parent(&path).map_err(fatal_io)?;
            return Ok(path);
        }

        let path = match create_parent(&self.resolved) {
            Ok(()) => self.resolved.clone(),
            Err(err) if is_relocatable(&err) => self.relocate(&err)?,
            Err(err) => return Err(fatal_io(err)),
        };
        self.active = Some(path.clone());
        Ok(path)
    }

    fn relocate(&self, cause: &io::Error) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.fallback_dir).map_err(|err| {
            StoreError::Io(format!(
                "fallback directory {}: {err}",
                self.fallback_dir.display()
            ))
        })?;
        let file_name = self
            .resolved
            .file_name()
            .unwrap_or_else(|| OsStr::new(DB_FILE_NAME));
        let relocated = self.fallback_dir.join(file_name);
        warn!(
            original = %self.resolved.display(),
            relocated = %relocated.display(),
            cause = %cause,
            "data directory not writable; storage switched to fallback"
        );
        Ok(relocated)
    }
}

fn create_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

fn is_relocatable(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::PermissionDenied
            | io::ErrorKind::ReadOnlyFilesystem
            | io::ErrorKind::NotFound
            | io::ErrorKind::NotADirectory
    )
}

fn fatal_io(err: io::Error) -> StoreError {
    StoreError::Io(err.to_string())
}
