//! File persistence helpers.
//!
//! Handles loading and saving state to disk with proper security, and
//! sharing one state file between several curator processes.

use fs4::fs_std::FileExt;
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::StoreError;

// ============================================================================
// Default Paths
// ============================================================================

/// Returns the default configuration directory.
///
/// - Linux: `~/.config/curator`
/// - macOS: `~/Library/Application Support/curator`
/// - Windows: `%APPDATA%\curator`
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|c| c.join("curator"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns the default data directory (token pool and curation state).
///
/// - Linux: `~/.local/share/curator`
/// - macOS: `~/Library/Application Support/curator`
/// - Windows: `%APPDATA%\curator`
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("curator"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns the default token pool file path.
pub fn default_tokens_path() -> PathBuf {
    default_data_dir().join("tokens.json")
}

/// Returns the default curation state file path.
pub fn default_curation_path() -> PathBuf {
    default_data_dir().join("curation.json")
}

// ============================================================================
// Security: File Permissions
// ============================================================================

/// Sets restrictive file permissions (0o600) on Unix systems.
///
/// Token files carry OAuth secrets and must only be readable by the owner.
#[cfg(unix)]
async fn set_restrictive_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = tokio::fs::metadata(path).await?;
    let mut perms = metadata.permissions();
    perms.set_mode(0o600); // Owner read/write only
    tokio::fs::set_permissions(path, perms).await?;

    debug!(path = %path.display(), mode = "0600", "Set restrictive permissions");
    Ok(())
}

/// Sets restrictive directory permissions (0o700) on Unix systems.
///
/// This ensures config directories are only accessible by the owner.
#[cfg(unix)]
async fn set_restrictive_dir_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = tokio::fs::metadata(path).await?;
    let mut perms = metadata.permissions();
    perms.set_mode(0o700); // Owner read/write/execute only
    tokio::fs::set_permissions(path, perms).await?;

    debug!(path = %path.display(), mode = "0700", "Set restrictive directory permissions");
    Ok(())
}

/// No-op for non-Unix systems.
#[cfg(not(unix))]
async fn set_restrictive_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

/// No-op for non-Unix systems.
#[cfg(not(unix))]
async fn set_restrictive_dir_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

// ============================================================================
// File Operations
// ============================================================================

/// Creates parent directories with restrictive permissions.
///
/// On Unix systems, directories created under the curator config and data
/// directories get 0o700 permissions.
async fn create_secure_parent_dirs(path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            debug!(path = %parent.display(), "Creating secure directory");
            tokio::fs::create_dir_all(parent).await?;

            let mut current = parent.to_path_buf();
            while current.starts_with(default_config_dir()) || current.starts_with(default_data_dir()) {
                if current.exists() {
                    set_restrictive_dir_permissions(&current).await?;
                }
                if !current.pop() {
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Saves data to a JSON file with secure permissions.
///
/// Creates parent directories if they don't exist, writes atomically
/// (via temp file + rename), and sets restrictive permissions on Unix.
pub async fn save_json<T: Serialize>(path: &Path, data: &T) -> Result<(), StoreError> {
    debug!(path = %path.display(), "Saving JSON file");

    // Create parent directories with secure permissions
    create_secure_parent_dirs(path).await?;

    // Serialize to pretty JSON
    let json = serde_json::to_string_pretty(data)?;

    // Write atomically (write to temp file, then rename)
    let temp_path = path.with_extension("json.tmp");
    tokio::fs::write(&temp_path, &json).await?;
    tokio::fs::rename(&temp_path, path).await?;

    // Set restrictive file permissions (Unix only)
    set_restrictive_permissions(path).await?;

    debug!(path = %path.display(), "JSON file saved securely");
    Ok(())
}

/// Loads data from a JSON file.
pub async fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    debug!(path = %path.display(), "Loading JSON file");

    let content = tokio::fs::read_to_string(path).await?;
    let data = serde_json::from_str(&content)?;

    debug!(path = %path.display(), "JSON file loaded");
    Ok(data)
}

/// Loads data from a JSON file, returning default if the file is missing.
///
/// A file that exists but cannot be parsed is an error.
pub async fn load_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T, StoreError> {
    if !path.exists() {
        debug!(path = %path.display(), "File not found, using defaults");
        return Ok(T::default());
    }
    load_json(path).await.inspect_err(|e| {
        warn!(path = %path.display(), error = %e, "Failed to load");
    })
}

/// Ensures a directory exists with secure permissions.
pub async fn ensure_dir(path: &Path) -> Result<(), StoreError> {
    if !path.exists() {
        debug!(path = %path.display(), "Creating directory");
        tokio::fs::create_dir_all(path).await?;
        set_restrictive_dir_permissions(path).await?;
    }
    Ok(())
}

// ============================================================================
// Shared State Files
// ============================================================================

/// Exclusive advisory lock on the `.lock` sidecar of a state file.
///
/// Released when dropped.
#[derive(Debug)]
pub struct FileLock {
    file: std::fs::File,
}

impl FileLock {
    /// Waits until no other process holds the lock of `path`.
    ///
    /// # Errors
    ///
    /// Returns error if the sidecar cannot be created or locked.
    pub async fn acquire(path: &Path) -> Result<Self, StoreError> {
        create_secure_parent_dirs(path).await?;
        let lock_path = path.with_extension("json.lock");

        let file = tokio::task::spawn_blocking(move || -> std::io::Result<std::fs::File> {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&lock_path)?;
            FileExt::lock_exclusive(&file)?;
            Ok(file)
        })
        .await
        .map_err(std::io::Error::other)??;

        Ok(Self { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(error = %e, "Failed to release state file lock");
        }
    }
}

/// Outcome of an update of a [`SharedJson`] state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change<R> {
    /// The state changed and must be written back.
    Changed(R),
    /// The state is left as it was.
    Unchanged(R),
}

/// JSON state whose file is the source of truth for every process.
///
/// Reads reload the file. Updates reload it under a [`FileLock`], apply the
/// change and write it back before the lock is released, so concurrent
/// processes never lose each other's writes. Without a file the state lives
/// in memory only.
#[derive(Debug, Clone)]
pub struct SharedJson<T> {
    cache: Arc<RwLock<T>>,
    path: Option<PathBuf>,
}

impl<T> SharedJson<T>
where
    T: Serialize + DeserializeOwned + Default + Send + Sync,
{
    /// Wraps an in-memory state.
    pub fn in_memory(state: T) -> Self {
        Self {
            cache: Arc::new(RwLock::new(state)),
            path: None,
        }
    }

    /// Opens the state stored at `path` (default if the file does not exist).
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed.
    pub async fn open(path: PathBuf) -> Result<Self, StoreError> {
        let state = load_json_or_default(&path).await?;
        Ok(Self {
            cache: Arc::new(RwLock::new(state)),
            path: Some(path),
        })
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Reads the current state.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub async fn read<R, F>(&self, read: F) -> Result<R, StoreError>
    where
        F: FnOnce(&T) -> R + Send,
    {
        let Some(path) = &self.path else {
            return Ok(read(&*self.cache.read().await));
        };
        let mut cache = self.cache.write().await;
        *cache = load_json_or_default(path).await?;
        Ok(read(&*cache))
    }

    /// Applies `update` to the current state and persists it if changed.
    ///
    /// Nothing is written when `update` fails.
    ///
    /// # Errors
    ///
    /// Returns the error of `update`, or an error if the file cannot be
    /// locked, read or written.
    pub async fn update<R, F>(&self, update: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut T) -> Result<Change<R>, StoreError> + Send,
        R: Send,
    {
        let mut cache = self.cache.write().await;
        let Some(path) = &self.path else {
            return update(&mut *cache).map(Change::into_inner);
        };

        let _lock = FileLock::acquire(path).await?;
        *cache = load_json_or_default(path).await?;
        match update(&mut *cache)? {
            Change::Changed(value) => {
                save_json(path, &*cache).await?;
                Ok(value)
            }
            Change::Unchanged(value) => Ok(value),
        }
    }
}

impl<R> Change<R> {
    /// The value carried by the change.
    pub fn into_inner(self) -> R {
        match self {
            Self::Changed(value) | Self::Unchanged(value) => value,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
