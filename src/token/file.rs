//! File-backed storage.
//!
//! Keeps the key-value map in a single JSON document so credentials survive
//! process restarts. Every write replaces the file through a rename of a
//! sibling temporary file.

use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{ClientError, StorageError};
use crate::token::KeyValueStore;

/// Durable storage in a JSON file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`, loading existing entries. A missing file is
    /// an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ClientError> {
        let path = path.into();
        let entries = match fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => HashMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                ClientError::Storage(StorageError::CorruptedData {
                    message: format!("{}: {}", path.display(), e),
                })
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                return Err(ClientError::Storage(StorageError::ReadFailed {
                    message: format!("{}: {}", path.display(), e),
                }))
            }
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, entries: &HashMap<String, String>) -> Result<(), ClientError> {
        let write_failed = |e: std::io::Error| {
            ClientError::Storage(StorageError::WriteFailed {
                message: format!("{}: {}", self.path.display(), e),
            })
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(write_failed)?;
            }
        }

        let bytes = serde_json::to_vec_pretty(entries).map_err(|e| {
            ClientError::Storage(StorageError::WriteFailed {
                message: e.to_string(),
            })
        })?;

        let tmp = temp_path(&self.path);
        write_private(&tmp, &bytes).map_err(write_failed)?;
        fs::rename(&tmp, &self.path).map_err(write_failed)
    }

    // The updated map only replaces the cached one once it is on disk, so a
    // failed write leaves both unchanged.
    fn update(&self, apply: impl FnOnce(&mut HashMap<String, String>)) -> Result<(), ClientError> {
        let mut entries = self.entries();
        let mut next = entries.clone();
        apply(&mut next);
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }
}

/// Sibling of `path` with `.tmp` appended to the full file name.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Write `bytes` to `path`, readable by the owner only on Unix.
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    // A leftover temp file keeps its old mode; `mode` only applies on create.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(bytes)?;
    file.sync_all()
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, ClientError> {
        Ok(self.entries().get(key).cloned())
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), ClientError> {
        self.update(|map| {
            for (key, value) in entries {
                map.insert((*key).to_string(), (*value).to_string());
            }
        })
    }

    fn remove_many(&self, keys: &[&str]) -> Result<(), ClientError> {
        self.update(|map| {
            for key in keys {
                map.remove(*key);
            }
        })
    }
}
