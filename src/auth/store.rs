use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::AuthError;

const SESSION_FILE_VERSION: u32 = 1;

/// Persisted key/value medium backing the credential store.
///
/// Every mutation must be durable by the time the call returns.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, AuthError>;
    fn set(&self, key: &str, value: &str) -> Result<(), AuthError>;
    fn remove(&self, key: &str) -> Result<(), AuthError>;
    /// Remove every key, including ones this crate does not own.
    fn clear(&self) -> Result<(), AuthError>;

    /// Write several entries as one update.
    ///
    /// Implementations backed by a single file should override this so the
    /// entries land in one write.
    fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), AuthError> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> Result<(), AuthError> {
        for key in keys {
            self.remove(key)?;
        }
        Ok(())
    }
}

/// In-process store; state is lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<MutexGuard<'_, BTreeMap<String, String>>, AuthError> {
        self.entries
            .lock()
            .map_err(|_| AuthError::Io("memory store lock poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), AuthError> {
        self.entries()?.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), AuthError> {
        self.entries()?.clear();
        Ok(())
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), AuthError> {
        let mut guard = self.entries()?;
        for (key, value) in entries {
            guard.insert((*key).to_string(), (*value).to_string());
        }
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> Result<(), AuthError> {
        let mut guard = self.entries()?;
        for key in keys {
            guard.remove(*key);
        }
        Ok(())
    }
}

/// JSON-file store. The file is loaded once and rewritten atomically on
/// every mutation.
///
/// # Example
/// ```no_run
/// use portal_client::auth::{FileKeyValueStore, KeyValueStore};
///
/// let store = FileKeyValueStore::new("/tmp/portal/session.json");
/// store.set("activeRole", "dean")?;
/// assert_eq!(store.get("activeRole")?.as_deref(), Some("dean"));
/// # Ok::<(), portal_client::auth::AuthError>(())
/// ```
#[derive(Debug)]
pub struct FileKeyValueStore {
    path: PathBuf,
    cache: Mutex<Option<BTreeMap<String, String>>>,
}

impl FileKeyValueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_entries<T>(
        &self,
        mutate: bool,
        f: impl FnOnce(&mut BTreeMap<String, String>) -> T,
    ) -> Result<T, AuthError> {
        let mut guard = self
            .cache
            .lock()
            .map_err(|_| AuthError::Io("session file lock poisoned".to_string()))?;
        if guard.is_none() {
            *guard = Some(read_session_file(&self.path)?);
        }
        let Some(entries) = guard.as_mut() else {
            return Err(AuthError::Io("session cache unavailable".to_string()));
        };
        if !mutate {
            return Ok(f(entries));
        }
        let mut next = entries.clone();
        let out = f(&mut next);
        write_session_file(&self.path, &next)?;
        *entries = next;
        Ok(out)
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        self.with_entries(false, |entries| entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        self.with_entries(true, |entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), AuthError> {
        self.with_entries(true, |entries| {
            entries.remove(key);
        })
    }

    fn clear(&self) -> Result<(), AuthError> {
        self.with_entries(true, BTreeMap::clear)
    }

    fn set_many(&self, pairs: &[(&str, &str)]) -> Result<(), AuthError> {
        self.with_entries(true, |entries| {
            for (key, value) in pairs {
                entries.insert((*key).to_string(), (*value).to_string());
            }
        })
    }

    fn remove_many(&self, keys: &[&str]) -> Result<(), AuthError> {
        self.with_entries(true, |entries| {
            for key in keys {
                entries.remove(*key);
            }
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct SessionFile {
    version: u32,
    saved_at: DateTime<Utc>,
    entries: BTreeMap<String, String>,
}

pub(crate) fn default_session_path() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".portal"))
        .unwrap_or_else(|| PathBuf::from(".portal"))
        .join("session.json")
}

fn read_session_file(path: &Path) -> Result<BTreeMap<String, String>, AuthError> {
    let raw = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(err) => return Err(AuthError::Io(err.to_string())),
    };
    let file: SessionFile = serde_json::from_str(&raw)?;
    if file.version != SESSION_FILE_VERSION {
        return Err(AuthError::Serialization(format!(
            "Unsupported session file version {} at {}",
            file.version,
            path.display()
        )));
    }
    Ok(file.entries)
}

fn write_session_file(path: &Path, entries: &BTreeMap<String, String>) -> Result<(), AuthError> {
    let file = SessionFile {
        version: SESSION_FILE_VERSION,
        saved_at: Utc::now(),
        entries: entries.clone(),
    };
    let serialized = serde_json::to_vec_pretty(&file)?;
    atomic_write(path, &serialized)
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<(), AuthError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file_name = path.file_name().ok_or_else(|| {
        AuthError::Io(format!("Session path {} has no file name", path.display()))
    })?;

    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let temp_name = format!(
        ".{}.tmp-{}-{nonce}",
        file_name.to_string_lossy(),
        std::process::id()
    );
    let temp_path = path.with_file_name(temp_name);

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let write_result = (|| -> std::io::Result<()> {
        let mut temp_file = options.open(&temp_path)?;
        temp_file.write_all(data)?;
        temp_file.sync_all()?;
        Ok(())
    })();

    if let Err(err) = write_result {
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }

    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }

    #[cfg(unix)]
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;

    Ok(())
}
