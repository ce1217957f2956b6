//! Storage backends for the persisted session record.
//!
//! `KeyValueStore` plays the role of browser local storage and `CookieJar`
//! the cookie channel. Writes are synchronous: when a call returns, the value
//! is on disk (or in memory) and the next reader sees it.

use super::cookie::SessionCookie;
use crate::error::StoreError;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::{
    collections::BTreeMap,
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    sync::Mutex,
    time::{SystemTime, UNIX_EPOCH},
};
use tracing::warn;

pub trait KeyValueStore: Send + Sync {
    /// # Errors
    /// Returns an error if the backing storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    /// # Errors
    /// Returns an error if the value cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    /// # Errors
    /// Returns an error if the value cannot be removed.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

pub trait CookieJar: Send + Sync {
    /// Returns the value of an unexpired cookie.
    ///
    /// # Errors
    /// Returns an error if the jar cannot be read.
    fn get(&self, name: &str) -> Result<Option<String>, StoreError>;
    /// Stores the cookie, or deletes it when `max_age` is zero.
    ///
    /// # Errors
    /// Returns an error if the jar cannot be written.
    fn set(&self, cookie: &SessionCookie) -> Result<(), StoreError>;
    /// Renders all unexpired cookies as a `Cookie` request header.
    ///
    /// # Errors
    /// Returns an error if the jar cannot be read.
    fn header(&self) -> Result<Option<String>, StoreError>;
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StoredCookie {
    value: String,
    expires_at_unix: u64,
}

fn now_unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}

type CookieMap = BTreeMap<String, StoredCookie>;

fn apply_cookie(cookies: &mut CookieMap, cookie: &SessionCookie) {
    if cookie.is_removal() {
        cookies.remove(&cookie.name);
        return;
    }
    cookies.insert(
        cookie.name.clone(),
        StoredCookie {
            value: cookie.value.clone(),
            expires_at_unix: now_unix_seconds().saturating_add(cookie.max_age.as_secs()),
        },
    );
}

fn live_cookie(cookies: &CookieMap, name: &str) -> Option<String> {
    let now = now_unix_seconds();
    cookies
        .get(name)
        .filter(|cookie| cookie.expires_at_unix > now)
        .map(|cookie| cookie.value.clone())
}

fn cookie_header(cookies: &CookieMap) -> Option<String> {
    let now = now_unix_seconds();
    let pairs: Vec<String> = cookies
        .iter()
        .filter(|(_, cookie)| cookie.expires_at_unix > now)
        .map(|(name, cookie)| format!("{name}={}", cookie.value))
        .collect();
    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}

/// In-memory storage, scoped to one process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let values = self.values.lock().map_err(|_| StoreError::Lock)?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock().map_err(|_| StoreError::Lock)?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock().map_err(|_| StoreError::Lock)?;
        values.remove(key);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryCookieJar {
    cookies: Mutex<CookieMap>,
}

impl MemoryCookieJar {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CookieJar for MemoryCookieJar {
    fn get(&self, name: &str) -> Result<Option<String>, StoreError> {
        let cookies = self.cookies.lock().map_err(|_| StoreError::Lock)?;
        Ok(live_cookie(&cookies, name))
    }

    fn set(&self, cookie: &SessionCookie) -> Result<(), StoreError> {
        let mut cookies = self.cookies.lock().map_err(|_| StoreError::Lock)?;
        apply_cookie(&mut cookies, cookie);
        Ok(())
    }

    fn header(&self) -> Result<Option<String>, StoreError> {
        let cookies = self.cookies.lock().map_err(|_| StoreError::Lock)?;
        Ok(cookie_header(&cookies))
    }
}

/// A JSON file guarded by a process-local lock. Writes go to a sibling temp
/// file first and are renamed into place.
#[derive(Debug)]
struct JsonFile {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    fn read<T: DeserializeOwned + Default>(&self) -> Result<T, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(T::default()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(T::default()),
            Err(err) => Err(err.into()),
        }
    }

    /// The file holds a bearer token: owner read/write only on unix.
    fn write<T: Serialize>(&self, value: &T) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&tmp)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))?;
        }
        file.write_all(&serde_json::to_vec_pretty(value)?)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Read-modify-write. An unparseable file is replaced instead of
    /// blocking every later write.
    fn update<T, F>(&self, apply: F) -> Result<(), StoreError>
    where
        T: Serialize + DeserializeOwned + Default,
        F: FnOnce(&mut T),
    {
        let _guard = self.lock.lock().map_err(|_| StoreError::Lock)?;
        let mut value: T = match self.read() {
            Ok(value) => value,
            Err(StoreError::Json(err)) => {
                warn!(path = %self.path.display(), "replacing unreadable state file: {err}");
                T::default()
            }
            Err(err) => return Err(err),
        };
        apply(&mut value);
        self.write(&value)
    }

    fn snapshot<T: DeserializeOwned + Default>(&self) -> Result<T, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Lock)?;
        self.read()
    }
}

/// Key-value storage persisted as `storage.json` in a state directory.
#[derive(Debug)]
pub struct FileStorage {
    file: JsonFile,
}

impl FileStorage {
    pub const FILE_NAME: &'static str = "storage.json";

    #[must_use]
    pub fn new(state_dir: &Path) -> Self {
        Self {
            file: JsonFile::new(state_dir.join(Self::FILE_NAME)),
        }
    }
}

impl KeyValueStore for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let values: BTreeMap<String, String> = self.file.snapshot()?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.file.update(|values: &mut BTreeMap<String, String>| {
            values.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.file.update(|values: &mut BTreeMap<String, String>| {
            values.remove(key);
        })
    }
}

/// Cookie jar persisted as `cookies.json` in a state directory.
#[derive(Debug)]
pub struct FileCookieJar {
    file: JsonFile,
}

impl FileCookieJar {
    pub const FILE_NAME: &'static str = "cookies.json";

    #[must_use]
    pub fn new(state_dir: &Path) -> Self {
        Self {
            file: JsonFile::new(state_dir.join(Self::FILE_NAME)),
        }
    }
}

impl CookieJar for FileCookieJar {
    fn get(&self, name: &str) -> Result<Option<String>, StoreError> {
        let cookies: CookieMap = self.file.snapshot()?;
        Ok(live_cookie(&cookies, name))
    }

    fn set(&self, cookie: &SessionCookie) -> Result<(), StoreError> {
        self.file
            .update(|cookies: &mut CookieMap| apply_cookie(cookies, cookie))
    }

    fn header(&self) -> Result<Option<String>, StoreError> {
        let cookies: CookieMap = self.file.snapshot()?;
        Ok(cookie_header(&cookies))
    }
}
