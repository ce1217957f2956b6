//! The persisted session record: token and profile in key-value storage,
//! with the token mirrored into the session cookie.
//!
//! Writers are crate-private; the session manager is the only caller.

use super::{
    cookie::{SESSION_COOKIE_NAME, SessionCookie},
    storage::{CookieJar, FileCookieJar, FileStorage, KeyValueStore, MemoryCookieJar, MemoryStorage},
    types::UserProfile,
};
use crate::error::StoreError;
use std::{path::Path, sync::Arc};
use tracing::warn;

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredSession {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn KeyValueStore>,
    cookies: Arc<dyn CookieJar>,
}

impl SessionStore {
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStore>, cookies: Arc<dyn CookieJar>) -> Self {
        Self { storage, cookies }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()), Arc::new(MemoryCookieJar::new()))
    }

    /// Store backed by `storage.json` and `cookies.json` under `state_dir`.
    #[must_use]
    pub fn in_dir(state_dir: &Path) -> Self {
        Self::new(
            Arc::new(FileStorage::new(state_dir)),
            Arc::new(FileCookieJar::new(state_dir)),
        )
    }

    /// Read the stored record. A token without a readable profile (or the
    /// other way round) is reported as no session.
    ///
    /// # Errors
    /// Returns an error if the storage backend cannot be read.
    pub fn load(&self) -> Result<Option<StoredSession>, StoreError> {
        let token = self.storage.get(TOKEN_KEY)?.filter(|token| !token.is_empty());
        let user = self.storage.get(USER_KEY)?;

        let (Some(token), Some(user)) = (token, user) else {
            return Ok(None);
        };

        match serde_json::from_str::<UserProfile>(&user) {
            Ok(user) => Ok(Some(StoredSession { token, user })),
            Err(err) => {
                warn!("stored user profile is unreadable: {err}");
                Ok(None)
            }
        }
    }

    /// True when either channel still holds something.
    ///
    /// # Errors
    /// Returns an error if the storage backend cannot be read.
    pub fn has_residue(&self) -> Result<bool, StoreError> {
        Ok(self.storage.get(TOKEN_KEY)?.is_some()
            || self.storage.get(USER_KEY)?.is_some()
            || self.cookie_token()?.is_some())
    }

    /// The token as the edge guard would see it.
    ///
    /// # Errors
    /// Returns an error if the cookie jar cannot be read.
    pub fn cookie_token(&self) -> Result<Option<String>, StoreError> {
        self.cookies.get(SESSION_COOKIE_NAME)
    }

    /// The `Cookie` header the next navigation would carry.
    ///
    /// # Errors
    /// Returns an error if the cookie jar cannot be read.
    pub fn cookie_header(&self) -> Result<Option<String>, StoreError> {
        self.cookies.header()
    }

    /// Write token, profile and cookie. Returns only after all three are
    /// written.
    pub(crate) fn save(&self, token: &str, user: &UserProfile) -> Result<(), StoreError> {
        let serialized = serde_json::to_string(user)?;
        self.storage.set(TOKEN_KEY, token)?;
        self.storage.set(USER_KEY, &serialized)?;
        self.cookies.set(&SessionCookie::new(token))?;
        Ok(())
    }

    pub(crate) fn save_profile(&self, user: &UserProfile) -> Result<(), StoreError> {
        let serialized = serde_json::to_string(user)?;
        self.storage.set(USER_KEY, &serialized)
    }

    /// Remove token, profile and cookie. Every channel is attempted even if
    /// an earlier one fails; the first error is returned.
    pub(crate) fn clear(&self) -> Result<(), StoreError> {
        let results = [
            self.storage.remove(TOKEN_KEY),
            self.storage.remove(USER_KEY),
            self.cookies.set(&SessionCookie::expired()),
        ];
        results.into_iter().collect()
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.debug_struct("SessionStore").finish_non_exhaustive()
    }
}
