//! The session cookie that mirrors the stored token for the edge guard.
//!
//! The cookie is readable by the same origin (no `HttpOnly`): the client
//! writes it and the edge guard reads it on the next navigation.

use std::time::Duration;

pub const SESSION_COOKIE_NAME: &str = "token";
/// Seven days, the same lifetime as the stored record.
pub const SESSION_COOKIE_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub max_age: Duration,
}

impl SessionCookie {
    #[must_use]
    pub fn new(token: &str) -> Self {
        Self {
            name: SESSION_COOKIE_NAME.to_string(),
            value: token.to_string(),
            path: "/".to_string(),
            max_age: SESSION_COOKIE_MAX_AGE,
        }
    }

    /// A cookie that deletes the session cookie when applied.
    #[must_use]
    pub fn expired() -> Self {
        Self {
            name: SESSION_COOKIE_NAME.to_string(),
            value: String::new(),
            path: "/".to_string(),
            max_age: Duration::ZERO,
        }
    }

    #[must_use]
    pub const fn is_removal(&self) -> bool {
        self.max_age.is_zero()
    }

    /// `Set-Cookie` style rendering of the cookie.
    #[must_use]
    pub fn to_header_value(&self) -> String {
        format!(
            "{}={}; Path={}; Max-Age={}; SameSite=Lax",
            self.name,
            self.value,
            self.path,
            self.max_age.as_secs()
        )
    }
}

/// Find a cookie value in a `Cookie` request header. Empty values count as
/// missing.
#[must_use]
pub fn find_cookie(header: &str, name: &str) -> Option<String> {
    for pair in header.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let Some(key) = parts.next() else {
            continue;
        };
        let Some(value) = parts.next() else {
            continue;
        };
        if key.trim() == name {
            let value = value.trim();
            if value.is_empty() {
                return None;
            }
            return Some(value.to_string());
        }
    }
    None
}
