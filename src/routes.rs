//! Route classification shared by both enforcement layers.
//!
//! The table is plain configuration: the edge guard and the role gate each
//! build their own copy, so nothing at runtime links the two layers.

use crate::session::AuthResponse;
use url::form_urlencoded;

pub mod paths {
    pub const HOME: &str = "/";
    pub const LOGIN: &str = "/login";
    pub const REGISTER: &str = "/register";
    pub const ADMIN: &str = "/admin";
}

pub const DEFAULT_ADMIN_PREFIXES: &[&str] = &["/admin"];
pub const DEFAULT_PROTECTED_PREFIXES: &[&str] = &["/account", "/checkout", "/orders"];
pub const DEFAULT_AUTH_PAGES: &[&str] = &["/login", "/register"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteClass {
    Public,
    /// Login and register pages. Never redirected at the edge.
    AuthPage,
    Authenticated,
    Admin,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteTable {
    admin: Vec<String>,
    protected: Vec<String>,
    auth_pages: Vec<String>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new(
            DEFAULT_ADMIN_PREFIXES.iter().map(ToString::to_string),
            DEFAULT_PROTECTED_PREFIXES.iter().map(ToString::to_string),
            DEFAULT_AUTH_PAGES.iter().map(ToString::to_string),
        )
    }
}

impl RouteTable {
    pub fn new(
        admin: impl IntoIterator<Item = String>,
        protected: impl IntoIterator<Item = String>,
        auth_pages: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            admin: normalize_prefixes(admin),
            protected: normalize_prefixes(protected),
            auth_pages: normalize_prefixes(auth_pages),
        }
    }

    /// Classify a request path. Admin wins over authenticated, which wins over
    /// auth pages.
    #[must_use]
    pub fn classify(&self, path: &str) -> RouteClass {
        if matches_any(&self.admin, path) {
            RouteClass::Admin
        } else if matches_any(&self.protected, path) {
            RouteClass::Authenticated
        } else if matches_any(&self.auth_pages, path) {
            RouteClass::AuthPage
        } else {
            RouteClass::Public
        }
    }

    #[must_use]
    pub fn admin_prefixes(&self) -> &[String] {
        &self.admin
    }

    #[must_use]
    pub fn protected_prefixes(&self) -> &[String] {
        &self.protected
    }

    #[must_use]
    pub fn auth_pages(&self) -> &[String] {
        &self.auth_pages
    }
}

fn normalize_prefixes(prefixes: impl IntoIterator<Item = String>) -> Vec<String> {
    prefixes
        .into_iter()
        .filter_map(|prefix| {
            let trimmed = prefix.trim().trim_end_matches('/');
            if trimmed.is_empty() {
                return None;
            }
            if trimmed.starts_with('/') {
                Some(trimmed.to_string())
            } else {
                Some(format!("/{trimmed}"))
            }
        })
        .collect()
}

/// `/admin` matches `/admin` and `/admin/users`, not `/administrator`.
fn matches_prefix(prefix: &str, path: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

fn matches_any(prefixes: &[String], path: &str) -> bool {
    prefixes.iter().any(|prefix| matches_prefix(prefix, path))
}

/// The path a static file server would resolve: percent-decoded, with empty
/// and `.` segments dropped. `None` for `..` segments or invalid UTF-8.
///
/// `//admin/`, `/./admin` and `/%61dmin` all canonicalize to `/admin`.
#[must_use]
pub fn canonical_path(raw: &str) -> Option<String> {
    let decoded = urlencoding::decode(raw).ok()?;
    let mut segments = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => return None,
            segment => segments.push(segment),
        }
    }
    Some(format!("/{}", segments.join("/")))
}

/// Build the login URL carrying the page the visitor was trying to reach.
#[must_use]
pub fn login_url(redirect: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("redirect", redirect)
        .finish();
    format!("{}?{query}", paths::LOGIN)
}

/// Only same-site absolute paths are followed after login.
#[must_use]
pub fn is_local_path(target: &str) -> bool {
    target.starts_with('/') && !target.starts_with("//") && !target.contains('\\')
}

/// Where to send the user after a successful login or registration.
///
/// The role is lowercased before it is compared with `"admin"`. Everywhere
/// else roles are case-sensitive; this one comparison decides which users land
/// on `/admin`, so it stays as it is. `super_admin` is not matched here and
/// follows the requested redirect like everyone else.
#[must_use]
pub fn post_login_destination(response: &AuthResponse, requested: Option<&str>) -> String {
    if response.user.role.to_lowercase() == "admin" {
        return paths::ADMIN.to_string();
    }
    requested
        .map(str::trim)
        .filter(|target| is_local_path(target))
        .unwrap_or(paths::HOME)
        .to_string()
}
