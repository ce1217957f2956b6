//! Session data and the request/response payloads of the auth backend.
//! Request payloads carry passwords and responses carry bearer tokens, so
//! none of them may be logged.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
    SuperAdmin,
}

impl Role {
    /// Case-sensitive: `"Admin"` is not a role.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "admin" => Some(Self::Admin),
            "super_admin" => Some(Self::SuperAdmin),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::SuperAdmin => "super_admin",
        }
    }

    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin | Self::SuperAdmin)
    }
}

/// Backends disagree on numeric vs string ids; both are accepted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Number(i64),
    Text(String),
}

impl fmt::Display for UserId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(id) => write!(formatter, "{id}"),
            Self::Text(id) => formatter.write_str(id),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub email: String,
    /// Raw role string as sent by the backend; see [`UserProfile::role`].
    pub role: String,
}

impl UserProfile {
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        Role::parse(&self.role)
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role().is_some_and(Role::is_admin)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: UserProfile,
    pub access_token: String,
}

#[derive(Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Clone, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RegisterRequest")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Loading,
    Authenticated,
    Anonymous,
}

/// The client's current belief about who is logged in.
#[derive(Clone, Debug)]
pub struct SessionState {
    phase: SessionPhase,
    token: Option<SecretString>,
    user: Option<UserProfile>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Uninitialized,
            token: None,
            user: None,
        }
    }
}

impl SessionState {
    pub(crate) fn loading(token: SecretString, user: UserProfile) -> Self {
        Self {
            phase: SessionPhase::Loading,
            token: Some(token),
            user: Some(user),
        }
    }

    pub(crate) fn authenticated(token: SecretString, user: UserProfile) -> Self {
        Self {
            phase: SessionPhase::Authenticated,
            token: Some(token),
            user: Some(user),
        }
    }

    pub(crate) fn anonymous() -> Self {
        Self {
            phase: SessionPhase::Anonymous,
            token: None,
            user: None,
        }
    }

    #[must_use]
    pub const fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// A session that has not finished hydrating is still loading.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(
            self.phase,
            SessionPhase::Uninitialized | SessionPhase::Loading
        )
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self.phase, SessionPhase::Authenticated)
    }

    #[must_use]
    pub fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    #[must_use]
    pub fn token(&self) -> Option<&SecretString> {
        self.token.as_ref()
    }
}
