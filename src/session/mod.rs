//! Client-side session: state, persistence and the manager that owns both.

mod cookie;
mod manager;
mod storage;
mod store;
mod types;

pub use cookie::{SESSION_COOKIE_MAX_AGE, SESSION_COOKIE_NAME, SessionCookie, find_cookie};
pub use manager::SessionManager;
pub use storage::{
    CookieJar, FileCookieJar, FileStorage, KeyValueStore, MemoryCookieJar, MemoryStorage,
};
pub use store::{SessionStore, StoredSession, TOKEN_KEY, USER_KEY};
pub use types::{
    AuthResponse, LoginRequest, RegisterRequest, Role, SessionPhase, SessionState, UserId,
    UserProfile,
};
