//! # sessiongate (client session and route protection)
//!
//! `sessiongate` owns "who is logged in" for the storefront and admin site and
//! keeps unauthorized visitors out of the protected areas.
//!
//! ## Session
//!
//! The [`session::SessionManager`] is the single source of truth for the
//! current session and the only writer of the persisted session record (a
//! token and profile in key-value storage, with the token mirrored into the
//! `token` cookie). It is built once at the application root and handed to
//! its consumers; there is no global session.
//!
//! ## Enforcement layers
//!
//! Two layers enforce the same route policy and never talk to each other:
//!
//! - **Edge guard** ([`guard::RouteGuard`]): runs before a page is served and
//!   only sees the cookie. It decodes the role claim without verifying the
//!   token signature, so it is a UX fast path and not a security boundary.
//! - **Role gate** ([`gate::RoleGate`]): runs while a protected view is
//!   mounted and checks the live, backend-verified session. It is the
//!   authority for anything rendered after the first load.
//!
//! Signed-in users are never bounced away from login/register at the edge;
//! cookie and storage can disagree and that redirect would loop.

pub mod cli;
pub mod error;
pub mod gate;
pub mod guard;
pub mod routes;
pub mod server;
pub mod session;
pub mod verifier;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
