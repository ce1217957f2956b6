//! Edge route guard: the request-time check that runs before a page is
//! served. It only sees the `token` cookie and never talks to the session
//! manager or the backend.

mod claims;
mod edge;

pub use claims::{ClaimsError, decode_role_unverified};
pub use edge::{GuardDecision, RouteGuard, edge_guard};
