use super::claims::decode_role_unverified;
use crate::{
    routes::{RouteClass, RouteTable, canonical_path, login_url, paths},
    session::{Role, SESSION_COOKIE_NAME, find_cookie},
};
use axum::{
    extract::{Request, State},
    http::header::COOKIE,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardDecision {
    Pass,
    RedirectToLogin(String),
    RedirectHome,
}

/// Cookie-only route check that runs before a page is served.
#[derive(Clone, Debug, Default)]
pub struct RouteGuard {
    routes: RouteTable,
}

impl RouteGuard {
    #[must_use]
    pub const fn new(routes: RouteTable) -> Self {
        Self { routes }
    }

    #[must_use]
    pub const fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Decide what to do with a request for `raw_path` carrying
    /// `cookie_token`. The path is classified in its canonical form, the one
    /// the file server resolves. An empty token is treated as absent.
    #[must_use]
    pub fn evaluate(&self, raw_path: &str, cookie_token: Option<&str>) -> GuardDecision {
        let token = cookie_token.filter(|token| !token.is_empty());

        let Some(canonical) = canonical_path(raw_path) else {
            debug!(path = raw_path, reason = "path does not resolve", "edge guard denied");
            return GuardDecision::RedirectHome;
        };
        let path = canonical.as_str();

        match self.routes.classify(path) {
            RouteClass::Admin => {
                let Some(token) = token else {
                    debug!(path, reason = "no session cookie", "edge guard denied");
                    return GuardDecision::RedirectToLogin(login_url(path));
                };
                match decode_role_unverified(token) {
                    Ok(Some(role)) if Role::parse(&role).is_some_and(Role::is_admin) => {
                        GuardDecision::Pass
                    }
                    Ok(_) => {
                        debug!(path, reason = "role is not admin", "edge guard denied");
                        GuardDecision::RedirectHome
                    }
                    Err(err) => {
                        debug!(path, reason = %err, "edge guard denied");
                        GuardDecision::RedirectHome
                    }
                }
            }
            RouteClass::Authenticated => {
                if token.is_some() {
                    GuardDecision::Pass
                } else {
                    debug!(path, reason = "no session cookie", "edge guard denied");
                    GuardDecision::RedirectToLogin(login_url(path))
                }
            }
            RouteClass::AuthPage | RouteClass::Public => GuardDecision::Pass,
        }
    }
}

/// Axum middleware running [`RouteGuard::evaluate`] on every request.
pub async fn edge_guard(
    State(guard): State<Arc<RouteGuard>>,
    request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|header| find_cookie(header, SESSION_COOKIE_NAME));

    match guard.evaluate(request.uri().path(), token.as_deref()) {
        GuardDecision::Pass => next.run(request).await,
        GuardDecision::RedirectToLogin(location) => Redirect::temporary(&location).into_response(),
        GuardDecision::RedirectHome => Redirect::temporary(paths::HOME).into_response(),
    }
}
