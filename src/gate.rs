//! Render-time role gate.
//!
//! A [`RoleGate`] is mounted for one protected path and re-evaluates the live
//! session every time it changes. Unlike the edge guard it only trusts the
//! backend-verified session held by the session manager.

use crate::{
    routes::{RouteClass, login_url, paths},
    session::SessionState,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Client-side navigation.
pub trait Navigator: Send + Sync {
    fn navigate(&self, to: &str);
}

impl<T: Navigator + ?Sized> Navigator for Arc<T> {
    fn navigate(&self, to: &str) {
        self.as_ref().navigate(to);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Requirement {
    Admin,
    Authenticated,
}

impl Requirement {
    /// The requirement a route class puts on the session, if any.
    #[must_use]
    pub const fn for_route(class: RouteClass) -> Option<Self> {
        match class {
            RouteClass::Admin => Some(Self::Admin),
            RouteClass::Authenticated => Some(Self::Authenticated),
            RouteClass::AuthPage | RouteClass::Public => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateView {
    /// Session still resolving: show a spinner, redirect nowhere.
    Loading,
    /// Sent to login; nothing to render.
    Redirecting,
    /// Signed in without the required role.
    AccessDenied,
    Protected,
}

pub struct RoleGate<N> {
    session: watch::Receiver<SessionState>,
    navigator: N,
    path: String,
    requirement: Requirement,
    last_redirect: Option<String>,
    last_view: GateView,
}

impl<N: Navigator> RoleGate<N> {
    pub fn new(
        session: watch::Receiver<SessionState>,
        navigator: N,
        path: impl Into<String>,
        requirement: Requirement,
    ) -> Self {
        Self {
            session,
            navigator,
            path: path.into(),
            requirement,
            last_redirect: None,
            last_view: GateView::Loading,
        }
    }

    /// Evaluate the current session. A redirect is issued once per denial;
    /// rendering the same denial again does not navigate again.
    pub fn render(&mut self) -> GateView {
        let (view, redirect) = {
            let state = self.session.borrow_and_update();
            decide(&state, self.requirement, &self.path)
        };

        match redirect {
            Some(target) if self.last_redirect.as_deref() != Some(target.as_str()) => {
                debug!(path = %self.path, to = %target, "role gate redirect");
                self.navigator.navigate(&target);
                self.last_redirect = Some(target);
            }
            Some(_) => {}
            None => self.last_redirect = None,
        }

        self.last_view = view;
        view
    }

    /// Wait for the session to change, then render again. Once the session
    /// manager is gone the last view is returned as is.
    pub async fn next(&mut self) -> GateView {
        if self.session.changed().await.is_err() {
            return self.last_view;
        }
        self.render()
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub const fn requirement(&self) -> Requirement {
        self.requirement
    }
}

fn decide(state: &SessionState, requirement: Requirement, path: &str) -> (GateView, Option<String>) {
    if state.is_loading() {
        return (GateView::Loading, None);
    }
    let Some(user) = state.user().filter(|_| state.is_authenticated()) else {
        return (GateView::Redirecting, Some(login_url(path)));
    };
    match requirement {
        Requirement::Admin if !user.is_admin() => {
            (GateView::AccessDenied, Some(paths::HOME.to_string()))
        }
        Requirement::Admin | Requirement::Authenticated => (GateView::Protected, None),
    }
}

/// What the login and register pages show for the current session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthPageView {
    Loading,
    /// Already signed in: show a notice and links, do not redirect.
    AlreadySignedIn { email: String },
    Form,
}

#[must_use]
pub fn auth_page_view(state: &SessionState) -> AuthPageView {
    if state.is_loading() {
        return AuthPageView::Loading;
    }
    match state.user().filter(|_| state.is_authenticated()) {
        Some(user) => AuthPageView::AlreadySignedIn {
            email: user.email.clone(),
        },
        None => AuthPageView::Form,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{UserId, UserProfile};
    use secrecy::SecretString;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNavigator {
        visits: Mutex<Vec<String>>,
    }

    impl RecordingNavigator {
        fn visits(&self) -> Vec<String> {
            self.visits
                .lock()
                .map(|visits| visits.clone())
                .unwrap_or_default()
        }
    }

    impl Navigator for RecordingNavigator {
        fn navigate(&self, to: &str) {
            if let Ok(mut visits) = self.visits.lock() {
                visits.push(to.to_string());
            }
        }
    }

    fn signed_in(role: &str) -> SessionState {
        SessionState::authenticated(
            SecretString::from("T1"),
            UserProfile {
                id: UserId::Number(1),
                name: "A".to_string(),
                email: "a@b.com".to_string(),
                role: role.to_string(),
            },
        )
    }

    fn mount(
        state: SessionState,
        path: &str,
        requirement: Requirement,
    ) -> (
        watch::Sender<SessionState>,
        Arc<RecordingNavigator>,
        RoleGate<Arc<RecordingNavigator>>,
    ) {
        let (sender, receiver) = watch::channel(state);
        let navigator = Arc::new(RecordingNavigator::default());
        let gate = RoleGate::new(receiver, navigator.clone(), path, requirement);
        (sender, navigator, gate)
    }

    #[test]
    fn loading_session_never_redirects() {
        let (sender, navigator, mut gate) =
            mount(SessionState::default(), "/admin", Requirement::Admin);
        assert_eq!(gate.render(), GateView::Loading);

        sender.send_replace(SessionState::loading(
            SecretString::from("T1"),
            UserProfile {
                id: UserId::Number(1),
                name: "A".to_string(),
                email: "a@b.com".to_string(),
                role: "user".to_string(),
            },
        ));
        assert_eq!(gate.render(), GateView::Loading);
        assert!(navigator.visits().is_empty());
    }

    #[test]
    fn anonymous_is_sent_to_login_with_redirect() {
        let (_sender, navigator, mut gate) =
            mount(SessionState::anonymous(), "/admin/users", Requirement::Admin);
        assert_eq!(gate.render(), GateView::Redirecting);
        assert_eq!(navigator.visits(), ["/login?redirect=%2Fadmin%2Fusers"]);
    }

    #[test]
    fn user_role_on_admin_page_redirects_home_exactly_once() {
        let (_sender, navigator, mut gate) =
            mount(signed_in("user"), "/admin", Requirement::Admin);
        assert_eq!(gate.render(), GateView::AccessDenied);
        assert_eq!(gate.render(), GateView::AccessDenied);
        assert_eq!(gate.render(), GateView::AccessDenied);
        assert_eq!(navigator.visits(), ["/"]);
    }

    #[test]
    fn admin_roles_see_protected_content() {
        for role in ["admin", "super_admin"] {
            let (_sender, navigator, mut gate) =
                mount(signed_in(role), "/admin", Requirement::Admin);
            assert_eq!(gate.render(), GateView::Protected);
            assert!(navigator.visits().is_empty());
        }
    }

    #[test]
    fn authenticated_requirement_accepts_any_role() {
        let (_sender, navigator, mut gate) =
            mount(signed_in("user"), "/orders", Requirement::Authenticated);
        assert_eq!(gate.render(), GateView::Protected);
        assert!(navigator.visits().is_empty());
    }

    #[tokio::test]
    async fn next_follows_session_changes() {
        let (sender, navigator, mut gate) =
            mount(SessionState::default(), "/admin", Requirement::Admin);
        assert_eq!(gate.render(), GateView::Loading);

        sender.send_replace(signed_in("admin"));
        assert_eq!(gate.next().await, GateView::Protected);

        sender.send_replace(SessionState::anonymous());
        assert_eq!(gate.next().await, GateView::Redirecting);
        assert_eq!(navigator.visits(), ["/login?redirect=%2Fadmin"]);

        drop(sender);
        assert_eq!(gate.next().await, GateView::Redirecting);
        assert_eq!(navigator.visits().len(), 1);
    }

    #[test]
    fn requirement_follows_route_class() {
        assert_eq!(
            Requirement::for_route(RouteClass::Admin),
            Some(Requirement::Admin)
        );
        assert_eq!(
            Requirement::for_route(RouteClass::Authenticated),
            Some(Requirement::Authenticated)
        );
        assert_eq!(Requirement::for_route(RouteClass::AuthPage), None);
        assert_eq!(Requirement::for_route(RouteClass::Public), None);
    }

    #[test]
    fn auth_pages_show_notice_instead_of_redirecting() {
        assert_eq!(auth_page_view(&SessionState::default()), AuthPageView::Loading);
        assert_eq!(auth_page_view(&SessionState::anonymous()), AuthPageView::Form);
        assert_eq!(
            auth_page_view(&signed_in("user")),
            AuthPageView::AlreadySignedIn {
                email: "a@b.com".to_string()
            }
        );
    }
}
