use crate::{
    cli::globals::GlobalArgs,
    gate::{AuthPageView, GateView, Navigator, Requirement, RoleGate, auth_page_view},
    guard::{GuardDecision, RouteGuard},
    routes::{RouteClass, RouteTable},
    session::SessionState,
};
use anyhow::Result;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

#[derive(Debug)]
pub struct Args {
    pub path: String,
}

/// Records navigations instead of performing them.
#[derive(Default)]
struct Redirects(Mutex<Vec<String>>);

impl Navigator for Redirects {
    fn navigate(&self, to: &str) {
        if let Ok(mut targets) = self.0.lock() {
            targets.push(to.to_string());
        }
    }
}

impl Redirects {
    fn first(&self) -> Option<String> {
        self.0.lock().ok().and_then(|targets| targets.first().cloned())
    }
}

fn edge_line(decision: &GuardDecision) -> String {
    match decision {
        GuardDecision::Pass => "edge guard: pass".to_string(),
        GuardDecision::RedirectToLogin(location) => format!("edge guard: redirect to {location}"),
        GuardDecision::RedirectHome => "edge guard: redirect to /".to_string(),
    }
}

/// What the render-time layer does for `path` with `session`.
fn render_line(routes: &RouteTable, path: &str, session: watch::Receiver<SessionState>) -> String {
    let class = routes.classify(path);
    if class == RouteClass::AuthPage {
        return match auth_page_view(&session.borrow()) {
            AuthPageView::Loading => "auth page: loading".to_string(),
            AuthPageView::AlreadySignedIn { email } => {
                format!("auth page: already signed in as {email}")
            }
            AuthPageView::Form => "auth page: form".to_string(),
        };
    }

    let Some(requirement) = Requirement::for_route(class) else {
        return "role gate: public page".to_string();
    };

    let redirects = Arc::new(Redirects::default());
    let view = RoleGate::new(session, redirects.clone(), path, requirement).render();
    let redirect = redirects
        .first()
        .map(|target| format!(", redirect to {target}"))
        .unwrap_or_default();
    let view = match view {
        GateView::Loading => "loading",
        GateView::Redirecting => "redirecting",
        GateView::AccessDenied => "access denied",
        GateView::Protected => "protected content",
    };
    format!("role gate: {view}{redirect}")
}

/// Run both enforcement layers for a path against the stored session.
/// # Errors
/// Returns an error if the API URL is invalid or the cookie jar is unreadable.
pub async fn execute(globals: &GlobalArgs, args: Args) -> Result<()> {
    let manager = globals.session_manager()?;
    let cookie = manager.store().cookie_token()?;
    let edge = RouteGuard::new(globals.routes.clone()).evaluate(&args.path, cookie.as_deref());

    manager.hydrate().await;

    println!("{}", edge_line(&edge));
    println!("{}", render_line(&globals.routes, &args.path, manager.subscribe()));
    Ok(())
}
