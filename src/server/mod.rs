//! Edge server: serves the built site with the route guard in front of every
//! page, plus a `/health` probe.

mod health;

pub use health::Health;

use crate::{
    guard::{RouteGuard, edge_guard},
    routes::RouteTable,
};
use anyhow::{Context, Result};
use axum::{
    Router,
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    middleware,
    routing::get,
};
use std::{path::Path, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer,
    services::{ServeDir, ServeFile},
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, error, info, info_span};
use ulid::Ulid;

const REQUEST_ID: &str = "x-request-id";

/// Router serving `site_dir`. Unknown paths fall back to `index.html` so the
/// client-side router can render them.
pub fn router(site_dir: &Path, routes: RouteTable) -> Router {
    let guard = Arc::new(RouteGuard::new(routes));
    let site = ServeDir::new(site_dir).fallback(ServeFile::new(site_dir.join("index.html")));

    Router::new()
        .route("/health", get(health::health).options(health::health))
        .fallback_service(site)
        .layer(middleware::from_fn_with_state(guard, edge_guard))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static(REQUEST_ID),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    REQUEST_ID,
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span)),
        )
}

/// Serve until ctrl-c.
/// # Errors
/// Returns an error if the site directory is missing or the server fails to start
pub async fn new(port: u16, site_dir: &Path, routes: RouteTable) -> Result<()> {
    if !site_dir.is_dir() {
        anyhow::bail!("Site directory not found: {}", site_dir.display());
    }

    let app = router(site_dir, routes);

    let listener = TcpListener::bind(format!("::0:{port}"))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {err}");
                std::future::pending::<()>().await;
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let path = request.uri().path();
    let request_id = request
        .headers()
        .get(REQUEST_ID)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    info_span!("http.request", method = %request.method(), path, request_id)
}
