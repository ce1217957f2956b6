use crate::{routes::RouteTable, server};
use anyhow::Result;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub site_dir: PathBuf,
    pub routes: RouteTable,
}

/// Execute the serve action.
/// # Errors
/// Returns an error if the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!(
        port = args.port,
        site_dir = %args.site_dir.display(),
        admin = ?args.routes.admin_prefixes(),
        protected = ?args.routes.protected_prefixes(),
        auth_pages = ?args.routes.auth_pages(),
        "startup args"
    );

    server::new(args.port, &args.site_dir, args.routes).await
}
