use crate::cli::actions::{Action, check, serve, session};
use anyhow::Result;

/// Single dispatch point for all CLI actions.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Serve(args) => serve::execute(args).await,
        Action::Login(globals, args) => session::login(&globals, args).await,
        Action::Register(globals, args) => session::register(&globals, args).await,
        Action::Logout(globals) => session::logout(&globals),
        Action::Status(globals) => session::status(&globals).await,
        Action::Check(globals, args) => check::execute(&globals, args).await,
    }
}
