pub mod check;
pub mod serve;
pub mod session;

// The match over actions lives in `run` so this file only declares them.
mod run;

use crate::cli::globals::GlobalArgs;

#[derive(Debug)]
pub enum Action {
    Serve(serve::Args),
    Login(GlobalArgs, session::LoginArgs),
    Register(GlobalArgs, session::RegisterArgs),
    Logout(GlobalArgs),
    Status(GlobalArgs),
    Check(GlobalArgs, check::Args),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
