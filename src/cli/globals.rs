use crate::{
    routes::RouteTable,
    session::{SessionManager, SessionStore},
    verifier::HttpAuthVerifier,
};
use anyhow::Result;
use std::{path::PathBuf, time::Duration};

/// Settings shared by every subcommand.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub api_url: String,
    pub api_timeout: Option<Duration>,
    pub state_dir: PathBuf,
    pub routes: RouteTable,
}

impl GlobalArgs {
    /// Platform data directory, or `.sessiongate` in the working directory
    /// when the platform has none.
    #[must_use]
    pub fn default_state_dir() -> PathBuf {
        dirs::data_dir().map_or_else(
            || PathBuf::from(".sessiongate"),
            |dir| dir.join(env!("CARGO_PKG_NAME")),
        )
    }

    #[must_use]
    pub fn store(&self) -> SessionStore {
        SessionStore::in_dir(&self.state_dir)
    }

    /// Session manager over the file-backed store. The API timeout also
    /// bounds profile verification.
    ///
    /// # Errors
    /// Returns an error if the API URL is invalid.
    pub fn session_manager(&self) -> Result<SessionManager<HttpAuthVerifier>> {
        let verifier = HttpAuthVerifier::new(&self.api_url, self.api_timeout)?;
        let manager = SessionManager::new(verifier, self.store());
        Ok(match self.api_timeout {
            Some(timeout) => manager.with_verify_timeout(timeout),
            None => manager,
        })
    }
}
