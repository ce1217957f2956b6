//! reqwest-backed verifier. Requests and responses carry passwords and bearer
//! tokens; only method, path and status are ever logged.

use super::AuthVerifier;
use crate::error::AuthError;
use crate::session::{AuthResponse, LoginRequest, RegisterRequest, UserProfile};
use anyhow::{Context, Result, anyhow};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

pub const DEFAULT_API_URL: &str = "http://localhost:3001";
/// Maximum number of error body characters surfaced to the user.
const MAX_ERROR_CHARS: usize = 200;

#[derive(Clone, Debug)]
pub struct HttpAuthVerifier {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ProfileEnvelope {
    Wrapped { user: UserProfile },
    Bare(UserProfile),
}

impl ProfileEnvelope {
    fn into_profile(self) -> UserProfile {
        match self {
            Self::Wrapped { user } | Self::Bare(user) => user,
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<ErrorMessage>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorMessage {
    Text(String),
    List(Vec<String>),
}

impl HttpAuthVerifier {
    /// Build a verifier for the API at `base_url`. Without `timeout` a slow
    /// backend is waited on indefinitely.
    ///
    /// # Errors
    /// Returns an error if the URL is not http(s) or the client cannot be built.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let parsed =
            Url::parse(base_url).with_context(|| format!("Invalid API base URL: {base_url}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(anyhow!("API base URL must use http or https: {base_url}"));
        }

        let mut builder = Client::builder().user_agent(crate::APP_USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to build API HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, AuthError> {
        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        debug!(status = status.as_u16(), "auth api response");

        if !status.is_success() {
            return Err(AuthError::Http {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }

        serde_json::from_slice(&body)
            .map_err(|err| AuthError::Parse(format!("Failed to decode response: {err}")))
    }
}

impl AuthVerifier for HttpAuthVerifier {
    #[instrument(skip_all, fields(path = "/auth/login"))]
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, AuthError> {
        let builder = self.client.post(self.endpoint("/auth/login")).json(request);
        self.send_json(builder).await
    }

    #[instrument(skip_all, fields(path = "/auth/register"))]
    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, AuthError> {
        let builder = self
            .client
            .post(self.endpoint("/auth/register"))
            .json(request);
        self.send_json(builder).await
    }

    #[instrument(skip_all, fields(path = "/auth/profile"))]
    async fn profile(&self, token: &str) -> Result<UserProfile, AuthError> {
        let builder = self
            .client
            .get(self.endpoint("/auth/profile"))
            .bearer_auth(token);
        let envelope: ProfileEnvelope = self.send_json(builder).await?;
        Ok(envelope.into_profile())
    }
}

fn map_transport_error(err: reqwest::Error) -> AuthError {
    if err.is_timeout() {
        AuthError::Timeout("the auth service did not answer in time".to_string())
    } else {
        AuthError::Network(err.without_url().to_string())
    }
}

fn error_message(status: StatusCode, body: &[u8]) -> String {
    let message = serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|body| body.message)
        .map(|message| match message {
            ErrorMessage::Text(text) => text,
            ErrorMessage::List(items) => items.join(", "),
        })
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });
    truncate_chars(message.trim(), MAX_ERROR_CHARS)
}

fn truncate_chars(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((index, _)) => format!("{}...", &value[..index]),
        None => value.to_string(),
    }
}
