//! Remote auth verifier: the backend REST surface that issues and validates
//! session tokens. The session manager only talks to it through
//! [`AuthVerifier`], so tests can swap in a scripted verifier.

mod http;

pub use http::{DEFAULT_API_URL, HttpAuthVerifier};

use crate::error::AuthError;
use crate::session::{AuthResponse, LoginRequest, RegisterRequest, UserProfile};
use std::{future::Future, sync::Arc};

pub trait AuthVerifier: Send + Sync {
    /// `POST /auth/login`.
    fn login(
        &self,
        request: &LoginRequest,
    ) -> impl Future<Output = Result<AuthResponse, AuthError>> + Send;

    /// `POST /auth/register`.
    fn register(
        &self,
        request: &RegisterRequest,
    ) -> impl Future<Output = Result<AuthResponse, AuthError>> + Send;

    /// `GET /auth/profile` with the bearer token. Any error means the token
    /// is not usable.
    fn profile(&self, token: &str) -> impl Future<Output = Result<UserProfile, AuthError>> + Send;
}

impl<T: AuthVerifier> AuthVerifier for Arc<T> {
    fn login(
        &self,
        request: &LoginRequest,
    ) -> impl Future<Output = Result<AuthResponse, AuthError>> + Send {
        self.as_ref().login(request)
    }

    fn register(
        &self,
        request: &RegisterRequest,
    ) -> impl Future<Output = Result<AuthResponse, AuthError>> + Send {
        self.as_ref().register(request)
    }

    fn profile(&self, token: &str) -> impl Future<Output = Result<UserProfile, AuthError>> + Send {
        self.as_ref().profile(token)
    }
}
