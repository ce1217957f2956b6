//! Unverified JWT payload decode for the edge guard.
//!
//! The signature is NOT checked. Anyone can mint a token whose payload says
//! `"role": "admin"` and get past the edge guard; the render-time role gate
//! and the backend remain the authority. Use this only to decide redirects.

use base64ct::{Base64UrlUnpadded, Encoding};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClaimsError {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct RoleClaims {
    #[serde(default)]
    role: Option<String>,
}

/// Read the `role` claim from a compact JWT without verifying it.
///
/// # Errors
/// Returns an error if the token is not three dot-separated segments or the
/// payload is not base64url JSON.
pub fn decode_role_unverified(token: &str) -> Result<Option<String>, ClaimsError> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(ClaimsError::TokenFormat);
    };
    if payload.is_empty() {
        return Err(ClaimsError::TokenFormat);
    }

    let bytes = Base64UrlUnpadded::decode_vec(payload.trim_end_matches('='))
        .map_err(|_| ClaimsError::Base64)?;
    let claims: RoleClaims = serde_json::from_slice(&bytes)?;
    Ok(claims.role)
}

#[cfg(test)]
pub(crate) fn unsigned_token(payload: &serde_json::Value) -> String {
    let header = Base64UrlUnpadded::encode_string(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = Base64UrlUnpadded::encode_string(payload.to_string().as_bytes());
    format!("{header}.{body}.c2lnbmF0dXJl")
}
