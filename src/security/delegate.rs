//! Bearer-token verification by delegation.
//!
//! The delegate does one network round trip per verification: a GET to the
//! external profile endpoint with the caller's token. There is no retry and
//! no caching; every request re-verifies.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use super::claims::Claims;

/// Upper bound on one verification round trip.
const VERIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a token failed verification.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("empty bearer token")]
    EmptyToken,
    #[error("auth service unreachable: {0}")]
    Unreachable(String),
    #[error("auth service rejected token: {0}")]
    Rejected(StatusCode),
    #[error("failed to decode auth response: {0}")]
    Decode(String),
    #[error("auth service returned an empty subject id")]
    InvalidIdentity,
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    #[serde(default)]
    data: ProfileData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProfileData {
    id: String,
    username: String,
    email: String,
}

/// Client for the external identity service's profile endpoint.
#[derive(Debug, Clone)]
pub struct AuthDelegate {
    http: reqwest::Client,
    profile_url: String,
}

impl AuthDelegate {
    /// Create a delegate for the given profile URL.
    pub fn new(profile_url: String) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder().timeout(VERIFY_TIMEOUT).build()?;
        Ok(Self { http, profile_url })
    }

    /// Verify a bearer token, returning the caller's claims.
    pub async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::EmptyToken);
        }

        let response = self
            .http
            .get(&self.profile_url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;

        if response.status() != StatusCode::OK {
            return Err(AuthError::Rejected(response.status()));
        }

        let profile: ProfileResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Decode(e.to_string()))?;

        if profile.data.id.is_empty() {
            return Err(AuthError::InvalidIdentity);
        }

        Ok(Claims {
            subject: profile.data.id,
            username: profile.data.username,
            email: profile.data.email,
        })
    }
}
