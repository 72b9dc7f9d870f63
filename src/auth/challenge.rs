//! `/wallet/challenge` and `/wallet/verify` against the authorization server.

use super::{
    error::{AuthVerificationError, HttpError},
    http,
    pkce::ChallengeMethod,
    request::AuthorizationRequest,
    wallet::{Signature, WalletIdentity},
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Server-issued message to be signed. Single use.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Challenge(String);

impl Challenge {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Code issued after a successful verification. Single use and short-lived.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationCode(String);

impl AuthorizationCode {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Serialize)]
struct ChallengeBody<'a> {
    client_id: &'a str,
    redirect_uri: &'a str,
    state: &'a str,
    code_challenge: &'a str,
    code_challenge_method: ChallengeMethod,
}

#[derive(Deserialize)]
struct ChallengeResponse {
    challenge: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyBody<'a> {
    wallet_address: &'a str,
    public_key: &'a str,
    signature: &'a str,
    #[serde(rename = "client_id")]
    client_id: &'a str,
    #[serde(rename = "redirect_uri")]
    redirect_uri: &'a str,
    state: &'a str,
}

#[derive(Deserialize)]
struct VerifyResponse {
    code: String,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ChallengeClient {
    http: Client,
    base_url: Url,
}

impl ChallengeClient {
    /// # Errors
    /// Returns `HttpError` if the HTTP client cannot be built.
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, HttpError> {
        Ok(Self {
            http: http::build_client(timeout)?,
            base_url,
        })
    }

    /// Ask the server for a challenge bound to this request.
    ///
    /// # Errors
    /// Returns `HttpError` on any transport, status or decoding failure, or
    /// when the server returns an empty challenge.
    #[instrument(skip_all, fields(client_id = %request.client_id))]
    pub async fn request_challenge(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<Challenge, HttpError> {
        let url = http::build_url(&self.base_url, "/wallet/challenge")?;
        let body = ChallengeBody {
            client_id: &request.client_id,
            redirect_uri: request.redirect_uri.as_str(),
            state: &request.state,
            code_challenge: &request.code_challenge,
            code_challenge_method: request.code_challenge_method,
        };

        let response: ChallengeResponse = http::post_json(&self.http, url, &body).await?;
        if response.challenge.is_empty() {
            return Err(HttpError::Parse("challenge is empty".to_string()));
        }

        debug!("Challenge issued");
        Ok(Challenge::new(response.challenge))
    }

    /// Submit the signed challenge. Requires a signature by construction.
    ///
    /// # Errors
    /// Returns `AuthVerificationError` when the server rejects the signature,
    /// echoes a different `state`, or cannot be reached.
    #[instrument(skip_all, fields(address = %identity.account_address))]
    pub async fn verify(
        &self,
        identity: &WalletIdentity,
        signature: &Signature,
        request: &AuthorizationRequest,
    ) -> Result<AuthorizationCode, AuthVerificationError> {
        let url = http::build_url(&self.base_url, "/wallet/verify")?;
        let body = VerifyBody {
            wallet_address: &identity.account_address,
            public_key: &identity.public_key,
            signature: signature.as_str(),
            client_id: &request.client_id,
            redirect_uri: request.redirect_uri.as_str(),
            state: &request.state,
        };

        let response: VerifyResponse = http::post_json(&self.http, url, &body).await?;

        if let Some(returned) = response.state {
            if returned != request.state {
                return Err(AuthVerificationError::StateMismatch {
                    expected: request.state.clone(),
                    returned,
                });
            }
        }

        if response.code.is_empty() {
            return Err(HttpError::Parse("authorization code is empty".to_string()).into());
        }

        debug!("Signature verified");
        Ok(AuthorizationCode::new(response.code))
    }
}
