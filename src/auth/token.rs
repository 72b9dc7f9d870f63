//! Authorization code redemption at `/oauth/token`.

use super::{
    challenge::AuthorizationCode,
    error::{HttpError, TokenExchangeError},
    http,
};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{fmt, time::Duration};
use tracing::{debug, instrument};
use url::Url;

/// Tokens issued by the authorization server. Unknown fields are kept.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenSet {
    #[must_use]
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: Some("Bearer".to_string()),
            expires_in: None,
            refresh_token: None,
            id_token: None,
            extra: Map::new(),
        }
    }
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"[redacted]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

/// Inputs of one exchange. `code_verifier` must be the verifier whose
/// challenge was sent with the original authorization request.
pub struct ExchangeParams<'a> {
    pub code: &'a AuthorizationCode,
    pub client_id: &'a str,
    pub redirect_uri: Option<&'a Url>,
    pub code_verifier: &'a str,
    pub client_secret: Option<&'a SecretString>,
}

#[derive(Serialize)]
struct TokenBody<'a> {
    grant_type: &'static str,
    code: &'a str,
    client_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect_uri: Option<&'a str>,
    code_verifier: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_secret: Option<&'a str>,
}

#[derive(Clone, Debug)]
pub struct TokenClient {
    http: Client,
    base_url: Url,
}

impl TokenClient {
    /// # Errors
    /// Returns `HttpError` if the HTTP client cannot be built.
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, HttpError> {
        Ok(Self {
            http: http::build_client(timeout)?,
            base_url,
        })
    }

    /// Redeem `code` for a token set.
    ///
    /// # Errors
    /// Returns `TokenExchangeError` for any non-success answer, a missing
    /// access token, or a transport failure.
    #[instrument(skip_all, fields(client_id = %params.client_id))]
    pub async fn exchange(&self, params: ExchangeParams<'_>) -> Result<TokenSet, TokenExchangeError> {
        let url = http::build_url(&self.base_url, "/oauth/token")?;
        let body = TokenBody {
            grant_type: "authorization_code",
            code: params.code.as_str(),
            client_id: params.client_id,
            redirect_uri: params.redirect_uri.map(Url::as_str),
            code_verifier: params.code_verifier,
            client_secret: params.client_secret.map(|secret| secret.expose_secret()),
        };

        let tokens: TokenSet = http::post_json(&self.http, url, &body).await?;
        if tokens.access_token.is_empty() {
            return Err(TokenExchangeError::MissingAccessToken);
        }

        debug!(token_type = ?tokens.token_type, "Authorization code redeemed");
        Ok(tokens)
    }
}
