//! Wallet provider access.
//!
//! Absence is a normal outcome here: a missing provider, an unset account, a
//! timeout or a user rejection all collapse into `None` so the orchestrator
//! can turn them into `NoWallet` or `SignatureRejected`.

use super::{
    challenge::Challenge,
    error::HttpError,
    rpc::{JsonRpcClient, RpcError},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{future::Future, time::Duration};
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};
use url::Url;

/// How long to wait for the provider to report the selected account.
pub const DEFAULT_IDENTITY_TIMEOUT: Duration = Duration::from_millis(1_000);
/// Signing involves the user, so it gets a much longer bound.
pub const DEFAULT_SIGN_TIMEOUT: Duration = Duration::from_secs(120);

/// The account currently selected in the wallet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletIdentity {
    pub account_address: String,
    pub public_key: String,
}

/// A non-empty signature over a challenge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature(String);

impl Signature {
    /// `None` when the provider handed back an empty string.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("wallet provider unavailable: {0}")]
    Unavailable(String),
    #[error("wallet provider error {code}: {message}")]
    Rejected { code: i64, message: String },
    #[error("invalid wallet provider response: {0}")]
    InvalidResponse(String),
}

impl From<RpcError> for ProviderError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Unavailable(message) => Self::Unavailable(message),
            RpcError::Remote { code, message } => Self::Rejected { code, message },
            RpcError::InvalidResponse(message) => Self::InvalidResponse(message),
        }
    }
}

/// The external wallet. `Ok(None)` means "nothing to report".
pub trait WalletProvider: Send + Sync {
    fn accounts(
        &self,
    ) -> impl Future<Output = Result<Option<WalletIdentity>, ProviderError>> + Send;

    fn personal_sign(
        &self,
        message: &str,
    ) -> impl Future<Output = Result<Option<String>, ProviderError>> + Send;
}

#[derive(Debug)]
pub struct WalletAdapter<P> {
    provider: P,
    identity_timeout: Duration,
    sign_timeout: Duration,
}

impl<P: WalletProvider> WalletAdapter<P> {
    pub const fn new(provider: P) -> Self {
        Self {
            provider,
            identity_timeout: DEFAULT_IDENTITY_TIMEOUT,
            sign_timeout: DEFAULT_SIGN_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_identity_timeout(mut self, identity_timeout: Duration) -> Self {
        self.identity_timeout = identity_timeout;
        self
    }

    #[must_use]
    pub const fn with_sign_timeout(mut self, sign_timeout: Duration) -> Self {
        self.sign_timeout = sign_timeout;
        self
    }

    /// The currently selected wallet identity, or `None` when the provider
    /// is missing, slow, or has nothing selected.
    #[instrument(skip(self))]
    pub async fn identity(&self) -> Option<WalletIdentity> {
        match timeout(self.identity_timeout, self.provider.accounts()).await {
            Err(_) => {
                warn!(timeout = ?self.identity_timeout, "Wallet provider did not answer in time");
                None
            }
            Ok(Err(err)) => {
                warn!("Wallet provider unavailable: {err}");
                None
            }
            Ok(Ok(Some(identity))) if !identity.account_address.is_empty() => {
                debug!(address = %identity.account_address, "Wallet identity resolved");
                Some(identity)
            }
            Ok(Ok(_)) => {
                debug!("Wallet has no selected account");
                None
            }
        }
    }

    /// Ask the wallet to sign `challenge`. Errors, timeouts and rejections are
    /// all `None`.
    #[instrument(skip_all)]
    pub async fn sign(&self, challenge: &Challenge) -> Option<Signature> {
        match timeout(
            self.sign_timeout,
            self.provider.personal_sign(challenge.as_str()),
        )
        .await
        {
            Err(_) => {
                warn!(timeout = ?self.sign_timeout, "Wallet did not sign in time");
                None
            }
            Ok(Err(err)) => {
                warn!("Wallet refused to sign: {err}");
                None
            }
            Ok(Ok(signature)) => signature.and_then(Signature::new),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountsResult {
    #[serde(default)]
    selected_account: Option<WalletIdentity>,
}

#[derive(Deserialize)]
struct SignResult {
    #[serde(default)]
    response: Option<SignResponse>,
}

#[derive(Deserialize)]
struct SignResponse {
    #[serde(default)]
    signature: Option<String>,
}

/// Wallet reached over JSON-RPC (`ncog_accounts`, `ncog_personalSign`).
#[derive(Debug)]
pub struct JsonRpcWalletProvider {
    rpc: JsonRpcClient,
}

impl JsonRpcWalletProvider {
    /// # Errors
    /// Returns `HttpError` if the HTTP client cannot be built.
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, HttpError> {
        Ok(Self {
            rpc: JsonRpcClient::new(endpoint, timeout)?,
        })
    }
}

impl WalletProvider for JsonRpcWalletProvider {
    async fn accounts(&self) -> Result<Option<WalletIdentity>, ProviderError> {
        let result: Option<AccountsResult> = self.rpc.call("ncog_accounts", json!([])).await?;
        Ok(result.and_then(|result| result.selected_account))
    }

    async fn personal_sign(&self, message: &str) -> Result<Option<String>, ProviderError> {
        let result: Option<SignResult> = self
            .rpc
            .call("ncog_personalSign", json!({ "userMessage": message }))
            .await?;
        Ok(result
            .and_then(|result| result.response)
            .and_then(|response| response.signature))
    }
}
