//! Wallet address to selectable accounts.

use super::{
    error::HttpError,
    rpc::{JsonRpcClient, RpcError},
    wallet::WalletIdentity,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::{fmt, future::Future, time::Duration};
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("account directory unavailable: {0}")]
    Unavailable(String),
    #[error("account directory error {code}: {message}")]
    Rejected { code: i64, message: String },
    #[error("invalid account directory response: {0}")]
    InvalidResponse(String),
}

impl From<RpcError> for DirectoryError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Unavailable(message) => Self::Unavailable(message),
            RpcError::Remote { code, message } => Self::Rejected { code, message },
            RpcError::InvalidResponse(message) => Self::InvalidResponse(message),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Inactive,
}

impl AccountStatus {
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        })
    }
}

/// One raw record as the directory returns it.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryRecord {
    #[serde(deserialize_with = "id_string")]
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub name: String,
    #[serde(deserialize_with = "status_flag")]
    pub status: AccountStatus,
    #[serde(default, deserialize_with = "id_string")]
    pub creation_date: String,
}

// Contract values arrive as decimal strings or plain numbers. JSON numbers
// past 64 bits have already lost precision here, so they are refused rather
// than rounded.
fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(value) => Ok(value),
        Value::Number(value) => match (value.as_u64(), value.as_i64()) {
            (Some(n), _) => Ok(n.to_string()),
            (None, Some(n)) => Ok(n.to_string()),
            (None, None) => Err(serde::de::Error::custom(format!(
                "{value} is not a 64-bit integer; send large ids as decimal strings"
            ))),
        },
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

fn status_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<AccountStatus, D::Error> {
    let active = match Value::deserialize(deserializer)? {
        Value::Bool(value) => value,
        Value::Number(value) => value.as_f64().is_some_and(|n| n != 0.0),
        Value::String(value) => matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "active" | "true" | "1"
        ),
        _ => false,
    };
    Ok(if active {
        AccountStatus::Active
    } else {
        AccountStatus::Inactive
    })
}

/// A selectable account. `id` is the record's position in the directory
/// answer and only means something within one resolver call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub id: usize,
    pub user_id: String,
    pub user_name: String,
    pub domain: String,
    pub name: String,
    pub email: String,
    pub status: AccountStatus,
    pub creation_date: String,
}

impl UserAccount {
    fn from_record(id: usize, record: DirectoryRecord) -> Self {
        Self {
            id,
            email: record.user_name.clone(),
            user_id: record.user_id,
            user_name: record.user_name,
            domain: record.domain,
            name: record.name,
            status: record.status,
            creation_date: record.creation_date,
        }
    }
}

/// External lookup of the accounts registered for a wallet address.
pub trait Directory: Send + Sync {
    fn accounts_for(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<Vec<DirectoryRecord>, DirectoryError>> + Send;
}

#[derive(Debug)]
pub struct AccountResolver<D> {
    directory: D,
}

impl<D: Directory> AccountResolver<D> {
    pub const fn new(directory: D) -> Self {
        Self { directory }
    }

    /// Active accounts for `identity` in directory order. An empty list is a
    /// successful answer.
    ///
    /// # Errors
    /// Returns `DirectoryError` only when the lookup itself fails.
    #[instrument(skip_all, fields(address = %identity.account_address))]
    pub async fn resolve(&self, identity: &WalletIdentity) -> Result<Vec<UserAccount>, DirectoryError> {
        let records = self.directory.accounts_for(&identity.account_address).await?;
        let total = records.len();

        let accounts: Vec<UserAccount> = records
            .into_iter()
            .enumerate()
            .map(|(id, record)| UserAccount::from_record(id, record))
            .filter(|account| account.status.is_active())
            .collect();

        debug!(total, active = accounts.len(), "Accounts resolved");
        Ok(accounts)
    }
}

/// Directory gateway reached over JSON-RPC (`getUserDetailsForWallet`).
#[derive(Debug)]
pub struct JsonRpcDirectory {
    rpc: JsonRpcClient,
}

impl JsonRpcDirectory {
    /// # Errors
    /// Returns `HttpError` if the HTTP client cannot be built.
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, HttpError> {
        Ok(Self {
            rpc: JsonRpcClient::new(endpoint, timeout)?,
        })
    }
}

impl Directory for JsonRpcDirectory {
    async fn accounts_for(&self, address: &str) -> Result<Vec<DirectoryRecord>, DirectoryError> {
        let records: Option<Vec<DirectoryRecord>> = self
            .rpc
            .call("getUserDetailsForWallet", json!([address]))
            .await?;
        Ok(records.unwrap_or_default())
    }
}
