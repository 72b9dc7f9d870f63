use std::fmt;
use thiserror::Error;

/// Transport-level failure of a JSON call against the authorization server.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum HttpError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Timeout: {0}")]
    Timeout(String),
    #[error("Request failed ({status}): {message}")]
    Http { status: u16, message: String },
    #[error("Response error: {0}")]
    Parse(String),
    #[error("Request error: {0}")]
    Serialization(String),
}

/// Malformed inbound authorization parameters.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("missing required parameter: {0}")]
    Missing(&'static str),
    #[error("invalid redirect_uri: {0}")]
    InvalidRedirectUri(String),
    #[error("unsupported code_challenge_method: {0}")]
    UnsupportedChallengeMethod(String),
}

/// Server-side rejection of a wallet signature.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AuthVerificationError {
    #[error("signature verification rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("verification returned state {returned:?}, expected {expected:?}")]
    StateMismatch { expected: String, returned: String },
    #[error(transparent)]
    Transport(HttpError),
}

impl From<HttpError> for AuthVerificationError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Http { status, message } => Self::Rejected { status, message },
            other => Self::Transport(other),
        }
    }
}

/// Failure to redeem an authorization code.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TokenExchangeError {
    #[error("token exchange rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("token response has no access_token")]
    MissingAccessToken,
    #[error(transparent)]
    Transport(HttpError),
}

impl From<HttpError> for TokenExchangeError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Http { status, message } => Self::Rejected { status, message },
            other => Self::Transport(other),
        }
    }
}

/// Misuse of the account-selection step.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("no account selected")]
    NothingSelected,
    #[error("no selectable account matches {0:?}")]
    UnknownAccount(String),
    #[error("account selection is closed in state {0}")]
    NotAwaitingSelection(&'static str),
}

/// Terminal failure kinds surfaced to the surrounding application.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureKind {
    InvalidRequest,
    NoWallet,
    NoAccounts,
    NetworkError,
    SignatureRejected,
    VerificationFailed,
    TokenExchangeError,
}

/// What has to happen before another attempt can succeed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Retry {
    /// The caller must send corrected parameters.
    FixRequest,
    /// The user has to act first (install or unlock a wallet, approve, provision an account).
    AfterUserAction,
    /// Transient; run a new attempt from `Start`.
    RestartAttempt,
    /// Only a new challenge or a new code can succeed; never resubmit the old proof.
    FreshProof,
}

impl FailureKind {
    #[must_use]
    pub const fn retry(self) -> Retry {
        match self {
            Self::InvalidRequest => Retry::FixRequest,
            Self::NoWallet | Self::NoAccounts | Self::SignatureRejected => Retry::AfterUserAction,
            Self::NetworkError => Retry::RestartAttempt,
            Self::VerificationFailed | Self::TokenExchangeError => Retry::FreshProof,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::NoWallet => "no_wallet",
            Self::NoAccounts => "no_accounts",
            Self::NetworkError => "network_error",
            Self::SignatureRejected => "signature_rejected",
            Self::VerificationFailed => "verification_failed",
            Self::TokenExchangeError => "token_exchange_error",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure kind plus a human-readable status. The kind is the contract.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct FlowFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl FlowFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<RequestError> for FlowFailure {
    fn from(err: RequestError) -> Self {
        Self::new(FailureKind::InvalidRequest, err.to_string())
    }
}

impl From<AuthVerificationError> for FlowFailure {
    fn from(err: AuthVerificationError) -> Self {
        Self::new(FailureKind::VerificationFailed, err.to_string())
    }
}

impl From<TokenExchangeError> for FlowFailure {
    fn from(err: TokenExchangeError) -> Self {
        Self::new(FailureKind::TokenExchangeError, err.to_string())
    }
}
