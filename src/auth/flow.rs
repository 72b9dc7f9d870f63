//! The wallet-side login state machine.
//!
//! ```text
//! Start -> ResolvingAccounts -> AwaitingSelection -> RequestingChallenge
//!       -> AwaitingSignature -> Verifying -> Redirecting -> Terminal
//! ```
//!
//! One `LoginFlow` is one attempt. Operations only act in the state they
//! belong to, so a duplicate trigger is a no-op and a dropped attempt can
//! never observe a late response.

use super::{
    accounts::{AccountResolver, Directory, UserAccount},
    challenge::ChallengeClient,
    error::{FailureKind, FlowFailure, SelectionError},
    request::AuthorizationRequest,
    wallet::{WalletAdapter, WalletIdentity, WalletProvider},
};
use std::fmt;
use tracing::{info, info_span, warn, Instrument, Span};
use ulid::Ulid;

/// Long-lived collaborators shared by every attempt.
#[derive(Debug)]
pub struct LoginServices<W, D> {
    pub wallet: WalletAdapter<W>,
    pub resolver: AccountResolver<D>,
    pub challenges: ChallengeClient,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlowOutcome {
    /// Where to send the user agent: `redirect_uri?code=..&state=..`.
    Success(String),
    Failure(FlowFailure),
}

impl FlowOutcome {
    #[must_use]
    pub const fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Success(_) => None,
            Self::Failure(failure) => Some(failure.kind),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlowState {
    Start,
    ResolvingAccounts,
    AwaitingSelection,
    RequestingChallenge,
    AwaitingSignature,
    Verifying,
    Redirecting,
    Terminal(FlowOutcome),
}

impl FlowState {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::ResolvingAccounts => "resolving_accounts",
            Self::AwaitingSelection => "awaiting_selection",
            Self::RequestingChallenge => "requesting_challenge",
            Self::AwaitingSignature => "awaiting_signature",
            Self::Verifying => "verifying",
            Self::Redirecting => "redirecting",
            Self::Terminal(_) => "terminal",
        }
    }

    /// User-facing progress line.
    #[must_use]
    pub fn status(&self) -> String {
        match self {
            Self::Start => "Preparing authentication...".to_string(),
            Self::ResolvingAccounts => "Loading your accounts...".to_string(),
            Self::AwaitingSelection => "Select the account you want to use to sign in".to_string(),
            Self::RequestingChallenge => "Requesting challenge...".to_string(),
            Self::AwaitingSignature => "Waiting for wallet signature...".to_string(),
            Self::Verifying => "Verifying...".to_string(),
            Self::Redirecting => "Redirecting...".to_string(),
            Self::Terminal(FlowOutcome::Success(_)) => "Authenticated.".to_string(),
            Self::Terminal(FlowOutcome::Failure(failure)) => failure.message.clone(),
        }
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal(_))
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

type Observer<'a> = Box<dyn FnMut(&FlowState) + Send + 'a>;

pub struct LoginFlow<'a, W, D> {
    services: &'a LoginServices<W, D>,
    attempt_id: Ulid,
    span: Span,
    request: Option<AuthorizationRequest>,
    identity: Option<WalletIdentity>,
    accounts: Vec<UserAccount>,
    selected: Option<usize>,
    state: FlowState,
    observer: Option<Observer<'a>>,
}

impl<'a, W: WalletProvider, D: Directory> LoginFlow<'a, W, D> {
    /// Begin an attempt from an authorize URL or query string. Malformed
    /// parameters end the attempt immediately with `InvalidRequest`.
    pub fn start(services: &'a LoginServices<W, D>, entry: &str) -> Self {
        let attempt_id = Ulid::new();
        let span = info_span!("login_attempt", attempt_id = %attempt_id);

        let (request, state) = match AuthorizationRequest::from_entry(entry) {
            Ok(request) => (Some(request), FlowState::Start),
            Err(err) => {
                span.in_scope(|| warn!("Rejecting authorization request: {err}"));
                (None, FlowState::Terminal(FlowOutcome::Failure(err.into())))
            }
        };

        Self {
            services,
            attempt_id,
            span,
            request,
            identity: None,
            accounts: Vec::new(),
            selected: None,
            state,
            observer: None,
        }
    }

    /// Called on every state change, e.g. to print progress lines.
    #[must_use]
    pub fn with_observer(mut self, observer: impl FnMut(&FlowState) + Send + 'a) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    #[must_use]
    pub const fn attempt_id(&self) -> Ulid {
        self.attempt_id
    }

    #[must_use]
    pub const fn state(&self) -> &FlowState {
        &self.state
    }

    #[must_use]
    pub const fn request(&self) -> Option<&AuthorizationRequest> {
        self.request.as_ref()
    }

    #[must_use]
    pub const fn identity(&self) -> Option<&WalletIdentity> {
        self.identity.as_ref()
    }

    #[must_use]
    pub const fn outcome(&self) -> Option<&FlowOutcome> {
        match &self.state {
            FlowState::Terminal(outcome) => Some(outcome),
            _ => None,
        }
    }

    /// Active accounts offered for selection, in directory order.
    #[must_use]
    pub fn accounts(&self) -> &[UserAccount] {
        &self.accounts
    }

    #[must_use]
    pub fn selected(&self) -> Option<&UserAccount> {
        let id = self.selected?;
        self.accounts.iter().find(|account| account.id == id)
    }

    /// Look up the wallet identity and its accounts. Runs at most once per
    /// attempt; outside `Start` it does nothing.
    pub async fn resolve_accounts(&mut self) -> &FlowState {
        if self.state != FlowState::Start {
            return &self.state;
        }
        let span = self.span.clone();
        self.resolve_inner().instrument(span).await;
        &self.state
    }

    async fn resolve_inner(&mut self) {
        let services = self.services;
        self.transition(FlowState::ResolvingAccounts);

        let Some(identity) = services.wallet.identity().await else {
            self.fail(FailureKind::NoWallet, "No wallet found. Install or unlock your wallet.");
            return;
        };

        match services.resolver.resolve(&identity).await {
            Err(err) => {
                self.fail(FailureKind::NetworkError, format!("Failed to load accounts: {err}"));
            }
            Ok(accounts) if accounts.is_empty() => {
                self.identity = Some(identity);
                self.fail(
                    FailureKind::NoAccounts,
                    "No active accounts found for this wallet address.",
                );
            }
            Ok(accounts) => {
                info!(accounts = accounts.len(), "Awaiting account selection");
                self.identity = Some(identity);
                self.accounts = accounts;
                self.transition(FlowState::AwaitingSelection);
            }
        }
    }

    /// Select by ordinal id. May be called any number of times before
    /// `confirm`; the latest selection wins.
    ///
    /// # Errors
    /// Returns `SelectionError` outside `AwaitingSelection` or for an id
    /// that is not in the offered list.
    pub fn select(&mut self, id: usize) -> Result<&UserAccount, SelectionError> {
        self.ensure_selecting()?;
        let account = self
            .accounts
            .iter()
            .find(|account| account.id == id)
            .ok_or_else(|| SelectionError::UnknownAccount(id.to_string()))?;
        self.selected = Some(account.id);
        Ok(account)
    }

    /// Select by the directory's `userId`.
    ///
    /// # Errors
    /// Same as [`LoginFlow::select`].
    pub fn select_user(&mut self, user_id: &str) -> Result<&UserAccount, SelectionError> {
        self.ensure_selecting()?;
        let account = self
            .accounts
            .iter()
            .find(|account| account.user_id == user_id)
            .ok_or_else(|| SelectionError::UnknownAccount(user_id.to_string()))?;
        self.selected = Some(account.id);
        Ok(account)
    }

    fn ensure_selecting(&self) -> Result<(), SelectionError> {
        if self.state == FlowState::AwaitingSelection {
            Ok(())
        } else {
            Err(SelectionError::NotAwaitingSelection(self.state.name()))
        }
    }

    /// Run challenge, signature and verification for the selected account
    /// and finish the attempt.
    ///
    /// # Errors
    /// Returns `SelectionError` when called outside `AwaitingSelection` or
    /// before an account is selected; the attempt is left untouched then.
    pub async fn confirm(&mut self) -> Result<FlowOutcome, SelectionError> {
        self.ensure_selecting()?;
        if self.selected().is_none() {
            return Err(SelectionError::NothingSelected);
        }

        let span = self.span.clone();
        let outcome = match self.authenticate().instrument(span).await {
            Ok(target) => FlowOutcome::Success(target),
            Err(failure) => FlowOutcome::Failure(failure),
        };

        self.transition(FlowState::Terminal(outcome.clone()));
        Ok(outcome)
    }

    async fn authenticate(&mut self) -> Result<String, FlowFailure> {
        let services = self.services;
        let (Some(request), Some(identity)) = (self.request.clone(), self.identity.clone()) else {
            return Err(FlowFailure::new(
                FailureKind::InvalidRequest,
                "Authentication was not prepared.",
            ));
        };

        self.transition(FlowState::RequestingChallenge);
        let challenge = services
            .challenges
            .request_challenge(&request)
            .await
            .map_err(|err| {
                FlowFailure::new(
                    FailureKind::NetworkError,
                    format!("Failed to request challenge: {err}"),
                )
            })?;

        self.transition(FlowState::AwaitingSignature);
        let signature = services.wallet.sign(&challenge).await.ok_or_else(|| {
            FlowFailure::new(
                FailureKind::SignatureRejected,
                "Signature rejected or wallet unavailable.",
            )
        })?;

        self.transition(FlowState::Verifying);
        let code = services
            .challenges
            .verify(&identity, &signature, &request)
            .await?;

        self.transition(FlowState::Redirecting);
        Ok(request.redirect_target(code.as_str()))
    }

    fn fail(&mut self, kind: FailureKind, message: impl Into<String>) {
        let failure = FlowFailure::new(kind, message);
        warn!(kind = %failure.kind, "Login attempt failed: {}", failure.message);
        self.transition(FlowState::Terminal(FlowOutcome::Failure(failure)));
    }

    fn transition(&mut self, next: FlowState) {
        self.span
            .in_scope(|| info!(from = self.state.name(), to = next.name(), "Login state changed"));
        self.state = next;
        if let Some(observer) = self.observer.as_mut() {
            observer(&self.state);
        }
    }
}

impl<W, D> fmt::Debug for LoginFlow<'_, W, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginFlow")
            .field("attempt_id", &self.attempt_id)
            .field("state", &self.state)
            .field("accounts", &self.accounts.len())
            .field("selected", &self.selected)
            .finish_non_exhaustive()
    }
}
