//! Relying-party side: start an authorization and redeem the code that comes
//! back on the callback.
//!
//! The callback runs its own small machine, `Start -> Exchanging -> Terminal`.
//! The pending verifier is consumed on entry, so a replayed callback can
//! never reuse it.

use super::{
    challenge::AuthorizationCode,
    error::{FailureKind, FlowFailure, HttpError},
    http,
    pkce::{ChallengeMethod, PkceMaterial},
    token::{ExchangeParams, TokenClient, TokenSet},
};
use crate::session::{PendingAuthorization, SessionError, SessionStore};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use secrecy::SecretString;
use std::{fmt, time::Duration};
use tracing::{debug, info, info_span, warn, Instrument};
use ulid::Ulid;
use url::Url;

const STATE_BYTES: usize = 16;

/// Static client registration of the relying party.
#[derive(Clone)]
pub struct ClientConfig {
    pub api_url: Url,
    pub client_id: String,
    pub client_secret: Option<SecretString>,
    pub redirect_uri: Url,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_url", &self.api_url.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[redacted]"))
            .field("redirect_uri", &self.redirect_uri.as_str())
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExchangeState {
    Start,
    Exchanging,
    Terminal(ExchangeOutcome),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// Tokens are stored in the session.
    Success,
    /// Nothing was stored; the user goes back to the entry point.
    Failure(FlowFailure),
}

#[derive(Debug)]
pub struct RelyingParty {
    config: ClientConfig,
    authorize_url: Url,
    tokens: TokenClient,
    session: SessionStore,
}

impl RelyingParty {
    /// # Errors
    /// Returns `HttpError` if the HTTP client cannot be built.
    pub fn new(config: ClientConfig, session: SessionStore, timeout: Duration) -> Result<Self, HttpError> {
        Ok(Self {
            authorize_url: http::build_url(&config.api_url, "/authorize")?,
            tokens: TokenClient::new(config.api_url.clone(), timeout)?,
            config,
            session,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub const fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Generate fresh PKCE material and state, remember them, and return
    /// the authorize URL to send the user to.
    ///
    /// # Errors
    /// Returns `SessionError` if the pending authorization cannot be stored.
    pub fn begin_authorization(&self) -> Result<Url, SessionError> {
        let pkce = PkceMaterial::generate();
        let state = generate_state();

        let mut target = self.authorize_url.clone();
        target
            .query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", self.config.redirect_uri.as_str())
            .append_pair("state", &state)
            .append_pair("code_challenge", pkce.challenge())
            .append_pair("code_challenge_method", ChallengeMethod::S256.as_str());

        self.session.save_pending(&PendingAuthorization {
            state,
            code_verifier: pkce.into_verifier(),
            redirect_uri: self.config.redirect_uri.to_string(),
        })?;

        info!("Authorization started");
        Ok(target)
    }

    /// Handle the callback query pairs. Always terminal on return.
    pub async fn complete<I, K, V>(&self, pairs: I) -> ExchangeOutcome
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let span = info_span!("callback", attempt_id = %Ulid::new());
        CallbackFlow::new(self)
            .run(CallbackParams::from_pairs(pairs))
            .instrument(span)
            .await
    }
}

#[derive(Debug, Default)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

impl CallbackParams {
    fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_ref() {
                "code" => &mut params.code,
                "state" => &mut params.state,
                "error" => &mut params.error,
                _ => continue,
            };
            if slot.is_none() && !value.as_ref().is_empty() {
                *slot = Some(value.as_ref().to_string());
            }
        }
        params
    }
}

struct CallbackFlow<'a> {
    party: &'a RelyingParty,
    state: ExchangeState,
}

impl<'a> CallbackFlow<'a> {
    const fn new(party: &'a RelyingParty) -> Self {
        Self {
            party,
            state: ExchangeState::Start,
        }
    }

    async fn run(mut self, params: CallbackParams) -> ExchangeOutcome {
        let outcome = match self.exchange(params).await {
            Ok(()) => ExchangeOutcome::Success,
            Err(failure) => {
                warn!(kind = %failure.kind, "Callback failed: {}", failure.message);
                ExchangeOutcome::Failure(failure)
            }
        };
        self.transition(ExchangeState::Terminal(outcome.clone()));
        outcome
    }

    fn transition(&mut self, next: ExchangeState) {
        debug!(from = ?self.state, to = ?next, "Callback state changed");
        self.state = next;
    }

    async fn exchange(&mut self, params: CallbackParams) -> Result<(), FlowFailure> {
        let party = self.party;
        let session = &party.session;
        let pending = session.take_pending().map_err(|err| {
            FlowFailure::new(FailureKind::InvalidRequest, format!("Unreadable pending authorization: {err}"))
        })?;

        if let Some(error) = params.error {
            return Err(FlowFailure::new(
                FailureKind::InvalidRequest,
                format!("Authorization server returned error: {error}"),
            ));
        }

        let (Some(code), Some(returned_state)) = (params.code, params.state) else {
            return Err(FlowFailure::new(
                FailureKind::InvalidRequest,
                "Callback is missing code or state.",
            ));
        };

        let Some(pending) = pending else {
            return Err(FlowFailure::new(
                FailureKind::InvalidRequest,
                "No authorization in progress.",
            ));
        };

        if returned_state != pending.state {
            return Err(FlowFailure::new(
                FailureKind::InvalidRequest,
                "Callback state does not match the pending authorization.",
            ));
        }

        let redirect_uri = Url::parse(&pending.redirect_uri).ok();
        let code = AuthorizationCode::new(code);

        self.transition(ExchangeState::Exchanging);
        let tokens: TokenSet = party
            .tokens
            .exchange(ExchangeParams {
                code: &code,
                client_id: &party.config.client_id,
                redirect_uri: redirect_uri.as_ref(),
                code_verifier: &pending.code_verifier,
                client_secret: party.config.client_secret.as_ref(),
            })
            .await?;

        session.save(&tokens).map_err(|err| {
            FlowFailure::new(
                FailureKind::TokenExchangeError,
                format!("Failed to store tokens: {err}"),
            )
        })?;

        info!("Signed in");
        Ok(())
    }
}

fn generate_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    Base64UrlUnpadded::encode_string(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::pkce::derive_challenge;
    use serde_json::json;
    use std::net::TcpListener;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn can_bind_localhost() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    fn party(api_url: &str) -> RelyingParty {
        RelyingParty::new(
            ClientConfig {
                api_url: Url::parse(api_url).unwrap(),
                client_id: "abc".to_string(),
                client_secret: Some(SecretString::from("s3cret")),
                redirect_uri: Url::parse("http://localhost:3000/callback").unwrap(),
            },
            SessionStore::in_memory(),
            Duration::from_secs(2),
        )
        .unwrap()
    }

    fn query(url: &Url, key: &str) -> Option<String> {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    #[test]
    fn begin_authorization_builds_authorize_url_and_remembers_verifier() {
        let party = party("https://auth.example/api");
        let target = party.begin_authorization().unwrap();

        assert_eq!(target.path(), "/api/authorize");
        assert_eq!(query(&target, "response_type").as_deref(), Some("code"));
        assert_eq!(query(&target, "client_id").as_deref(), Some("abc"));
        assert_eq!(
            query(&target, "redirect_uri").as_deref(),
            Some("http://localhost:3000/callback")
        );
        assert_eq!(query(&target, "code_challenge_method").as_deref(), Some("S256"));

        let pending = party.session().take_pending().unwrap().unwrap();
        assert_eq!(query(&target, "state"), Some(pending.state));
        assert_eq!(
            query(&target, "code_challenge"),
            Some(derive_challenge(&pending.code_verifier))
        );
    }

    #[tokio::test]
    async fn state_mismatch_is_rejected_and_consumes_pending() {
        let party = party("http://127.0.0.1:9");
        party.begin_authorization().unwrap();

        let outcome = party.complete([("code", "auth123"), ("state", "forged")]).await;
        assert!(matches!(
            outcome,
            ExchangeOutcome::Failure(FlowFailure { kind: FailureKind::InvalidRequest, .. })
        ));
        assert_eq!(party.session().take_pending().unwrap(), None);
        assert!(!party.session().is_authenticated());
    }

    #[tokio::test]
    async fn missing_code_is_invalid_request() {
        let party = party("http://127.0.0.1:9");
        let outcome = party.complete([("state", "xyz")]).await;
        assert!(matches!(
            outcome,
            ExchangeOutcome::Failure(FlowFailure { kind: FailureKind::InvalidRequest, .. })
        ));
    }

    #[tokio::test]
    async fn successful_exchange_stores_tokens() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        let party = party(&server.uri());
        let target = party.begin_authorization().unwrap();
        let state = query(&target, "state").unwrap();

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_partial_json(json!({
                "grant_type": "authorization_code",
                "code": "auth123",
                "client_id": "abc",
                "client_secret": "s3cret",
                "redirect_uri": "http://localhost:3000/callback"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "at",
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = party
            .complete([("code", "auth123"), ("state", state.as_str())])
            .await;
        assert_eq!(outcome, ExchangeOutcome::Success);
        assert_eq!(
            party.session().authorization_header().as_deref(),
            Some("Bearer at")
        );
    }
}
