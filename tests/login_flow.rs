use dauth::{
    auth::{
        accounts::{AccountStatus, DirectoryError, DirectoryRecord},
        token::ExchangeParams,
        wallet::ProviderError,
        AccountResolver, AuthorizationCode, ChallengeClient, ClientConfig, Directory,
        ExchangeOutcome, FailureKind, FlowFailure, FlowOutcome, FlowState, LoginFlow,
        LoginServices, PkceMaterial, RelyingParty, TokenClient, WalletAdapter, WalletIdentity,
        WalletProvider,
    },
    session::SessionStore,
};
use serde_json::json;
use std::{
    net::TcpListener,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use url::Url;
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ENTRY: &str =
    "client_id=abc&redirect_uri=https://app/cb&state=xyz&code_challenge=Q&code_challenge_method=S256";

fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

#[derive(Default)]
struct TestWallet {
    absent: bool,
    refuses_to_sign: bool,
    signed: Arc<Mutex<Vec<String>>>,
}

impl WalletProvider for TestWallet {
    async fn accounts(&self) -> Result<Option<WalletIdentity>, ProviderError> {
        Ok((!self.absent).then(|| WalletIdentity {
            account_address: "0xabc".to_string(),
            public_key: "pk".to_string(),
        }))
    }

    async fn personal_sign(&self, message: &str) -> Result<Option<String>, ProviderError> {
        if let Ok(mut signed) = self.signed.lock() {
            signed.push(message.to_string());
        }
        if self.refuses_to_sign {
            Ok(None)
        } else {
            Ok(Some("sig1".to_string()))
        }
    }
}

struct TestDirectory {
    records: Vec<DirectoryRecord>,
    lookups: Arc<AtomicUsize>,
}

impl Directory for TestDirectory {
    async fn accounts_for(&self, address: &str) -> Result<Vec<DirectoryRecord>, DirectoryError> {
        assert_eq!(address, "0xabc");
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.clone())
    }
}

fn record(user_id: &str, active: bool) -> DirectoryRecord {
    DirectoryRecord {
        user_id: user_id.to_string(),
        user_name: format!("{user_id}@example.com"),
        domain: "example.com".to_string(),
        name: format!("User {user_id}"),
        status: if active {
            AccountStatus::Active
        } else {
            AccountStatus::Inactive
        },
        creation_date: "1700000000".to_string(),
    }
}

fn services(
    server: &MockServer,
    wallet: TestWallet,
    records: Vec<DirectoryRecord>,
) -> (LoginServices<TestWallet, TestDirectory>, Arc<AtomicUsize>) {
    let lookups = Arc::new(AtomicUsize::new(0));
    let services = LoginServices {
        wallet: WalletAdapter::new(wallet),
        resolver: AccountResolver::new(TestDirectory {
            records,
            lookups: Arc::clone(&lookups),
        }),
        challenges: ChallengeClient::new(Url::parse(&server.uri()).unwrap(), Duration::from_secs(2))
            .unwrap(),
    };
    (services, lookups)
}

async fn mount_challenge(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/wallet/challenge"))
        .and(body_json(json!({
            "client_id": "abc",
            "redirect_uri": "https://app/cb",
            "state": "xyz",
            "code_challenge": "Q",
            "code_challenge_method": "S256"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"challenge": "c1"})))
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn mount_verify(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/wallet/verify"))
        .and(body_partial_json(json!({
            "walletAddress": "0xabc",
            "signature": "sig1",
            "state": "xyz"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": "auth123",
            "redirect_uri": "https://app/cb",
            "state": "xyz"
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn scenario_a_signed_challenge_redirects_with_code_and_state() {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return;
    }
    let server = MockServer::start().await;
    mount_challenge(&server, 1).await;
    mount_verify(&server, 1).await;

    let wallet = TestWallet::default();
    let signed = Arc::clone(&wallet.signed);
    let (services, _) = services(&server, wallet, vec![record("1", true)]);

    let mut flow = LoginFlow::start(&services, ENTRY);
    assert_eq!(flow.resolve_accounts().await, &FlowState::AwaitingSelection);
    flow.select(0).unwrap();
    let outcome = flow.confirm().await.unwrap();

    assert_eq!(
        outcome,
        FlowOutcome::Success("https://app/cb?code=auth123&state=xyz".to_string())
    );
    assert_eq!(*signed.lock().unwrap(), vec!["c1".to_string()]);
}

#[tokio::test]
async fn scenario_b_no_wallet_never_reaches_the_server() {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return;
    }
    let server = MockServer::start().await;
    mount_challenge(&server, 0).await;
    mount_verify(&server, 0).await;

    let wallet = TestWallet {
        absent: true,
        ..TestWallet::default()
    };
    let (services, lookups) = services(&server, wallet, vec![record("1", true)]);

    let mut flow = LoginFlow::start(&services, ENTRY);
    flow.resolve_accounts().await;

    assert_eq!(
        flow.outcome().and_then(FlowOutcome::failure_kind),
        Some(FailureKind::NoWallet)
    );
    assert_eq!(lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn scenario_c_no_active_accounts_requests_no_challenge() {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return;
    }
    let server = MockServer::start().await;
    mount_challenge(&server, 0).await;

    let (services, _) = services(
        &server,
        TestWallet::default(),
        vec![record("1", false), record("2", false)],
    );

    let mut flow = LoginFlow::start(&services, ENTRY);
    flow.resolve_accounts().await;

    assert_eq!(
        flow.outcome().and_then(FlowOutcome::failure_kind),
        Some(FailureKind::NoAccounts)
    );
    assert!(flow.accounts().is_empty());
}

#[tokio::test]
async fn scenario_d_missing_signature_never_verifies() {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return;
    }
    let server = MockServer::start().await;
    mount_challenge(&server, 1).await;
    mount_verify(&server, 0).await;

    let wallet = TestWallet {
        refuses_to_sign: true,
        ..TestWallet::default()
    };
    let (services, _) = services(&server, wallet, vec![record("1", true)]);

    let mut flow = LoginFlow::start(&services, ENTRY);
    flow.resolve_accounts().await;
    flow.select_user("1").unwrap();
    let outcome = flow.confirm().await.unwrap();

    assert_eq!(outcome.failure_kind(), Some(FailureKind::SignatureRejected));
}

#[tokio::test]
async fn scenario_e_mismatched_verifier_fails_the_exchange() {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return;
    }
    let server = MockServer::start().await;
    let original = PkceMaterial::generate();

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_partial_json(json!({"code_verifier": original.verifier()})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "at"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})))
        .mount(&server)
        .await;

    let client = TokenClient::new(Url::parse(&server.uri()).unwrap(), Duration::from_secs(2)).unwrap();
    let code = AuthorizationCode::new("auth123");
    let other = PkceMaterial::generate();

    let err = client
        .exchange(ExchangeParams {
            code: &code,
            client_id: "abc",
            redirect_uri: None,
            code_verifier: other.verifier(),
            client_secret: None,
        })
        .await
        .unwrap_err();

    assert_eq!(FlowFailure::from(err).kind, FailureKind::TokenExchangeError);
}

#[tokio::test]
async fn duplicate_resolution_triggers_do_one_lookup() {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return;
    }
    let server = MockServer::start().await;
    let (services, lookups) = services(&server, TestWallet::default(), vec![record("1", true)]);

    let mut flow = LoginFlow::start(&services, ENTRY);
    flow.resolve_accounts().await;
    flow.resolve_accounts().await;

    assert_eq!(lookups.load(Ordering::SeqCst), 1);
    assert_eq!(flow.accounts().len(), 1);
}

#[tokio::test]
async fn reusing_a_code_fails() {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_partial_json(json!({"code": "auth123"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "at",
            "token_type": "Bearer"
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})))
        .mount(&server)
        .await;

    let party = RelyingParty::new(
        ClientConfig {
            api_url: Url::parse(&server.uri()).unwrap(),
            client_id: "abc".to_string(),
            client_secret: None,
            redirect_uri: Url::parse("http://localhost:3000/callback").unwrap(),
        },
        SessionStore::in_memory(),
        Duration::from_secs(2),
    )
    .unwrap();

    let state_of = |target: &Url| {
        target
            .query_pairs()
            .find(|(key, _)| key == "state")
            .map(|(_, value)| value.into_owned())
            .unwrap()
    };

    let first = state_of(&party.begin_authorization().unwrap());
    assert_eq!(
        party.complete([("code", "auth123"), ("state", first.as_str())]).await,
        ExchangeOutcome::Success
    );

    party.session().clear().unwrap();
    let second = state_of(&party.begin_authorization().unwrap());
    let outcome = party
        .complete([("code", "auth123"), ("state", second.as_str())])
        .await;

    assert!(matches!(
        outcome,
        ExchangeOutcome::Failure(FlowFailure {
            kind: FailureKind::TokenExchangeError,
            ..
        })
    ));
    assert!(!party.session().is_authenticated());
}
