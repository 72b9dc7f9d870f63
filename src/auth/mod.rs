//! Wallet-signature login over OAuth2 authorization code with PKCE.

pub mod accounts;
pub mod callback;
pub mod challenge;
pub mod error;
pub mod flow;
pub mod http;
pub mod pkce;
pub mod request;
pub mod rpc;
pub mod token;
pub mod wallet;

pub use accounts::{AccountResolver, Directory, JsonRpcDirectory, UserAccount};
pub use callback::{ClientConfig, ExchangeOutcome, RelyingParty};
pub use challenge::{AuthorizationCode, Challenge, ChallengeClient};
pub use error::{FailureKind, FlowFailure, Retry};
pub use flow::{FlowOutcome, FlowState, LoginFlow, LoginServices};
pub use pkce::PkceMaterial;
pub use request::AuthorizationRequest;
pub use token::{TokenClient, TokenSet};
pub use wallet::{JsonRpcWalletProvider, Signature, WalletAdapter, WalletIdentity, WalletProvider};
