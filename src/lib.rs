//! # DAuth (wallet-signature login)
//!
//! `dauth` drives an OAuth2 Authorization Code flow with PKCE where the password
//! step is replaced by a wallet signature over a server-issued challenge.
//!
//! ## Login side
//!
//! [`auth::flow::LoginFlow`] parses the inbound authorization parameters, asks
//! the wallet provider for the selected identity, lists the active accounts bound
//! to it, waits for the user to pick one, then requests a challenge, has the
//! wallet sign it and submits the signature for verification. A verified
//! signature yields an authorization code that is handed back to the relying
//! party through its `redirect_uri`, with the original `state` echoed unmodified.
//!
//! ## Relying-party side
//!
//! [`auth::callback`] generates the PKCE material before sending the user to the
//! authorization server and later redeems the returned code with the matching
//! verifier. The resulting token set is owned by [`session::SessionStore`].
//!
//! Account selection never grants access on its own: only a signature over the
//! matching challenge does.

pub mod app;
pub mod auth;
pub mod cli;
pub mod session;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
