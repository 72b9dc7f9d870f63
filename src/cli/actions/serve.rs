use crate::{
    app,
    auth::{ClientConfig, RelyingParty},
    cli::globals::GlobalArgs,
    session::SessionStore,
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub api_url: Url,
    pub client_id: String,
    pub port: u16,
    pub redirect_uri: Url,
}

/// Run the relying-party web app.
/// # Errors
/// Returns an error if the HTTP client cannot be built or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let config = ClientConfig {
        api_url: args.api_url,
        client_id: args.client_id,
        client_secret: args.globals.client_secret,
        redirect_uri: args.redirect_uri,
    };
    let session = SessionStore::file(&args.globals.session_file);
    let party = RelyingParty::new(config, session, args.globals.http_timeout)
        .context("failed to build the token client")?;

    app::serve(args.port, Arc::new(party)).await
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("api_url", args.api_url.to_string()),
        ("client_id", args.client_id.clone()),
        (
            "client_secret_set",
            args.globals.client_secret.is_some().to_string(),
        ),
        ("redirect_uri", args.redirect_uri.to_string()),
        (
            "session_file",
            args.globals.session_file.display().to_string(),
        ),
        (
            "http_timeout",
            format!("{}s", args.globals.http_timeout.as_secs()),
        ),
    ];

    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = String::from("Startup configuration:");
    for (key, value) in &entries {
        message.push_str(&format!("\n  {key:<max_key_len$}  {value}"));
    }
    info!("{message}");
}
