use crate::cli::{
    actions::{login, serve, session, Action},
    commands,
    globals::GlobalArgs,
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::time::Duration;
use url::Url;

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let globals = globals(matches)?;

    match matches.subcommand() {
        Some((commands::login::NAME, sub)) => Ok(Action::Login(login_args(globals, sub)?)),
        Some((commands::serve::NAME, sub)) => Ok(Action::Serve(serve_args(globals, sub)?)),
        Some(("status", _)) => Ok(Action::Status(session::Args { globals })),
        Some(("logout", _)) => Ok(Action::Logout(session::Args { globals })),
        _ => anyhow::bail!("missing subcommand"),
    }
}

fn globals(matches: &clap::ArgMatches) -> Result<GlobalArgs> {
    let session_file = matches
        .get_one::<String>("session-file")
        .cloned()
        .context("missing required argument: --session-file")?;

    let mut globals = GlobalArgs::new(session_file);

    globals.api_url = matches
        .get_one::<String>("api-url")
        .map(|url| Url::parse(url))
        .transpose()
        .context("invalid DAUTH_API_URL")?;
    globals.client_id = matches.get_one::<String>("client-id").cloned();
    globals.client_secret = matches
        .get_one::<String>("client-secret")
        .map(|secret| SecretString::from(secret.as_str()));

    if let Some(seconds) = matches.get_one::<u64>("http-timeout").copied() {
        globals.http_timeout = Duration::from_secs(seconds);
    }

    Ok(globals)
}

fn login_args(globals: GlobalArgs, matches: &clap::ArgMatches) -> Result<login::Args> {
    let api_url = globals
        .api_url
        .clone()
        .context("missing required argument: --api-url")?;

    let entry = matches
        .get_one::<String>("entry")
        .cloned()
        .context("missing required argument: <entry>")?;

    let wallet_rpc_url = matches
        .get_one::<String>("wallet-rpc-url")
        .map(|url| Url::parse(url))
        .transpose()
        .context("invalid DAUTH_WALLET_RPC_URL")?
        .context("missing required argument: --wallet-rpc-url")?;

    let directory_url = matches
        .get_one::<String>("directory-url")
        .map(|url| Url::parse(url))
        .transpose()
        .context("invalid DAUTH_DIRECTORY_URL")?
        .context("missing required argument: --directory-url")?;

    let wallet_timeout = Duration::from_millis(
        matches
            .get_one::<u64>("wallet-timeout-ms")
            .copied()
            .unwrap_or(1_000),
    );
    let sign_timeout = Duration::from_secs(
        matches
            .get_one::<u64>("sign-timeout")
            .copied()
            .unwrap_or(120),
    );

    Ok(login::Args {
        globals,
        api_url,
        entry,
        wallet_rpc_url,
        directory_url,
        wallet_timeout,
        sign_timeout,
        account: matches.get_one::<String>("account").cloned(),
    })
}

fn serve_args(globals: GlobalArgs, matches: &clap::ArgMatches) -> Result<serve::Args> {
    let api_url = globals
        .api_url
        .clone()
        .context("missing required argument: --api-url")?;
    let client_id = globals
        .client_id
        .clone()
        .context("missing required argument: --client-id")?;

    let port = matches.get_one::<u16>("port").copied().unwrap_or(3000);

    let public_url = match matches.get_one::<String>("public-url") {
        Some(url) => Url::parse(url).context("invalid DAUTH_PUBLIC_URL")?,
        None => Url::parse(&format!("http://localhost:{port}"))?,
    };
    let redirect_uri = crate::auth::http::build_url(&public_url, "/callback")?;

    Ok(serve::Args {
        globals,
        api_url,
        client_id,
        port,
        redirect_uri,
    })
}
