use clap::{Arg, Command};

pub const NAME: &str = "login";

#[must_use]
pub fn subcommand() -> Command {
    Command::new(NAME)
        .about("Sign in with a wallet and print the redirect back to the client")
        .arg(
            Arg::new("entry")
                .help("Authorize URL or query string (client_id, redirect_uri, state, code_challenge, code_challenge_method)")
                .required(true),
        )
        .arg(
            Arg::new("wallet-rpc-url")
                .long("wallet-rpc-url")
                .help("JSON-RPC endpoint of the wallet provider")
                .env("DAUTH_WALLET_RPC_URL")
                .default_value("http://127.0.0.1:8545"),
        )
        .arg(
            Arg::new("directory-url")
                .long("directory-url")
                .help("JSON-RPC endpoint of the account directory")
                .env("DAUTH_DIRECTORY_URL")
                .required(true),
        )
        .arg(
            Arg::new("wallet-timeout-ms")
                .long("wallet-timeout-ms")
                .help("How long to wait for the wallet to report its account, in milliseconds")
                .env("DAUTH_WALLET_TIMEOUT_MS")
                .default_value("1000")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("sign-timeout")
                .long("sign-timeout")
                .help("How long to wait for the user to sign, in seconds")
                .env("DAUTH_SIGN_TIMEOUT")
                .default_value("120")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("account")
                .long("account")
                .help("userId of the account to sign in with (skips the prompt)")
                .env("DAUTH_ACCOUNT"),
        )
}
