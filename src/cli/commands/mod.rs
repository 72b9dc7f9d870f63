pub mod logging;
pub mod login;
pub mod serve;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("dauth")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("api-url")
                .long("api-url")
                .help("Authorization server base URL")
                .env("DAUTH_API_URL")
                .global(true),
        )
        .arg(
            Arg::new("client-id")
                .long("client-id")
                .help("OAuth client id of the relying party")
                .env("DAUTH_CLIENT_ID")
                .global(true),
        )
        .arg(
            Arg::new("client-secret")
                .long("client-secret")
                .help("OAuth client secret of the relying party")
                .env("DAUTH_CLIENT_SECRET")
                .hide_env_values(true)
                .global(true),
        )
        .arg(
            Arg::new("session-file")
                .long("session-file")
                .help("Where the token set is stored")
                .env("DAUTH_SESSION_FILE")
                .default_value("dauth-session.json")
                .global(true),
        )
        .arg(
            Arg::new("http-timeout")
                .long("http-timeout")
                .help("HTTP request timeout in seconds")
                .env("DAUTH_HTTP_TIMEOUT")
                .default_value("10")
                .global(true)
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .subcommand(login::subcommand())
        .subcommand(serve::subcommand())
        .subcommand(Command::new("status").about("Show whether a token set is stored"))
        .subcommand(Command::new("logout").about("Remove the stored token set"));

    logging::with_args(command)
}
