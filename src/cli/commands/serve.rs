use clap::{Arg, Command};

pub const NAME: &str = "serve";

#[must_use]
pub fn subcommand() -> Command {
    Command::new(NAME)
        .about("Run the relying-party web app (login, callback, dashboard)")
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("3000")
                .env("DAUTH_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("public-url")
                .long("public-url")
                .help("Externally visible base URL, used to build the redirect_uri (default: http://localhost:<port>)")
                .env("DAUTH_PUBLIC_URL"),
        )
}
