use secrecy::SecretString;
use std::{path::PathBuf, time::Duration};
use url::Url;

/// Options shared by every subcommand.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub api_url: Option<Url>,
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
    pub session_file: PathBuf,
    pub http_timeout: Duration,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(session_file: impl Into<PathBuf>) -> Self {
        Self {
            api_url: None,
            client_id: None,
            client_secret: None,
            session_file: session_file.into(),
            http_timeout: crate::auth::http::DEFAULT_TIMEOUT,
        }
    }
}
