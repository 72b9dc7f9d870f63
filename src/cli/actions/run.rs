use crate::cli::actions::{login, serve, session, Action};
use anyhow::Result;

/// Single dispatch point for all CLI actions.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Login(args) => login::execute(args).await,
        Action::Serve(args) => serve::execute(args).await,
        Action::Status(args) => session::status(&args),
        Action::Logout(args) => session::logout(&args),
    }
}
