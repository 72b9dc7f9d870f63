use crate::{cli::globals::GlobalArgs, session::SessionStore};
use anyhow::{Context, Result};
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
}

/// Print whether a token set is stored.
/// # Errors
/// Returns an error if the session file exists but cannot be read.
pub fn status(args: &Args) -> Result<()> {
    let session = SessionStore::file(&args.globals.session_file);
    let tokens = session
        .load()
        .with_context(|| format!("failed to read {}", args.globals.session_file.display()))?;

    match tokens.filter(|tokens| !tokens.access_token.is_empty()) {
        Some(tokens) => println!(
            "authenticated ({})",
            tokens.token_type.as_deref().unwrap_or("Bearer")
        ),
        None => println!("not authenticated"),
    }
    Ok(())
}

/// Remove the stored token set.
/// # Errors
/// Returns an error if the session file cannot be updated.
pub fn logout(args: &Args) -> Result<()> {
    SessionStore::file(&args.globals.session_file)
        .clear()
        .with_context(|| format!("failed to update {}", args.globals.session_file.display()))?;
    info!("Session cleared");
    println!("logged out");
    Ok(())
}
