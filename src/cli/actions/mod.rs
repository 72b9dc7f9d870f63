pub mod login;
pub mod serve;
pub mod session;

// Internal "interpreter" for `Action`; the match lives in `run`.
mod run;

#[derive(Debug)]
pub enum Action {
    Login(login::Args),
    Serve(serve::Args),
    Status(session::Args),
    Logout(session::Args),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
