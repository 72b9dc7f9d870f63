use crate::{
    auth::{
        AccountResolver, ChallengeClient, Directory, FlowOutcome, FlowState, JsonRpcDirectory,
        JsonRpcWalletProvider, LoginFlow, LoginServices, Retry, UserAccount, WalletAdapter,
        WalletProvider,
    },
    cli::globals::GlobalArgs,
};
use anyhow::{anyhow, Context, Result};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub api_url: Url,
    pub entry: String,
    pub wallet_rpc_url: Url,
    pub directory_url: Url,
    pub wallet_timeout: Duration,
    pub sign_timeout: Duration,
    pub account: Option<String>,
}

/// Run one login attempt and print the redirect target on success.
/// # Errors
/// Returns an error if the clients cannot be built or the attempt fails.
pub async fn execute(args: Args) -> Result<()> {
    // The wallet call blocks until the user signs, so its HTTP timeout
    // follows the signing timeout.
    let provider = JsonRpcWalletProvider::new(args.wallet_rpc_url.clone(), args.sign_timeout)
        .context("failed to build the wallet client")?;
    let directory = JsonRpcDirectory::new(args.directory_url.clone(), args.globals.http_timeout)
        .context("failed to build the directory client")?;
    let challenges = ChallengeClient::new(args.api_url.clone(), args.globals.http_timeout)
        .context("failed to build the authorization client")?;

    let services = LoginServices {
        wallet: WalletAdapter::new(provider)
            .with_identity_timeout(args.wallet_timeout)
            .with_sign_timeout(args.sign_timeout),
        resolver: AccountResolver::new(directory),
        challenges,
    };

    let target = run(&services, &args.entry, args.account.as_deref()).await?;
    println!("{target}");
    Ok(())
}

async fn run<W: WalletProvider, D: Directory>(
    services: &LoginServices<W, D>,
    entry: &str,
    account: Option<&str>,
) -> Result<String> {
    let mut flow = LoginFlow::start(services, entry).with_observer(|state: &FlowState| {
        if !state.is_terminal() {
            eprintln!("{}", state.status());
        }
    });
    debug!(attempt_id = %flow.attempt_id(), "Login attempt started");

    flow.resolve_accounts().await;
    if let FlowState::Terminal(outcome) = flow.state() {
        return finish(outcome.clone());
    }

    match account {
        Some(user_id) => {
            flow.select_user(user_id)?;
        }
        None => choose_interactively(&mut flow).await?,
    }

    let outcome = flow.confirm().await?;
    finish(outcome)
}

fn finish(outcome: FlowOutcome) -> Result<String> {
    match outcome {
        FlowOutcome::Success(target) => Ok(target),
        FlowOutcome::Failure(failure) => {
            let hint = match failure.kind.retry() {
                Retry::FixRequest => "fix the authorization request and try again",
                Retry::AfterUserAction => "check your wallet and try again",
                Retry::RestartAttempt => "try again",
                Retry::FreshProof => "start a new login",
            };
            Err(anyhow!(failure).context(hint))
        }
    }
}

async fn choose_interactively<W: WalletProvider, D: Directory>(
    flow: &mut LoginFlow<'_, W, D>,
) -> Result<()> {
    for (position, account) in flow.accounts().iter().enumerate() {
        eprintln!(
            "  [{}] {} <{}> ({})",
            position + 1,
            account.name,
            account.email,
            account.user_id
        );
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprintln!("Account number or userId, empty line to continue:");
        let Some(line) = lines.next_line().await.context("failed to read selection")? else {
            return if flow.selected().is_some() {
                Ok(())
            } else {
                Err(anyhow!("no account selected"))
            };
        };

        match parse_choice(&line, flow.accounts()) {
            Choice::Confirm if flow.selected().is_some() => return Ok(()),
            Choice::Confirm => eprintln!("Please select an account to continue."),
            Choice::Select(id) => {
                let account = flow.select(id)?;
                eprintln!("Selected {} <{}>", account.name, account.email);
            }
            Choice::Unknown(input) => eprintln!("No account matches {input:?}."),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Choice {
    Confirm,
    Select(usize),
    Unknown(String),
}

/// An empty line confirms, a number picks by list position (1-based), and
/// anything else is matched against `userId`.
fn parse_choice(line: &str, accounts: &[UserAccount]) -> Choice {
    let input = line.trim();
    if input.is_empty() {
        return Choice::Confirm;
    }

    let by_position = input
        .parse::<usize>()
        .ok()
        .and_then(|position| position.checked_sub(1))
        .and_then(|index| accounts.get(index));

    by_position
        .or_else(|| accounts.iter().find(|account| account.user_id == input))
        .map_or_else(|| Choice::Unknown(input.to_string()), |account| Choice::Select(account.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::accounts::AccountStatus;

    fn account(id: usize, user_id: &str) -> UserAccount {
        UserAccount {
            id,
            user_id: user_id.to_string(),
            user_name: format!("{user_id}@example.com"),
            domain: "example.com".to_string(),
            name: user_id.to_string(),
            email: format!("{user_id}@example.com"),
            status: AccountStatus::Active,
            creation_date: String::new(),
        }
    }

    #[test]
    fn parse_choice_by_position_and_user_id() {
        let accounts = vec![account(0, "alice"), account(2, "carol")];

        assert_eq!(parse_choice("", &accounts), Choice::Confirm);
        assert_eq!(parse_choice("  \n", &accounts), Choice::Confirm);
        assert_eq!(parse_choice("1", &accounts), Choice::Select(0));
        assert_eq!(parse_choice("2", &accounts), Choice::Select(2));
        assert_eq!(parse_choice("carol", &accounts), Choice::Select(2));
        assert_eq!(parse_choice("0", &accounts), Choice::Unknown("0".to_string()));
        assert_eq!(parse_choice("3", &accounts), Choice::Unknown("3".to_string()));
        assert_eq!(parse_choice("bob", &accounts), Choice::Unknown("bob".to_string()));
    }

    #[test]
    fn failures_keep_their_kind() {
        let err = finish(FlowOutcome::Failure(crate::auth::FlowFailure::new(
            crate::auth::FailureKind::NoWallet,
            "No wallet found.",
        )))
        .unwrap_err();

        assert_eq!(err.to_string(), "check your wallet and try again");
        assert!(format!("{err:#}").contains("no_wallet"));
    }
}
