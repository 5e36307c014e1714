mod cli;
mod config;
mod error;
mod flow;
mod github;
mod login;
mod logs;
mod store;
mod ui;

use clap::Parser;
use console::Style;
use tokio_util::sync::CancellationToken;

use cli::{Cli, Command};
use config::PapergateConfig;
use error::PapergateError;
use flow::{CompletionConfig, PollConfig, new_uid};
use github::GitHubClient;
use login::{FlowOptions, LoginFlow};
use store::CredentialStore;
use ui::LoginProgress;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let verbose = cli.verbose;

    if let Err(err) = run(cli).await {
        let red = Style::new().red().bold();
        eprintln!("{} {err}", red.apply_to("✗"));
        if verbose {
            let mut source = std::error::Error::source(&err);
            while let Some(cause) = source {
                eprintln!("    caused by: {cause}");
                source = cause.source();
            }
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), PapergateError> {
    let Cli {
        command,
        max_attempts,
        timeout_secs,
        verbose,
    } = cli;

    match command {
        Command::Login { code, uid } => login(code, uid, max_attempts, timeout_secs, verbose).await,
        Command::Logout => logout(),
        Command::Status => status(),
    }
}

async fn login(
    code: String,
    uid: Option<String>,
    max_attempts: Option<u32>,
    timeout_secs: Option<u64>,
    verbose: bool,
) -> Result<(), PapergateError> {
    let mut config = PapergateConfig::load()?;
    if let Some(attempts) = max_attempts {
        config.find_max_attempts = attempts;
    }
    if let Some(secs) = timeout_secs {
        config.completion_timeout_ms = secs * 1000;
    }
    if config.owner.is_empty() || config.repo.is_empty() {
        return Err(PapergateError::Config(
            "owner and repo must be set in papergate.toml".to_string(),
        ));
    }

    let client = GitHubClient::new(config.owner.clone(), config.repo.clone(), config.api_token());
    let flow = LoginFlow::new(
        client,
        FlowOptions {
            workflow: config.workflow.clone(),
            git_ref: config.git_ref.clone(),
            result_log: config.result_log.clone(),
            find: PollConfig {
                max_attempts: config.find_max_attempts,
                interval_ms: config.find_interval_ms,
            },
            completion: CompletionConfig {
                timeout_ms: config.completion_timeout_ms,
                ..CompletionConfig::default()
            },
        },
    );

    // Ctrl-C cancels the attempt instead of leaving polls running.
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_cancel.cancel();
        }
    });

    let uid = uid.unwrap_or_else(new_uid);
    let progress = LoginProgress::start(&uid);
    match flow.login(&code, Some(uid), &cancel, &progress).await {
        Ok(auth) => {
            let store = CredentialStore::open_default();
            store.save(&auth.token, &auth.user)?;
            progress.finish_success(&auth.user);
            if verbose {
                progress.print_audit(&auth.audit);
            }
            Ok(())
        }
        Err(err) => {
            progress.abandon();
            Err(PapergateError::Auth(err))
        }
    }
}

fn logout() -> Result<(), PapergateError> {
    let store = CredentialStore::open_default();
    let removed = store.clear()?;
    let green = Style::new().green().bold();
    if removed {
        println!(
            "  {} Logged out; stored credentials cleared",
            green.apply_to("✓")
        );
    } else {
        println!("No stored session to clear");
    }
    Ok(())
}

fn status() -> Result<(), PapergateError> {
    let store = CredentialStore::open_default();
    match store.load()? {
        Some(creds) => {
            println!(
                "Logged in as {} ({})",
                creds.user.display_name(),
                store::mask_token(&creds.token)
            );
        }
        None => println!("Not authenticated. Run `papergate login <code>`."),
    }
    Ok(())
}
