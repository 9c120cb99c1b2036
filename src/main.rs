use clap::{Parser, Subcommand};
use clipfeed::AuthError;
use clipfeed::config::{AuthConfig, ConfigError};
use clipfeed::guard::wait_until_resolved;
use clipfeed::reporter::ErrorReporter;
use clipfeed::session::Session;
use clipfeed::state::{AppState, StartupError};
use serde::Serialize;
use tokio::sync::watch;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("{} ({})", .0.user_message(), .0.kind)]
    Auth(#[from] AuthError),
    #[error("session manager stopped before the identity provider reported")]
    Unresolved,
    #[error("not subscribed to the identity provider")]
    NotSubscribed,
    #[error("failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("signal handling failed: {0}")]
    Signal(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "clipfeed", about = "clipfeed session shell (provider chosen by AUTH_PROVIDER)")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the current session.
    Status,
    SignIn {
        #[arg(long)]
        email: String,
        #[arg(long, env = "CLIPFEED_PASSWORD", hide_env_values = true)]
        password: String,
    },
    SignUp {
        #[arg(long)]
        email: String,
        #[arg(long, env = "CLIPFEED_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        display_name: String,
    },
    SignOut,
    /// Print every session change until interrupted.
    Watch,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AuthConfig::from_env()?;
    let reporter = ErrorReporter::new();
    let mut background = reporter.subscribe();
    let state = AppState::from_config(config, reporter).await?;

    let result = run(&state, cli.command).await;

    while let Ok(err) = background.try_recv() {
        eprintln!("warning: {err}");
    }
    state.shutdown();
    result
}

async fn run(state: &AppState, command: Command) -> Result<(), CliError> {
    let session = &state.session;
    if !session.is_subscribed() {
        return Err(CliError::NotSubscribed);
    }
    let mut rx = session.watch();
    wait_until_resolved(&mut rx)
        .await
        .ok_or(CliError::Unresolved)?;

    match command {
        Command::Status => print_json(&session.current_session()),
        Command::SignIn { email, password } => {
            let identity = session.sign_in(&email, &password).await?;
            eprintln!("signed in as {}", identity.label());
            print_json(&identity)
        }
        Command::SignUp { email, password, display_name } => {
            let identity = session
                .sign_up(&email, &password, &display_name)
                .await?;
            eprintln!("account created for {}", identity.label());
            print_json(&identity)
        }
        Command::SignOut => {
            session.sign_out().await;
            print_json(&session.current_session())
        }
        Command::Watch => watch_session(rx).await,
    }
}

async fn watch_session(mut rx: watch::Receiver<Session>) -> Result<(), CliError> {
    let initial = rx.borrow_and_update().clone();
    print_json(&initial)?;
    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let snapshot = rx.borrow_and_update().clone();
                print_json(&snapshot)?;
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                return Ok(());
            }
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
