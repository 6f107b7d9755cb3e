use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use kelp_lib::{Alert, Backend, SessionController, backend::Session, config::CoreConfig};
use sysexits::ExitCode;
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod auth;
mod profile;

#[derive(Parser, Debug)]
#[command(name = "kelp")]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Read the configuration from this file instead of the default location
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Sign in, sign up and sign out
    #[command(subcommand)]
    Auth(auth::Command),
    /// View and edit the signed-in user's profile
    #[command(subcommand)]
    Profile(profile::Command),
}

/// Why a command didn't go through.
#[derive(Debug, Error)]
pub enum Failure {
    #[error("Not signed in, run `kelp auth sign-in` first")]
    SignedOut,
    #[error("{0}")]
    Alert(Alert),
    #[error(transparent)]
    Lib(#[from] kelp_lib::Error),
}

impl Failure {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Failure::SignedOut => ExitCode::NoPerm,
            Failure::Lib(kelp_lib::Error::Config(_)) => ExitCode::Config,
            Failure::Lib(kelp_lib::Error::Io(_)) => ExitCode::IoErr,
            Failure::Alert(_) | Failure::Lib(_) => ExitCode::Unavailable,
        }
    }
}

impl From<Alert> for Failure {
    fn from(alert: Alert) -> Self {
        Failure::Alert(alert)
    }
}

/// The session the user is signed in with, if any.
pub async fn require_session(backend: &Backend) -> Result<Session, Failure> {
    let controller = SessionController::mount(backend.clone()).await;

    match (controller.screen(), controller.session()) {
        (kelp_lib::Screen::Account { .. }, Some(session)) => Ok(session.clone()),
        _ => Err(Failure::SignedOut),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Human friendly panicking in release mode
    human_panic::setup_panic!();

    // Logging goes to stderr so it never mixes with command output
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::TRACE)
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set up logging: {err}");
    }

    let cli = Cli::parse();

    match run(&cli).await {
        Ok(()) => ExitCode::Ok,
        Err(failure) => {
            eprintln!("{} {failure}", "error:".red().bold());
            failure.exit_code()
        }
    }
}

async fn run(cli: &Cli) -> Result<(), Failure> {
    let cfg = CoreConfig::load(cli.config.as_deref()).map_err(kelp_lib::Error::from)?;
    let backend = Backend::supabase(cfg)?;

    match &cli.command {
        Command::Auth(cmd) => auth::handle(&backend, cmd).await,
        Command::Profile(cmd) => profile::handle(&backend, cmd).await,
    }
}
