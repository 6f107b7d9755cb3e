use clap::{Args, Subcommand};
use colored::Colorize;
use kelp_lib::{Alert, Backend, Screen, SessionController, SignInForm, sign_in::SignInOutcome};
use tracing::info;

use crate::Failure;

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Sign in with an email address and password
    SignIn(Credentials),
    /// Register a new account
    SignUp(Credentials),
    /// Sign out of the current session
    SignOut,
    /// Show who is signed in
    Status,
}

#[derive(Args, Debug, Clone)]
pub struct Credentials {
    #[arg(short, long)]
    email: String,
    #[arg(short, long)]
    password: String,
}

pub async fn handle(backend: &Backend, cmd: &Command) -> Result<(), Failure> {
    match cmd {
        Command::SignIn(credentials) => {
            let mut form = form(credentials);
            let outcome = SignInForm::sign_in(backend.clone(), form.begin()).await;

            match form.finish(outcome) {
                Some(alert) => Err(alert.into()),
                None => {
                    println!("Signed in as {}", credentials.email.bold());
                    Ok(())
                }
            }
        }
        Command::SignUp(credentials) => {
            let mut form = form(credentials);
            let outcome = SignInForm::sign_up(backend.clone(), form.begin()).await;
            let awaiting = outcome == SignInOutcome::AwaitingConfirmation;

            match form.finish(outcome) {
                // Not a failure, the account exists but needs confirming first
                Some(alert) if awaiting => {
                    println!("{}", alert.message().yellow());
                    Ok(())
                }
                Some(alert) => Err(alert.into()),
                None => {
                    println!("Signed up as {}", credentials.email.bold());
                    Ok(())
                }
            }
        }
        Command::SignOut => {
            backend
                .auth()
                .sign_out()
                .await
                .map_err(|err| Alert::from_error(&err))?;
            info!("Signed out");
            println!("Signed out");
            Ok(())
        }
        Command::Status => {
            let controller = SessionController::mount(backend.clone()).await;

            match controller.screen() {
                Screen::SignIn => Err(Failure::SignedOut),
                Screen::Account { key } => {
                    let email = controller
                        .session()
                        .and_then(|session| session.email())
                        .unwrap_or("(no email)");
                    println!("Signed in as {} ({key})", email.bold());
                    Ok(())
                }
            }
        }
    }
}

fn form(credentials: &Credentials) -> SignInForm {
    let mut form = SignInForm::new();
    form.set_email(credentials.email.as_str());
    form.set_password(credentials.password.as_str());
    form
}
