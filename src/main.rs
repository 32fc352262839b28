// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Odyssey session CLI
//!
//! Drives the session manager the way the web client does: sign in, react
//! to the first login of the day, show the cached profile, sign out.

use std::time::Duration;

use clap::{Parser, Subcommand};
use odyssey_session::{
    config::Config,
    db::{DataStore, FirestoreDb},
    models::{ActivityKind, SessionNotice, SessionState},
    services::{AuthProvider, FirebaseAuth},
    SessionManager,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long to wait for provider notifications after a sign-in.
const EVENT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "odyssey-session", about = "Sign in to Odyssey and inspect the session")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the current (restored) session and profile
    Status,
    /// Create an account
    SignUp {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        username: String,
    },
    /// Sign in with email and password
    SignIn {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// End the current session
    SignOut,
    /// List the signed-in user's recent activity
    Activity {
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let cli = Cli::parse();

    // Load configuration from environment
    let config = Config::from_env()?;

    let (auth, db) = match &config.firebase_project_id {
        Some(project_id) if config.is_backend_configured() => {
            tracing::info!(project = %project_id, "Using Firebase backend");
            (FirebaseAuth::new(&config), FirestoreDb::new(project_id).await?)
        }
        _ => (FirebaseAuth::unconfigured(), FirestoreDb::unconfigured()),
    };

    let manager = SessionManager::start(auth, db);
    let result = execute(&manager, cli.command).await;
    manager.shutdown().await;
    result
}

async fn execute<A: AuthProvider, S: DataStore>(
    manager: &SessionManager<A, S>,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = manager.wait_until_settled().await;

    match command {
        Command::Status => print_state(&state),
        Command::SignUp {
            email,
            password,
            username,
        } => {
            let session = manager.sign_up(&email, &password, &username).await?;
            println!("Account created for {} ({})", username, session.email);
        }
        Command::SignIn { email, password } => {
            let mut notices = manager.subscribe_notices();
            let session = manager.sign_in(&email, &password).await?;

            let first_login = tokio::time::timeout(EVENT_TIMEOUT, async {
                let mut first_login = false;
                loop {
                    match notices.recv().await {
                        Ok(SessionNotice::FirstLoginOfDay { user_id })
                            if user_id == session.user_id =>
                        {
                            first_login = true
                        }
                        Ok(SessionNotice::SignInApplied { user_id })
                            if user_id == session.user_id =>
                        {
                            return Ok(first_login)
                        }
                        Ok(_) => {}
                        Err(e) => return Err(e),
                    }
                }
            })
            .await??;

            if first_login {
                println!("First login today, welcome back!");
                manager.record_activity(ActivityKind::Login, None).await;
            }
            print_state(&manager.state());
        }
        Command::SignOut => {
            manager.sign_out().await?;
            println!("Signed out");
        }
        Command::Activity { limit } => {
            for record in manager.recent_activities(limit).await? {
                println!("{}  {}", record.activity_date, record.activity_type);
            }
        }
    }

    Ok(())
}

fn print_state(state: &SessionState) {
    match state {
        SessionState::Authenticated {
            session,
            profile: Some(profile),
        } => println!(
            "Signed in as {} <{}>: {} coins, rank {}, {}-day streak",
            profile.username, session.email, profile.coins, profile.rank, profile.streak_days
        ),
        SessionState::Authenticated { session, .. } => {
            println!("Signed in as {} (profile unavailable)", session.email)
        }
        _ => println!("Not signed in"),
    }
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("odyssey_session=debug,info")),
        )
        .with(format)
        .init();
}
