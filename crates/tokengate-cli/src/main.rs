//! tokengate - command line client for bearer-token APIs.
//!
//! Every command goes through the core's refresh-on-401 request layer. The
//! access credential is held in memory for the life of one command; the
//! session flag and profile persist between runs.

mod cli;

use std::io;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tokengate_core::api::{Method, PendingRequest};
use tokengate_core::auth::{FileSessionStorage, SessionStore};
use tokengate_core::config::{parse_base_url, Config};
use tokengate_core::{ApiClient, AuthContext, AuthEvent};

use cli::{Cli, Command, InlineLogin};

/// Environment variable read for the password before prompting
const PASSWORD_ENV: &str = "TOKENGATE_PASSWORD";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing();

    let mut config = Config::load()?;
    let base_url = match cli.base_url {
        Some(ref raw) => parse_base_url(raw)?,
        None => config.base_url()?,
    };
    let session_dir = config.session_dir()?;
    info!(%base_url, session_dir = %session_dir.display(), "tokengate starting");

    let session = SessionStore::open(Box::new(FileSessionStorage::new(session_dir)));
    let ctx = AuthContext::new(session);
    let mut events = ctx.events();
    let client = ApiClient::new(base_url, config.request_timeout(), ctx)
        .context("Failed to build HTTP client")?;

    let result = run(cli.command, &client, &mut config).await;
    report_events(&mut events);
    result
}

async fn run(command: Command, client: &ApiClient, config: &mut Config) -> Result<()> {
    match command {
        Command::Login(args) => {
            sign_in(client, config, args.email).await?;
        }
        Command::Register { name, email } => {
            let password = read_password()?;
            let body = client.register(&name, &email, &password).await?;
            print_json(&body)?;
        }
        Command::Call {
            method,
            path,
            data,
            query,
            login,
        } => {
            inline_login(client, config, login).await?;

            let method: Method = method
                .to_uppercase()
                .parse()
                .with_context(|| format!("Invalid HTTP method: {}", method))?;
            let mut request = PendingRequest::new(method, path);
            for (key, value) in cli::parse_query(&query)? {
                request = request.query(key, value);
            }
            if let Some(raw) = data {
                let body: Value = serde_json::from_str(&raw).context("--data is not valid JSON")?;
                request = request.json(body);
            }

            let response = client.request(request).await?;
            print_json(&response.body)?;
        }
        Command::Profile { login } => {
            inline_login(client, config, login).await?;
            let profile = client.profile().await?;
            print_json(&serde_json::to_value(profile)?)?;
        }
        Command::Session => {
            let session = client.context().session().snapshot();
            print_json(&serde_json::to_value(session)?)?;
        }
        Command::Logout => {
            // Local state is cleared regardless of the server's answer
            if let Err(e) = client.logout().await {
                eprintln!("Server logout failed: {}", e);
            }
            eprintln!("Logged out");
        }
        Command::ForgotPassword { email } => {
            print_json(&client.forget_password(&email).await?)?;
        }
        Command::VerifyOtp { email, otp } => {
            print_json(&client.verify_otp(&email, &otp).await?)?;
        }
        Command::ResetPassword { email, otp } => {
            let password = read_password()?;
            print_json(&client.reset_password(&email, &otp, &password).await?)?;
        }
    }
    Ok(())
}

async fn inline_login(client: &ApiClient, config: &mut Config, login: InlineLogin) -> Result<()> {
    if login.login {
        sign_in(client, config, login.email).await?;
    }
    Ok(())
}

async fn sign_in(client: &ApiClient, config: &mut Config, email: Option<String>) -> Result<()> {
    let email = email
        .or_else(|| config.last_email.clone())
        .ok_or_else(|| anyhow::anyhow!("No email given and none remembered; pass --email"))?;
    let password = read_password()?;

    let user = client.login(&email, &password).await?;
    eprintln!("Signed in as {}", user.display_name());

    config.last_email = Some(email);
    config.save()?;
    Ok(())
}

fn read_password() -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(password);
    }
    rpassword::prompt_password("Password: ").context("Failed to read password")
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Tell the user about auth state changes that happened during the command
fn report_events(events: &mut tokio::sync::broadcast::Receiver<AuthEvent>) {
    loop {
        match events.try_recv() {
            Ok(AuthEvent::SessionExpired) => {
                eprintln!("Session expired - sign in again with `tokengate login`");
            }
            Ok(AuthEvent::TokenRefreshed) => info!("Access token was refreshed"),
            Ok(_) => {}
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
}
