use std::io::{self, Write};

use anyhow::{Context, Result};
use colored::Colorize;
use hulul_application::{RemoteSignOut, SignUpOutcome};
use hulul_core::auth::SignUpMetadata;

use crate::bootstrap::AppBootstrap;

fn read_password(provided: Option<String>) -> Result<String> {
    if let Some(password) = provided {
        return Ok(password);
    }
    eprint!("Password: ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

pub async fn login(app: &AppBootstrap, email: &str, password: Option<String>) -> Result<()> {
    let password = read_password(password)?;
    let state = app.session_store.sign_in(email, &password).await?;
    let who = state
        .user
        .as_ref()
        .and_then(|u| u.email.clone())
        .unwrap_or_else(|| email.to_string());
    println!("{}", format!("Signed in as {}", who).green());
    if state.is_admin {
        println!("{}", "Administrator access".yellow());
    }
    Ok(())
}

pub async fn logout(app: &AppBootstrap) -> Result<()> {
    let outcome = app.sidebar().sign_out().await;
    match &outcome.remote {
        RemoteSignOut::Confirmed => println!("{}", "Signed out.".green()),
        RemoteSignOut::Skipped => println!("Not signed in."),
        RemoteSignOut::Failed(reason) => {
            println!("{}", "Signed out locally.".green());
            println!("{}", format!("The server did not confirm: {}", reason).yellow());
        }
    }
    println!("Continue at {}", outcome.route);
    Ok(())
}

pub async fn whoami(app: &AppBootstrap) -> Result<()> {
    let state = app.session_store.check_session().await;
    match state.user {
        Some(user) => {
            println!("{}", user.email.as_deref().unwrap_or(&user.id).bold());
            println!("id:    {}", user.id);
            println!("role:  {}", if state.is_admin { "admin" } else { "client" });
        }
        None => println!("Not signed in. Continue at {}", app.session_store.login_route()),
    }
    Ok(())
}

pub async fn signup(
    app: &AppBootstrap,
    email: &str,
    password: Option<String>,
    full_name: Option<String>,
    phone: Option<String>,
    company_name: Option<String>,
) -> Result<()> {
    let password = read_password(password)?;
    let metadata = SignUpMetadata {
        full_name,
        phone,
        company_name,
    };
    match app.session_store.sign_up(email, &password, &metadata).await? {
        SignUpOutcome::SessionStarted => {
            println!("{}", format!("Account created. Signed in as {}", email).green())
        }
        SignUpOutcome::ConfirmationRequired => println!(
            "{}",
            "Account created. Check your inbox to confirm your email.".green()
        ),
    }
    Ok(())
}

pub async fn reset_password(app: &AppBootstrap, email: &str) -> Result<()> {
    app.session_store.reset_password(email).await?;
    println!("{}", format!("Password reset email sent to {}", email).green());
    Ok(())
}
