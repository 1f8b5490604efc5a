//! Account command handlers.

use std::io::{BufRead, IsTerminal, Write};

use anyhow::{Context, Result};
use tracing::debug;

use super::print_message;
use crate::cli::client::AdminClient;

fn read_password() -> Result<String> {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        eprint!("Password: ");
        std::io::stderr().flush().ok();
    }

    let mut line = String::new();
    stdin
        .lock()
        .read_line(&mut line)
        .context("read password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        anyhow::bail!("Password is required");
    }
    Ok(password)
}

pub async fn login(client: &AdminClient, email: &str, password: Option<String>) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => read_password()?,
    };

    let payload = client.session().login(email, &password).await?;
    match client.session().session() {
        Some(user) => println!("Logged in as {}", user.display_name()),
        None => print_message(&payload, "Logged in"),
    }
    Ok(())
}

pub async fn logout(client: &mut AdminClient) -> Result<()> {
    let payload = client.session().logout().await?;
    client.forget_cookies();
    print_message(&payload, "Logged out");
    Ok(())
}

pub async fn whoami(client: &AdminClient) -> Result<()> {
    client.session().initialize().await;
    let user = client
        .session()
        .session()
        .context("Not logged in. Run `lotopital login` first")?;

    println!("{}", user.display_name());
    if let Some(id) = &user.id {
        println!("id: {id}");
    }
    Ok(())
}

pub async fn signup(
    client: &AdminClient,
    name: &str,
    email: &str,
    password: &str,
    confirm_password: &str,
) -> Result<()> {
    let payload = client
        .session()
        .signup(name, email, password, confirm_password)
        .await?;
    print_message(&payload, "Account created. Check your inbox to verify your email.");
    Ok(())
}

pub async fn forgot_password(client: &AdminClient, email: &str) -> Result<()> {
    let payload = client.session().forgot_password(email).await?;
    print_message(&payload, "Password reset link sent");
    Ok(())
}

pub async fn reset_password(client: &AdminClient, token: &str, password: &str) -> Result<()> {
    let payload = client.session().reset_password(token, password).await?;
    print_message(&payload, "Password updated");
    Ok(())
}

pub async fn verify_email(client: &AdminClient, token: &str) -> Result<()> {
    let payload = client.session().verify_email(token).await?;
    print_message(&payload, "Email verified");
    Ok(())
}

pub async fn resend_verification(client: &AdminClient) -> Result<()> {
    let email = match client.session().admin_email().await {
        Ok(email) => Some(email),
        Err(err) => {
            debug!(error = %format!("{err:#}"), "admin email unavailable");
            None
        }
    };
    let resent = client.session().resend_verification().await?;

    let message = resent
        .message
        .unwrap_or_else(|| "Verification email sent".to_string());
    match email {
        Some(email) => println!("{message} ({email})"),
        None => println!("{message}"),
    }
    if let Some(cooldown) = resent.cooldown {
        println!("You can request another email in {cooldown}s.");
    }
    Ok(())
}
