use std::time::{Duration, SystemTime, UNIX_EPOCH};

use {
    anyhow::{Context, Result},
    clap::Subcommand,
    intake_config::IntakeConfig,
    intake_oauth::{ClientSecrets, TokenManager, TokenStore},
};

const PROVIDER: &str = "google";

#[derive(Subcommand)]
pub enum AuthAction {
    /// Authorize Drive and Sheets access in the browser.
    Login,
    /// Show whether a stored Google token is present and when it expires.
    Status,
    /// Delete the stored Google token.
    Logout,
}

pub async fn handle_auth(action: AuthAction, config: &IntakeConfig) -> Result<()> {
    match action {
        AuthAction::Login => login(config).await,
        AuthAction::Status => status(config),
        AuthAction::Logout => logout(config),
    }
}

/// Token manager backed by the configured client secrets and token file.
pub(crate) fn token_manager(config: &IntakeConfig) -> Result<TokenManager> {
    let secrets = ClientSecrets::from_file(&config.google.client_secrets).with_context(|| {
        format!(
            "reading Google client secrets from {}",
            config.google.client_secrets.display()
        )
    })?;
    let store = TokenStore::new(config.google.resolved_token_path());
    Ok(
        TokenManager::new(secrets.oauth_config(&config.google.scopes), store, PROVIDER)
            .with_auth_timeout(Duration::from_secs(config.google.auth_timeout_secs)),
    )
}

/// Print the consent URL and try to open it. The URL is always printed so
/// headless hosts can finish the flow from another machine.
pub(crate) fn open_authorization_url(url: &str) {
    println!("Opening browser for Google authorization...");
    if open::that(url).is_err() {
        println!("Could not open browser.");
    }
    println!("If the browser did not open, visit:\n{url}");
}

async fn login(config: &IntakeConfig) -> Result<()> {
    let manager = token_manager(config)?;
    println!("Waiting for the authorization redirect...");
    manager.authorize(open_authorization_url).await?;
    println!(
        "Successfully authorized; token saved to {}",
        config.google.resolved_token_path().display()
    );
    Ok(())
}

fn status(config: &IntakeConfig) -> Result<()> {
    let path = config.google.resolved_token_path();
    let store = TokenStore::new(path.clone());
    match store.load(PROVIDER) {
        Some(tokens) => {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            let refresh = if tokens.can_refresh() {
                "refreshable"
            } else {
                "no refresh token"
            };
            println!(
                "{PROVIDER} [{}, {refresh}] ({})",
                describe_expiry(tokens.expires_at, now),
                path.display()
            );
        },
        None => println!("Not authorized. Run `intake auth login`."),
    }
    Ok(())
}

fn logout(config: &IntakeConfig) -> Result<()> {
    let store = TokenStore::new(config.google.resolved_token_path());
    store.delete(PROVIDER)?;
    println!("Removed stored Google token");
    Ok(())
}

fn describe_expiry(expires_at: Option<u64>, now: u64) -> String {
    expires_at.map_or("unknown expiry".to_string(), |ts| {
        if ts > now {
            let remaining = ts - now;
            let hours = remaining / 3600;
            let mins = (remaining % 3600) / 60;
            format!("valid ({hours}h {mins}m remaining)")
        } else {
            "expired".to_string()
        }
    })
}
