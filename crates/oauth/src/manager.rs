use std::time::Duration;

use {
    async_trait::async_trait,
    secrecy::Secret,
    tokio::sync::Mutex,
    tracing::{debug, info, warn},
};

use crate::{
    Error, Result, callback_server::CallbackServer, flow::OAuthFlow, storage::TokenStore,
    types::{OAuthConfig, OAuthTokens},
};

/// Refresh this long before the provider-reported expiry.
pub const REFRESH_SKEW: Duration = Duration::from_secs(60);

/// Anything that can hand out a bearer token for outbound API calls.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Result<Secret<String>>;
}

/// Owns the stored credential for one provider and keeps it fresh.
///
/// The cache lock is held across the refresh call, so concurrent callers
/// wait for a single refresh instead of each starting their own.
pub struct TokenManager {
    config: OAuthConfig,
    flow: OAuthFlow,
    store: TokenStore,
    provider: String,
    auth_timeout: Duration,
    cached: Mutex<Option<OAuthTokens>>,
}

impl TokenManager {
    pub fn new(config: OAuthConfig, store: TokenStore, provider: impl Into<String>) -> Self {
        Self {
            flow: OAuthFlow::new(config.clone()),
            config,
            store,
            provider: provider.into(),
            auth_timeout: Duration::from_secs(300),
            cached: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_auth_timeout(mut self, timeout: Duration) -> Self {
        self.auth_timeout = timeout;
        self
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Tokens currently on disk, without refreshing.
    pub fn stored(&self) -> Option<OAuthTokens> {
        self.store.load(&self.provider)
    }

    /// Make sure a usable credential exists: a valid stored token, a
    /// refreshable one, or a fresh interactive authorization.
    pub async fn ensure_authorized(&self, on_url: impl FnOnce(&str) + Send) -> Result<()> {
        let mut cached = self.cached.lock().await;
        if cached.is_none() {
            *cached = self.store.load(&self.provider);
        }

        if let Some(tokens) = cached.as_ref() {
            if !tokens.is_expired(REFRESH_SKEW) {
                debug!(provider = %self.provider, "stored credential is valid");
                return Ok(());
            }
            if tokens.can_refresh() {
                match self.refresh_locked(&mut cached).await {
                    Ok(_) => return Ok(()),
                    Err(e) => warn!(
                        provider = %self.provider,
                        error = %e,
                        "refresh failed, falling back to interactive authorization"
                    ),
                }
            }
        }

        let tokens = self.run_authorization(on_url).await?;
        *cached = Some(tokens);
        Ok(())
    }

    /// Run the interactive flow unconditionally and store the result.
    pub async fn authorize(&self, on_url: impl FnOnce(&str) + Send) -> Result<OAuthTokens> {
        let tokens = self.run_authorization(on_url).await?;
        *self.cached.lock().await = Some(tokens.clone());
        Ok(tokens)
    }

    async fn run_authorization(&self, on_url: impl FnOnce(&str) + Send) -> Result<OAuthTokens> {
        let server = CallbackServer::bind().await?;
        let mut config = self.config.clone();
        config.redirect_uri = server.redirect_uri();
        let flow = OAuthFlow::new(config);

        let req = flow.start()?;
        info!(provider = %self.provider, redirect_uri = %flow.config().redirect_uri, "waiting for authorization");
        on_url(&req.url);

        let code = server.wait_for_code(req.state, self.auth_timeout).await?;
        let tokens = flow.exchange(&code, &req.pkce.verifier).await?;
        if !tokens.can_refresh() {
            warn!(provider = %self.provider, "provider returned no refresh token");
        }
        self.store.save(&self.provider, &tokens)?;
        info!(provider = %self.provider, "authorization complete");
        Ok(tokens)
    }

    async fn refresh_locked(&self, cached: &mut Option<OAuthTokens>) -> Result<Secret<String>> {
        let refresh_token = cached
            .as_ref()
            .and_then(|t| t.refresh_token.clone())
            .ok_or_else(|| Error::message("credential expired and cannot be refreshed"))?;

        debug!(provider = %self.provider, "refreshing access token");
        let tokens = self.flow.refresh(&refresh_token).await?;
        self.store.save(&self.provider, &tokens)?;
        let access = tokens.access_token.clone();
        *cached = Some(tokens);
        Ok(access)
    }
}

#[async_trait]
impl AccessTokenSource for TokenManager {
    async fn access_token(&self) -> Result<Secret<String>> {
        let mut cached = self.cached.lock().await;
        if cached.is_none() {
            *cached = self.store.load(&self.provider);
        }

        let Some(tokens) = cached.as_ref() else {
            return Err(Error::message(format!(
                "no stored credential for {}; run `intake auth login`",
                self.provider
            )));
        };
        if !tokens.is_expired(REFRESH_SKEW) {
            return Ok(tokens.access_token.clone());
        }
        self.refresh_locked(&mut cached).await
    }
}
