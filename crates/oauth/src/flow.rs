use {
    secrecy::{ExposeSecret, Secret},
    tracing::debug,
    url::Url,
};

use crate::{
    Error, Result,
    pkce::{generate_pkce, generate_state},
    types::{OAuthConfig, OAuthTokens, PkceChallenge, unix_now},
};

/// Manages the OAuth 2.0 authorization code flow with PKCE.
pub struct OAuthFlow {
    config: OAuthConfig,
    client: reqwest::Client,
}

/// Result of starting the OAuth flow.
pub struct AuthorizationRequest {
    pub url: String,
    pub pkce: PkceChallenge,
    pub state: String,
}

impl OAuthFlow {
    pub fn new(config: OAuthConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Build the authorization URL and generate PKCE + state.
    pub fn start(&self) -> Result<AuthorizationRequest> {
        let pkce = generate_pkce();
        let state = generate_state();

        let mut url = Url::parse(&self.config.auth_url)
            .map_err(|source| Error::external("invalid auth_url", source))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("code_challenge", &pkce.challenge)
            .append_pair("code_challenge_method", "S256")
            .append_pair("state", &state);

        if !self.config.scopes.is_empty() {
            url.query_pairs_mut()
                .append_pair("scope", &self.config.scopes.join(" "));
        }

        for (key, value) in &self.config.extra_auth_params {
            url.query_pairs_mut().append_pair(key, value);
        }

        Ok(AuthorizationRequest {
            url: url.to_string(),
            pkce,
            state,
        })
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange(&self, code: &str, verifier: &str) -> Result<OAuthTokens> {
        let mut form = vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", code.to_string()),
            ("redirect_uri", self.config.redirect_uri.clone()),
            ("client_id", self.config.client_id.clone()),
            ("code_verifier", verifier.to_string()),
        ];
        self.push_client_secret(&mut form);

        let resp = self.post_token(&form).await?;
        parse_token_response(&resp)
    }

    /// Refresh an access token. The previous refresh token is kept when the
    /// provider does not rotate it.
    pub async fn refresh(&self, refresh_token: &Secret<String>) -> Result<OAuthTokens> {
        let mut form = vec![
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", refresh_token.expose_secret().clone()),
            ("client_id", self.config.client_id.clone()),
        ];
        self.push_client_secret(&mut form);

        let resp = self.post_token(&form).await?;
        let mut tokens = parse_token_response(&resp)?;
        if tokens.refresh_token.is_none() {
            tokens.refresh_token = Some(refresh_token.clone());
        }
        Ok(tokens)
    }

    fn push_client_secret(&self, form: &mut Vec<(&'static str, String)>) {
        if let Some(secret) = &self.config.client_secret {
            form.push(("client_secret", secret.expose_secret().clone()));
        }
    }

    async fn post_token(&self, form: &[(&'static str, String)]) -> Result<serde_json::Value> {
        debug!(token_url = %self.config.token_url, "calling token endpoint");
        let resp = self
            .client
            .post(&self.config.token_url)
            .form(form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::TokenEndpoint {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json::<serde_json::Value>().await?)
    }
}

pub(crate) fn parse_token_response(resp: &serde_json::Value) -> Result<OAuthTokens> {
    let access_token = resp["access_token"]
        .as_str()
        .ok_or_else(|| Error::message("missing access_token in response"))?
        .to_string();

    let refresh_token = resp["refresh_token"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(|s| Secret::new(s.to_string()));
    let scope = resp["scope"].as_str().map(str::to_string);
    let expires_at = resp["expires_in"]
        .as_u64()
        .map(|secs| unix_now().saturating_add(secs));

    Ok(OAuthTokens {
        access_token: Secret::new(access_token),
        refresh_token,
        scope,
        expires_at,
    })
}
