use std::sync::Arc;

use {
    intake_oauth::AccessTokenSource,
    secrecy::ExposeSecret,
    serde::de::DeserializeOwned,
    tracing::debug,
    url::Url,
};

use crate::{Error, Result};

/// Shared HTTP plumbing: base URL handling, bearer auth and status mapping.
#[derive(Clone)]
pub struct GoogleApi {
    http: reqwest::Client,
    tokens: Arc<dyn AccessTokenSource>,
}

impl GoogleApi {
    pub fn new(tokens: Arc<dyn AccessTokenSource>) -> Self {
        Self {
            http: reqwest::Client::new(),
            tokens,
        }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Attach a fresh bearer token and send.
    pub async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let token = self.tokens.access_token().await?;
        let resp = req.bearer_auth(token.expose_secret()).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), body = %body, "google api error");
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    pub async fn send_json<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T> {
        Ok(self.send(req).await?.json::<T>().await?)
    }
}

/// Parse a base URL, making sure relative joins keep its path.
pub(crate) fn base_url(raw: &str) -> Result<Url> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&normalized).map_err(|e| Error::message(format!("invalid API base URL {raw}: {e}")))
}

/// Append raw path segments (percent-encoded as needed) to `url`.
pub(crate) fn push_segments(mut url: Url, segments: &[&str]) -> Result<Url> {
    let shown = url.to_string();
    url.path_segments_mut()
        .map_err(|()| Error::message(format!("URL cannot have a path: {shown}")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
