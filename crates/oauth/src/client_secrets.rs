use std::path::Path;

use {secrecy::Secret, serde::Deserialize};

use crate::{Error, Result, types::OAuthConfig};

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Client credentials as downloaded from the Google Cloud console.
#[derive(Debug, Deserialize)]
pub struct ClientSecrets {
    #[serde(alias = "web")]
    installed: ClientEntry,
}

#[derive(Debug, Deserialize)]
struct ClientEntry {
    client_id: String,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default)]
    auth_uri: Option<String>,
    #[serde(default)]
    token_uri: Option<String>,
}

impl ClientSecrets {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::external(format!("reading {}", path.display()), e))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let secrets: Self = serde_json::from_str(raw)?;
        if secrets.installed.client_id.trim().is_empty() {
            return Err(Error::message("client secrets have an empty client_id"));
        }
        Ok(secrets)
    }

    pub fn client_id(&self) -> &str {
        &self.installed.client_id
    }

    /// OAuth configuration for an offline, consent-prompting installed-app
    /// flow over `scopes`. The redirect URI is set once the loopback
    /// listener is bound.
    pub fn oauth_config(&self, scopes: &[String]) -> OAuthConfig {
        let entry = &self.installed;
        OAuthConfig {
            client_id: entry.client_id.clone(),
            client_secret: entry.client_secret.clone().map(Secret::new),
            auth_url: entry
                .auth_uri
                .clone()
                .unwrap_or_else(|| DEFAULT_AUTH_URI.into()),
            token_url: entry
                .token_uri
                .clone()
                .unwrap_or_else(|| DEFAULT_TOKEN_URI.into()),
            redirect_uri: String::new(),
            scopes: scopes.to_vec(),
            extra_auth_params: vec![
                ("access_type".into(), "offline".into()),
                ("prompt".into(), "consent".into()),
            ],
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, secrecy::ExposeSecret};

    #[test]
    fn parses_installed_credentials() {
        let secrets = ClientSecrets::from_json(
            r#"{"installed": {
                "client_id": "abc.apps.googleusercontent.com",
                "client_secret": "s3cret",
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": "https://oauth2.googleapis.com/token",
                "redirect_uris": ["http://localhost"]
            }}"#,
        )
        .unwrap();
        let cfg = secrets.oauth_config(&["scope.a".into()]);
        assert_eq!(cfg.client_id, "abc.apps.googleusercontent.com");
        assert_eq!(cfg.client_secret.unwrap().expose_secret(), "s3cret");
        assert_eq!(cfg.token_url, "https://oauth2.googleapis.com/token");
        assert_eq!(cfg.scopes, ["scope.a"]);
        assert!(
            cfg.extra_auth_params
                .contains(&("access_type".into(), "offline".into()))
        );
    }

    #[test]
    fn accepts_web_credentials_with_defaults() {
        let secrets = ClientSecrets::from_json(r#"{"web": {"client_id": "w1"}}"#).unwrap();
        let cfg = secrets.oauth_config(&[]);
        assert_eq!(cfg.auth_url, DEFAULT_AUTH_URI);
        assert!(cfg.client_secret.is_none());
    }

    #[test]
    fn rejects_empty_client_id() {
        assert!(ClientSecrets::from_json(r#"{"installed": {"client_id": " "}}"#).is_err());
        assert!(ClientSecrets::from_json(r#"{"other": {}}"#).is_err());
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = ClientSecrets::from_file(Path::new("/nonexistent/credentials.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/credentials.json"));
    }
}
