use std::{collections::HashMap, path::PathBuf};

use tracing::{debug, info, warn};

use crate::{Result, types::OAuthTokens};

/// File-based token storage: a JSON map of provider name to tokens.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub fn load(&self, provider: &str) -> Option<OAuthTokens> {
        let path = self.path.display().to_string();
        let data = match std::fs::read_to_string(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path, provider, "token file not found");
                return None;
            },
            Err(e) => {
                warn!(path = %path, provider, error = %e, "token file read failed");
                return None;
            },
        };

        let mut map: HashMap<String, OAuthTokens> = match serde_json::from_str(&data) {
            Ok(m) => m,
            Err(e) => {
                warn!(path = %path, provider, error = %e, "token file parse failed");
                return None;
            },
        };

        let tokens = map.remove(provider);
        if tokens.is_none() {
            debug!(path = %path, provider, "provider not found in token store");
        }
        tokens
    }

    pub fn save(&self, provider: &str, tokens: &OAuthTokens) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let mut map = self.read_map();
        map.insert(provider.to_string(), tokens.clone());
        self.write_map(&map)?;

        info!(path = %self.path.display(), provider, "tokens saved");
        Ok(())
    }

    pub fn delete(&self, provider: &str) -> Result<()> {
        let mut map = self.read_map();
        if map.remove(provider).is_some() {
            self.write_map(&map)?;
            info!(path = %self.path.display(), provider, "tokens deleted");
        }
        Ok(())
    }

    fn read_map(&self) -> HashMap<String, OAuthTokens> {
        std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|d| serde_json::from_str(&d).ok())
            .unwrap_or_default()
    }

    fn write_map(&self, map: &HashMap<String, OAuthTokens>) -> Result<()> {
        let data = serde_json::to_string_pretty(map)?;
        std::fs::write(&self.path, &data)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }
}
