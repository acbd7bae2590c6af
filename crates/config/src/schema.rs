//! Config schema: chat transport, Google credentials, destination folder,
//! ledger sheet and flush timing.

use std::{path::PathBuf, time::Duration};

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";
pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    pub telegram: TelegramConfig,
    pub google: GoogleConfig,
    pub drive: DriveConfig,
    pub sheets: SheetsConfig,
    pub intake: IntakeSettings,
}

/// Telegram bot settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    #[serde(serialize_with = "serialize_secret")]
    pub token: Secret<String>,

    /// Bot API base URL override (self-hosted Bot API servers, tests).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &"[REDACTED]")
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: Secret::new(String::new()),
            api_url: None,
        }
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

/// Google identity and API endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    /// Installed-app client secrets (`credentials.json` from the Cloud console).
    pub client_secrets: PathBuf,

    /// Where the authorized user token is stored. Defaults to
    /// `<config dir>/google_token.json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_path: Option<PathBuf>,

    pub scopes: Vec<String>,

    /// Seconds to wait for the browser redirect during authorization.
    pub auth_timeout_secs: u64,

    pub drive_api_url: String,
    pub sheets_api_url: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_secrets: PathBuf::from("credentials.json"),
            token_path: None,
            scopes: vec![DRIVE_SCOPE.into(), SPREADSHEETS_SCOPE.into()],
            auth_timeout_secs: 300,
            drive_api_url: "https://www.googleapis.com/".into(),
            sheets_api_url: "https://sheets.googleapis.com/".into(),
        }
    }
}

impl GoogleConfig {
    /// Token path, falling back to the user config directory.
    pub fn resolved_token_path(&self) -> PathBuf {
        self.token_path.clone().unwrap_or_else(|| {
            crate::loader::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("google_token.json")
        })
    }
}

/// Destination storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// Folder under which one folder per client is created.
    pub parent_folder_id: String,
}

/// Upload ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    /// A1 range rows are appended after.
    pub range: String,
    /// `USER_ENTERED` or `RAW`.
    pub value_input_option: String,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            range: "A1".into(),
            value_input_option: "USER_ENTERED".into(),
        }
    }
}

/// Batching and flush timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeSettings {
    /// Period of the flush timer (ms).
    pub flush_interval_ms: u64,
    /// Delay before the first flush tick (ms).
    pub first_flush_delay_ms: u64,
    /// Minimum silence before a group is flushed (ms). 0 flushes every
    /// open group on each tick.
    pub quiet_period_ms: u64,
}

impl Default for IntakeSettings {
    fn default() -> Self {
        Self {
            flush_interval_ms: 2_000,
            first_flush_delay_ms: 3_000,
            quiet_period_ms: 0,
        }
    }
}

impl IntakeSettings {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn first_flush_delay(&self) -> Duration {
        Duration::from_millis(self.first_flush_delay_ms)
    }

    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }
}
