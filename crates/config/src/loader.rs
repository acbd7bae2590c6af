use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{env_subst::substitute_env, schema::IntakeConfig};

/// Standard config file names, checked in order.
pub const CONFIG_FILENAMES: &[&str] = &["intake.toml", "intake.yaml", "intake.yml", "intake.json"];

static CONFIG_DIR_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);

/// Override the user config directory (`--config-dir`).
pub fn set_config_dir(path: PathBuf) {
    *CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(|e| e.into_inner()) = Some(path);
}

pub fn clear_config_dir() {
    *CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(|e| e.into_inner()) = None;
}

/// The user config directory: the override if set, else `~/.config/intake/`.
pub fn config_dir() -> Option<PathBuf> {
    if let Some(dir) = CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
    {
        return Some(dir);
    }
    directories::ProjectDirs::from("", "", "intake").map(|d| d.config_dir().to_path_buf())
}

/// Load config from the given path (any supported format), after `${ENV}`
/// substitution.
pub fn load_config(path: &Path) -> anyhow::Result<IntakeConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations, then apply env
/// overrides.
///
/// Search order:
/// 1. `./intake.{toml,yaml,yml,json}`
/// 2. `<config dir>/intake.{toml,yaml,yml,json}`
///
/// A missing file yields defaults. A file that fails to parse is an error:
/// running with defaults would upload to the wrong place.
pub fn discover_and_load() -> anyhow::Result<(IntakeConfig, Option<PathBuf>)> {
    let path = find_config_file();
    let mut config = match &path {
        Some(p) => {
            debug!(path = %p.display(), "loading config");
            load_config(p)?
        },
        None => {
            warn!("no config file found, using defaults and environment");
            IntakeConfig::default()
        },
    };
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    Ok((config, path))
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    let local = CONFIG_FILENAMES.iter().map(PathBuf::from);
    let user = config_dir()
        .into_iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)));
    local.chain(user).find(|p| p.exists())
}

/// Apply `INTAKE_*` environment overrides on top of file values.
pub fn apply_env_overrides(config: &mut IntakeConfig, lookup: impl Fn(&str) -> Option<String>) {
    let present = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(token) = present("INTAKE_TELEGRAM_TOKEN") {
        config.telegram.token = Secret::new(token);
    }
    if let Some(parent) = present("INTAKE_DRIVE_PARENT_FOLDER_ID") {
        config.drive.parent_folder_id = parent;
    }
    if let Some(sheet) = present("INTAKE_SHEET_ID") {
        config.sheets.spreadsheet_id = sheet;
    }
    if let Some(secrets) = present("INTAKE_GOOGLE_CLIENT_SECRETS") {
        config.google.client_secrets = PathBuf::from(secrets);
    }
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<IntakeConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
