//! Configuration loading, env substitution and validation.
//!
//! Config files: `intake.toml`, `intake.yaml`, `intake.yml` or `intake.json`,
//! searched in `./` then `~/.config/intake/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{
        apply_env_overrides, clear_config_dir, config_dir, discover_and_load, find_config_file,
        load_config, set_config_dir,
    },
    schema::{
        DriveConfig, GoogleConfig, IntakeConfig, IntakeSettings, SheetsConfig, TelegramConfig,
    },
    validate::{
        Diagnostic, Severity, ValidationResult, check_file_keys, validate, validate_toml_str,
    },
};
