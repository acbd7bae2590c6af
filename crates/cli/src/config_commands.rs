use std::path::Path;

use {
    anyhow::Result,
    clap::Subcommand,
    intake_config::{IntakeConfig, Severity, ValidationResult, check_file_keys, validate},
};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors/warnings.
    Check,
    /// Print the effective configuration with secrets masked.
    Show,
}

pub fn handle_config(action: ConfigAction, config: &IntakeConfig, path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Check => check(config, path),
        ConfigAction::Show => show(config),
    }
}

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Unknown-key findings from the file plus semantic checks on the effective
/// config (file values with env overrides applied).
pub(crate) fn collect_diagnostics(
    config: &IntakeConfig,
    path: Option<&Path>,
) -> Result<ValidationResult> {
    let mut result = match path {
        Some(path) => check_file_keys(path)?,
        None => ValidationResult::default(),
    };
    result.diagnostics.extend(validate(config).diagnostics);
    Ok(result)
}

fn check(config: &IntakeConfig, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => eprintln!("Checking {}\n", path.display()),
        None => eprintln!("No config file found; checking defaults and environment.\n"),
    }

    let result = collect_diagnostics(config, path)?;
    for d in &result.diagnostics {
        let (color, label) = match d.severity {
            Severity::Error => (RED, "error"),
            Severity::Warning => (YELLOW, "warning"),
        };

        if d.path.is_empty() {
            eprintln!("  {BOLD}{color}{label}{RESET} {}", d.message);
        } else {
            eprintln!("  {BOLD}{color}{label}{RESET} {}: {}", d.path, d.message);
        }
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);

    if !result.diagnostics.is_empty() {
        eprintln!();
    }

    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }

    if errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn show(config: &IntakeConfig) -> Result<()> {
    let mut value = toml::Value::try_from(config)?;
    if let Some(token) = value
        .get_mut("telegram")
        .and_then(|t| t.get_mut("token"))
        .filter(|t| t.as_str().is_some_and(|s| !s.is_empty()))
    {
        *token = toml::Value::String("[REDACTED]".into());
    }
    println!("{}", toml::to_string_pretty(&value)?);
    Ok(())
}
