//! Configuration validation.
//!
//! Reports unknown (likely misspelled) keys and settings that would stop the
//! bot from working, as diagnostics rather than a hard failure.

use std::{collections::HashMap, path::Path};

use secrecy::ExposeSecret;

use crate::schema::IntakeConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// "syntax", "unknown-field", "missing", "timing"
    pub category: &'static str,
    /// Dotted path, e.g. "drive.parent_folder_id"
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}: {}",
            self.severity, self.category, self.path, self.message
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(
        &mut self,
        severity: Severity,
        category: &'static str,
        path: &str,
        message: impl Into<String>,
    ) {
        self.diagnostics.push(Diagnostic {
            severity,
            category,
            path: path.to_string(),
            message: message.into(),
        });
    }
}

/// Known keys per section.
fn known_keys() -> HashMap<&'static str, &'static [&'static str]> {
    HashMap::from([
        ("telegram", &["token", "api_url"][..]),
        (
            "google",
            &[
                "client_secrets",
                "token_path",
                "scopes",
                "auth_timeout_secs",
                "drive_api_url",
                "sheets_api_url",
            ][..],
        ),
        ("drive", &["parent_folder_id"][..]),
        ("sheets", &["spreadsheet_id", "range", "value_input_option"][..]),
        (
            "intake",
            &["flush_interval_ms", "first_flush_delay_ms", "quiet_period_ms"][..],
        ),
    ])
}

/// Semantic checks on a loaded config.
pub fn validate(config: &IntakeConfig) -> ValidationResult {
    let mut result = ValidationResult::default();
    check_semantics(config, &mut result);
    result
}

/// Parse raw TOML, report unknown keys and then run the semantic checks.
pub fn validate_toml_str(toml_str: &str) -> ValidationResult {
    let mut result = ValidationResult::default();

    let value: toml::Value = match toml::from_str(toml_str) {
        Ok(v) => v,
        Err(e) => {
            result.push(Severity::Error, "syntax", "", e.to_string());
            return result;
        },
    };
    check_unknown_fields(&value, &mut result);

    match toml::from_str::<IntakeConfig>(toml_str) {
        Ok(config) => check_semantics(&config, &mut result),
        Err(e) => result.push(Severity::Error, "syntax", "", e.to_string()),
    }
    result
}

/// Syntax and unknown-key diagnostics for a config file on disk. Only TOML
/// files are inspected; other formats yield an empty result.
pub fn check_file_keys(path: &Path) -> anyhow::Result<ValidationResult> {
    let mut result = ValidationResult::default();
    if path.extension().and_then(|e| e.to_str()) != Some("toml") {
        return Ok(result);
    }
    let raw = crate::env_subst::substitute_env(&std::fs::read_to_string(path)?);
    match toml::from_str::<toml::Value>(&raw) {
        Ok(value) => check_unknown_fields(&value, &mut result),
        Err(e) => result.push(Severity::Error, "syntax", "", e.to_string()),
    }
    Ok(result)
}

fn check_unknown_fields(value: &toml::Value, result: &mut ValidationResult) {
    let Some(root) = value.as_table() else {
        return;
    };
    let known = known_keys();
    let sections: Vec<&str> = known.keys().copied().collect();

    for (section, body) in root {
        let Some(fields) = known.get(section.as_str()) else {
            let hint = suggest(section, &sections)
                .map(|s| format!(" (did you mean \"{s}\"?)"))
                .unwrap_or_default();
            result.push(
                Severity::Warning,
                "unknown-field",
                section,
                format!("unknown section{hint}"),
            );
            continue;
        };
        let Some(table) = body.as_table() else {
            continue;
        };
        for key in table.keys() {
            if fields.contains(&key.as_str()) {
                continue;
            }
            let hint = suggest(key, fields)
                .map(|s| format!(" (did you mean \"{s}\"?)"))
                .unwrap_or_default();
            result.push(
                Severity::Warning,
                "unknown-field",
                &format!("{section}.{key}"),
                format!("unknown field{hint}"),
            );
        }
    }
}

fn check_semantics(config: &IntakeConfig, result: &mut ValidationResult) {
    if config.telegram.token.expose_secret().trim().is_empty() {
        result.push(
            Severity::Error,
            "missing",
            "telegram.token",
            "bot token is required (or set INTAKE_TELEGRAM_TOKEN)",
        );
    }
    if config.drive.parent_folder_id.trim().is_empty() {
        result.push(
            Severity::Error,
            "missing",
            "drive.parent_folder_id",
            "destination parent folder id is required",
        );
    }
    if config.sheets.spreadsheet_id.trim().is_empty() {
        result.push(
            Severity::Error,
            "missing",
            "sheets.spreadsheet_id",
            "ledger spreadsheet id is required",
        );
    }
    if config.google.scopes.is_empty() {
        result.push(
            Severity::Error,
            "missing",
            "google.scopes",
            "at least one OAuth scope is required",
        );
    }
    if !matches!(
        config.sheets.value_input_option.as_str(),
        "USER_ENTERED" | "RAW"
    ) {
        result.push(
            Severity::Error,
            "type-error",
            "sheets.value_input_option",
            "must be USER_ENTERED or RAW",
        );
    }

    let timing = &config.intake;
    if timing.flush_interval_ms == 0 {
        result.push(
            Severity::Error,
            "timing",
            "intake.flush_interval_ms",
            "flush interval must be greater than zero",
        );
    }
    if timing.quiet_period_ms > 0 && timing.quiet_period_ms >= timing.flush_interval_ms {
        result.push(
            Severity::Warning,
            "timing",
            "intake.quiet_period_ms",
            "quiet period not shorter than the flush interval delays every batch by an extra tick",
        );
    }
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut cur = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            cur[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        prev = cur;
    }
    prev[b.len()]
}

fn suggest<'a>(needle: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .map(|c| (levenshtein(needle, c), *c))
        .filter(|(d, _)| *d <= 3)
        .min_by_key(|(d, _)| *d)
        .map(|(_, c)| c)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const VALID: &str = r#"
        [telegram]
        token = "1:ABC"

        [drive]
        parent_folder_id = "parent"

        [sheets]
        spreadsheet_id = "sheet"
    "#;

    #[test]
    fn valid_config_has_no_diagnostics() {
        let result = validate_toml_str(VALID);
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    }

    #[test]
    fn empty_config_reports_missing_fields() {
        let result = validate_toml_str("");
        assert!(result.has_errors());
        let paths: Vec<_> = result.diagnostics.iter().map(|d| d.path.as_str()).collect();
        assert!(paths.contains(&"telegram.token"));
        assert!(paths.contains(&"drive.parent_folder_id"));
        assert!(paths.contains(&"sheets.spreadsheet_id"));
    }

    #[test]
    fn misspelled_key_gets_suggestion() {
        let toml = format!("{VALID}\n[intake]\nflush_intervl_ms = 100\n");
        let result = validate_toml_str(&toml);
        let diag = result
            .diagnostics
            .iter()
            .find(|d| d.category == "unknown-field")
            .expect("unknown field reported");
        assert_eq!(diag.path, "intake.flush_intervl_ms");
        assert!(diag.message.contains("flush_interval_ms"));
        assert!(!result.has_errors());
    }

    #[test]
    fn unknown_section_is_a_warning() {
        let toml = format!("{VALID}\n[drvie]\nx = 1\n");
        let result = validate_toml_str(&toml);
        assert_eq!(result.count(Severity::Warning), 1);
        assert!(result.diagnostics[0].message.contains("\"drive\""));
    }

    #[test]
    fn zero_flush_interval_is_an_error() {
        let toml = format!("{VALID}\n[intake]\nflush_interval_ms = 0\n");
        let result = validate_toml_str(&toml);
        assert!(result.has_errors());
        assert!(
            result
                .diagnostics
                .iter()
                .any(|d| d.path == "intake.flush_interval_ms")
        );
    }

    #[test]
    fn long_quiet_period_is_a_warning() {
        let toml = format!("{VALID}\n[intake]\nflush_interval_ms = 1000\nquiet_period_ms = 1000\n");
        let result = validate_toml_str(&toml);
        assert!(!result.has_errors());
        assert_eq!(result.count(Severity::Warning), 1);
    }

    #[test]
    fn syntax_error_is_reported() {
        let result = validate_toml_str("[telegram\n");
        assert!(result.has_errors());
        assert_eq!(result.diagnostics[0].category, "syntax");
    }

    #[test]
    fn file_keys_only_reports_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("intake.toml");
        std::fs::write(&path, "[sheets]\nspreadsheet = \"x\"\n").unwrap();
        let result = check_file_keys(&path).unwrap();
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].path, "sheets.spreadsheet");
        assert!(result.diagnostics[0].message.contains("spreadsheet_id"));

        let json = dir.path().join("intake.json");
        std::fs::write(&json, "{}").unwrap();
        assert!(check_file_keys(&json).unwrap().diagnostics.is_empty());
    }

    #[test]
    fn levenshtein_distance() {
        assert_eq!(levenshtein("drive", "drvie"), 2);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
    }
}
