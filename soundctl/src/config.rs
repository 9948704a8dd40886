use anyhow::{Context, Result};
use log::{error, info, warn};
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_MONITOR_INTERVAL_SECS: u64 = 10;

/// Root configuration document. Deserialized from `config.json`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub mcp_profiles: ProfilesConfig,
}

/// Context-switching section: ordered rules plus fallback profile.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ProfilesConfig {
    /// Applied when no rule matches the focused window.
    #[serde(default)]
    pub default_profile: Option<String>,
    /// Seconds between foreground-window polls. Must be positive.
    #[serde(default = "default_monitor_interval")]
    pub monitor_interval_seconds: u64,
    /// Evaluated top to bottom; the first match wins.
    #[serde(default)]
    pub contexts: Vec<ContextRule>,
}

impl Default for ProfilesConfig {
    fn default() -> Self {
        Self {
            default_profile: None,
            monitor_interval_seconds: DEFAULT_MONITOR_INTERVAL_SECS,
            contexts: Vec::new(),
        }
    }
}

impl ProfilesConfig {
    /// True when nothing could ever be applied by the monitor.
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty() && self.default_profile().is_none()
    }

    /// The default profile, treating an empty string as unset.
    pub fn default_profile(&self) -> Option<&str> {
        self.default_profile.as_deref().filter(|p| !p.is_empty())
    }
}

/// A single context rule as written in the config file.
///
/// Fields stay optional so a malformed rule is skipped at match time instead
/// of rejecting the whole document.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ContextRule {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub profile: Option<String>,
}

#[cfg(test)]
impl ContextRule {
    pub fn new(kind: &str, pattern: &str, profile: &str) -> Self {
        Self {
            kind: Some(kind.to_string()),
            pattern: Some(pattern.to_string()),
            profile: Some(profile.to_string()),
        }
    }
}

/// Loads and validates the config file at `path`.
/// Returns an error if the file cannot be read or parsed.
pub fn load(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let mut config: Config = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    if config.mcp_profiles.monitor_interval_seconds == 0 {
        warn!(
            "monitor_interval_seconds must be positive; using {DEFAULT_MONITOR_INTERVAL_SECS}"
        );
        config.mcp_profiles.monitor_interval_seconds = DEFAULT_MONITOR_INTERVAL_SECS;
    }
    Ok(config)
}

/// Loads the config file at `path`, logging the failure and returning an empty
/// configuration if it is missing or malformed.
pub fn load_or_empty(path: &Path) -> Config {
    match load(path) {
        Ok(config) => {
            info!("Configuration loaded from {}", path.display());
            config
        }
        Err(e) => {
            error!("{e:#}");
            Config::default()
        }
    }
}

fn default_monitor_interval() -> u64 {
    DEFAULT_MONITOR_INTERVAL_SECS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    // ── defaults ──────────────────────────────────────────────────────────────

    #[test]
    fn profiles_config_default_values() {
        let c = ProfilesConfig::default();
        assert_eq!(c.monitor_interval_seconds, DEFAULT_MONITOR_INTERVAL_SECS);
        assert!(c.default_profile.is_none());
        assert!(c.contexts.is_empty());
        assert!(c.is_empty());
    }

    #[test]
    fn empty_default_profile_counts_as_unset() {
        let c = ProfilesConfig {
            default_profile: Some(String::new()),
            ..ProfilesConfig::default()
        };
        assert!(c.default_profile().is_none());
        assert!(c.is_empty());
    }

    #[test]
    fn default_profile_alone_is_not_empty() {
        let c = ProfilesConfig {
            default_profile: Some("Default".to_string()),
            ..ProfilesConfig::default()
        };
        assert!(!c.is_empty());
    }

    // ── load ──────────────────────────────────────────────────────────────────

    #[test]
    fn load_parses_full_document() {
        let (_dir, path) = write_config(
            r#"{
                "mcp_profiles": {
                    "default_profile": "Default",
                    "monitor_interval_seconds": 3,
                    "contexts": [
                        {"type": "active_window_title", "pattern": "Notepad", "profile": "WorkProfile"},
                        {"type": "process_name", "pattern": "^game\\.exe$", "profile": "Quiet"}
                    ]
                }
            }"#,
        );

        let config = load(&path).unwrap().mcp_profiles;
        assert_eq!(config.default_profile(), Some("Default"));
        assert_eq!(config.monitor_interval_seconds, 3);
        assert_eq!(config.contexts.len(), 2);
        assert_eq!(
            config.contexts[0],
            ContextRule::new("active_window_title", "Notepad", "WorkProfile")
        );
        assert_eq!(config.contexts[1].pattern.as_deref(), Some("^game\\.exe$"));
    }

    #[test]
    fn load_partial_document_uses_field_defaults() {
        let (_dir, path) = write_config(r#"{"mcp_profiles": {"default_profile": "Calm"}}"#);
        let config = load(&path).unwrap().mcp_profiles;
        assert_eq!(config.monitor_interval_seconds, DEFAULT_MONITOR_INTERVAL_SECS);
        assert!(config.contexts.is_empty());
    }

    #[test]
    fn load_keeps_rules_with_missing_fields() {
        let (_dir, path) =
            write_config(r#"{"mcp_profiles": {"contexts": [{"pattern": "x"}]}}"#);
        let config = load(&path).unwrap().mcp_profiles;
        assert_eq!(config.contexts.len(), 1);
        assert!(config.contexts[0].kind.is_none());
        assert!(config.contexts[0].profile.is_none());
    }

    #[test]
    fn load_replaces_zero_interval_with_default() {
        let (_dir, path) =
            write_config(r#"{"mcp_profiles": {"monitor_interval_seconds": 0}}"#);
        let config = load(&path).unwrap().mcp_profiles;
        assert_eq!(config.monitor_interval_seconds, DEFAULT_MONITOR_INTERVAL_SECS);
    }

    #[test]
    fn load_without_profiles_section_is_empty() {
        let (_dir, path) = write_config(r#"{"something_else": true}"#);
        assert!(load(&path).unwrap().mcp_profiles.is_empty());
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let (_dir, path) = write_config("{ not json ]");
        assert!(load(&path).is_err());
    }

    #[test]
    fn load_missing_file_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(&dir.path().join("nonexistent.json")).is_err());
    }

    // ── load_or_empty ─────────────────────────────────────────────────────────

    #[test]
    fn load_or_empty_missing_file_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_or_empty(&dir.path().join("nonexistent.json"));
        assert!(config.mcp_profiles.is_empty());
    }

    #[test]
    fn load_or_empty_malformed_file_returns_empty() {
        let (_dir, path) = write_config("[1, 2");
        assert!(load_or_empty(&path).mcp_profiles.is_empty());
    }
}
