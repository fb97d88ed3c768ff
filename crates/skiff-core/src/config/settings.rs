//! User settings (`config.toml`).

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::InstallError;
use crate::fs::InstallMethod;

pub const DEFAULT_PACKAGE: &str = "skiff";
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org";
pub const DEFAULT_UPDATE_CHECK_TIMEOUT_MS: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Package name looked up in the registry.
    pub package: String,
    pub registry_url: String,
    pub update_check_timeout_ms: u64,
    /// Publish a version check that finished after the timeout.
    pub publish_late_results: bool,
    pub default_method: InstallMethod,
    /// Agents used when none are given; empty means detected agents.
    pub default_agents: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            package: DEFAULT_PACKAGE.to_string(),
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            update_check_timeout_ms: DEFAULT_UPDATE_CHECK_TIMEOUT_MS,
            publish_late_results: true,
            default_method: InstallMethod::default(),
            default_agents: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings from `path`; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no settings file, using defaults");
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(anyhow::Error::new(err)
                    .context(format!("Failed to read settings file: {}", path.display())));
            }
        };
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content).map_err(|e| enhance_toml_error(e, content))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.package.trim().is_empty() {
            anyhow::bail!("package must not be empty");
        }
        if self.update_check_timeout_ms == 0 {
            anyhow::bail!("update_check_timeout_ms must be greater than zero");
        }
        if let Some(id) = self.default_agents.iter().find(|id| id.trim().is_empty()) {
            return Err(InstallError::UnknownAgent(id.clone()).into());
        }
        Ok(())
    }

    pub fn update_check_timeout(&self) -> Duration {
        Duration::from_millis(self.update_check_timeout_ms)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize settings to TOML")
    }
}

fn enhance_toml_error(error: toml::de::Error, content: &str) -> anyhow::Error {
    let message = error.message().to_string();
    match error.span() {
        Some(span) => {
            let before = content.get(..span.start).unwrap_or(content);
            let line = before.matches('\n').count() + 1;
            anyhow::anyhow!("TOML parsing error at line {}: {}", line, message)
        }
        None => anyhow::anyhow!("TOML parsing error: {}", message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let settings = Settings::from_toml_str("").expect("parse should succeed");
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.update_check_timeout(), Duration::from_millis(100));
        assert!(settings.publish_late_results);
    }

    #[test]
    fn partial_file_overrides_fields() {
        let toml = r#"
registry_url = "https://registry.example.test"
update_check_timeout_ms = 250
publish_late_results = false
default_method = "copy"
default_agents = ["cursor", "claude-code"]
"#;
        let settings = Settings::from_toml_str(toml).expect("parse should succeed");
        assert_eq!(settings.package, DEFAULT_PACKAGE);
        assert_eq!(settings.registry_url, "https://registry.example.test");
        assert_eq!(settings.update_check_timeout_ms, 250);
        assert!(!settings.publish_late_results);
        assert_eq!(settings.default_method, InstallMethod::Copy);
        assert_eq!(settings.default_agents, vec!["cursor", "claude-code"]);
    }

    #[test]
    fn malformed_file_reports_line() {
        let err = Settings::from_toml_str("package = \"skiff\"\nupdate_check_timeout_ms = \"soon\"\n")
            .expect_err("parse should fail");
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[test]
    fn missing_file_is_default() {
        let tmp = tempfile::tempdir().expect("tempdir should succeed");
        let settings = Settings::load(&tmp.path().join("config.toml")).expect("load should succeed");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn unknown_method_is_rejected() {
        assert!(Settings::from_toml_str("default_method = \"hardlink\"").is_err());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(Settings::from_toml_str("update_check_timeout_ms = 0").is_err());
    }
}
