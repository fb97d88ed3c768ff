//! Shared core types used across the registry, scanner and executor.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InstallError;

/// Which configuration root of an agent an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallScope {
    /// Project-relative root (e.g. `./.claude/skills`).
    Local,
    /// Home-relative root (e.g. `~/.claude/skills`).
    Global,
}

impl InstallScope {
    pub const ALL: [InstallScope; 2] = [InstallScope::Local, InstallScope::Global];

    pub fn as_str(self) -> &'static str {
        match self {
            InstallScope::Local => "local",
            InstallScope::Global => "global",
        }
    }

    pub fn from_global_flag(global: bool) -> Self {
        if global {
            InstallScope::Global
        } else {
            InstallScope::Local
        }
    }
}

impl Default for InstallScope {
    fn default() -> Self {
        Self::Local
    }
}

impl fmt::Display for InstallScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstallScope {
    type Err = InstallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "project" => Ok(InstallScope::Local),
            "global" | "user" => Ok(InstallScope::Global),
            other => Err(InstallError::InvalidScope(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scope_aliases() {
        assert_eq!("local".parse::<InstallScope>().ok(), Some(InstallScope::Local));
        assert_eq!("Project".parse::<InstallScope>().ok(), Some(InstallScope::Local));
        assert_eq!("global".parse::<InstallScope>().ok(), Some(InstallScope::Global));
        assert!("shared".parse::<InstallScope>().is_err());
    }

    #[test]
    fn scope_serializes_lowercase() {
        let json = serde_json::to_string(&InstallScope::Global)
            .expect("InstallScope serialization should succeed");
        assert_eq!(json, "\"global\"");
    }
}
