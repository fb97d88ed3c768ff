use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InstallError;

/// How a skill directory is materialized under an agent's root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallMethod {
    /// Independent copy of every file in the skill source.
    Copy,
    /// Directory link back to the skill source; the source must stay resolvable.
    Symlink,
}

impl Default for InstallMethod {
    fn default() -> Self {
        Self::Symlink
    }
}

impl InstallMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            InstallMethod::Copy => "copy",
            InstallMethod::Symlink => "symlink",
        }
    }
}

impl fmt::Display for InstallMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstallMethod {
    type Err = InstallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "copy" => Ok(InstallMethod::Copy),
            "symlink" | "link" => Ok(InstallMethod::Symlink),
            other => Err(InstallError::InvalidMethod(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_method() {
        let err = "hardlink".parse::<InstallMethod>().unwrap_err();
        assert_eq!(err.to_string(), "unknown install method 'hardlink' (expected copy or symlink)");
    }

    #[test]
    fn method_round_trips_through_display() {
        for method in [InstallMethod::Copy, InstallMethod::Symlink] {
            assert_eq!(method.to_string().parse::<InstallMethod>().ok(), Some(method));
        }
    }
}
