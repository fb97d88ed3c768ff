//! Error taxonomy.
//!
//! Only [`InstallError`] ever reaches a caller as a hard failure, and only
//! from request validation. Per-pair failures are carried inside results as
//! [`FailureReason`]; version and cache failures degrade to fallback values
//! and surface as [`VersionError`] in logs only.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Malformed install/uninstall request, rejected before any mutation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InstallError {
    #[error("unknown agent '{0}'")]
    UnknownAgent(String),
    #[error("skill '{0}' is not in the supplied catalog")]
    UnknownSkill(String),
    #[error("agent '{0}' is listed more than once")]
    DuplicateAgent(String),
    #[error("skill '{0}' is listed more than once")]
    DuplicateSkill(String),
    #[error("unknown install method '{0}' (expected copy or symlink)")]
    InvalidMethod(String),
    #[error("unknown install scope '{0}' (expected local or global)")]
    InvalidScope(String),
}

/// Why a single (agent, skill) pair did not end in a fresh install.
///
/// Serialized as the short kebab-case tag shown in result rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind", content = "detail")]
pub enum FailureReason {
    /// Destination holds the same content already (success).
    AlreadyInstalled,
    /// Destination was absent on removal (success).
    NotInstalled,
    /// Destination exists with different content and `force` was not set.
    Conflict,
    /// Symlinks are not available on this platform or filesystem.
    Unsupported,
    /// Skill source directory is missing.
    NotFound,
    /// Permission, disk or other I/O failure.
    Io(String),
}

impl FailureReason {
    pub fn as_str(&self) -> &str {
        match self {
            FailureReason::AlreadyInstalled => "already-installed",
            FailureReason::NotInstalled => "not-installed",
            FailureReason::Conflict => "conflict",
            FailureReason::Unsupported => "unsupported",
            FailureReason::NotFound => "not-found",
            FailureReason::Io(_) => "io",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Io(detail) => write!(f, "io: {detail}"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Reasons a version check fell back instead of resolving.
#[derive(Debug, thiserror::Error)]
pub enum VersionError {
    #[error("remote version source unavailable: {0}")]
    RemoteUnavailable(String),
    #[error("version check exceeded {0:?}")]
    Timeout(Duration),
    #[error("update cache is corrupt: {0}")]
    CacheCorrupt(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_reason_renders_row_tags() {
        assert_eq!(FailureReason::Conflict.to_string(), "conflict");
        assert_eq!(FailureReason::Unsupported.to_string(), "unsupported");
        assert_eq!(FailureReason::AlreadyInstalled.to_string(), "already-installed");
        assert_eq!(
            FailureReason::Io("permission denied".into()).to_string(),
            "io: permission denied"
        );
    }

    #[test]
    fn failure_reason_serializes_with_kind_tag() {
        let json = serde_json::to_value(FailureReason::Conflict)
            .expect("FailureReason serialization should succeed");
        assert_eq!(json["kind"], "conflict");
    }
}
