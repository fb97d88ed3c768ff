//! Skiff Core Library
//!
//! Installs skill bundles into the skill directories of multiple coding
//! agents, scans what is installed, and keeps an environment snapshot
//! (available update, global install) fresh under a latency budget.

pub mod agent;
pub mod audit;
pub mod background;
pub mod config;
pub mod context;
pub mod environment;
pub mod error;
pub mod fs;
pub mod orchestration;
pub mod skills;
pub mod types;
pub mod version;

/// Re-exports of commonly used types
pub mod prelude {
    // Agents
    pub use crate::agent::{Agent, AgentContext, AgentRegistry};

    // Context and configuration
    pub use crate::config::Settings;
    pub use crate::context::AppContext;

    // Errors
    pub use crate::error::{FailureReason, InstallError, VersionError};

    // Install
    pub use crate::fs::InstallMethod;
    pub use crate::orchestration::{
        InstallRequest, InstallResult, SkillInstaller, UninstallRequest, UninstallResult,
    };
    pub use crate::types::InstallScope;

    // Skills
    pub use crate::skills::{InstalledSkillMap, Skill, SkillScanner, load_catalog};

    // Audit
    pub use crate::audit::{AuditAction, AuditEntry, AuditLog};

    // Environment
    pub use crate::environment::{
        EnvironmentMonitor, EnvironmentSnapshot, GlobalInstallProbe, Notice, PathProbe,
    };
    pub use crate::version::{CheckState, UpdateResolver, VersionCache, VersionSource};
}
