//! Agent definitions and path resolution.
//!
//! An agent is a third-party coding assistant that discovers skills by
//! scanning a directory. Each agent has a project-relative root and a
//! home-relative root; see [`registry::BUILTIN_AGENTS`].

pub mod registry;

use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::types::InstallScope;

pub use registry::AgentRegistry;

/// Static description of one supported agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Agent {
    /// Stable identifier used in requests (`claude-code`, `cursor`, ...).
    pub id: &'static str,
    /// Human-readable label surfaced in results.
    pub display_name: &'static str,
    /// Skills root relative to the project root.
    pub local_root: &'static str,
    /// Skills root relative to the user's home directory.
    pub global_root: &'static str,
    /// Directory under home whose presence means the agent is installed.
    pub home_marker: &'static str,
    /// Directory under the project root that also signals the agent.
    pub project_marker: Option<&'static str>,
}

impl Agent {
    pub fn root_for(&self, scope: InstallScope) -> &'static str {
        match scope {
            InstallScope::Local => self.local_root,
            InstallScope::Global => self.global_root,
        }
    }
}

/// Filesystem anchors that agent roots are resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentContext {
    pub home_dir: PathBuf,
    pub project_root: PathBuf,
}

impl AgentContext {
    pub fn new(home_dir: PathBuf, project_root: PathBuf) -> Self {
        Self {
            home_dir,
            project_root,
        }
    }

    /// Context rooted at the real home directory and the current directory.
    pub fn from_env() -> anyhow::Result<Self> {
        let home_dir =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
        let project_root = std::env::current_dir()?;
        Ok(Self::new(home_dir, project_root))
    }

    /// Absolute skills root of `agent` for `scope`.
    pub fn config_root(&self, agent: &Agent, scope: InstallScope) -> anyhow::Result<PathBuf> {
        let relative = Path::new(agent.root_for(scope));
        ensure_relative_path(relative)?;
        let base = match scope {
            InstallScope::Local => &self.project_root,
            InstallScope::Global => &self.home_dir,
        };
        Ok(base.join(relative))
    }

    /// Install location of one skill.
    pub fn skill_dir(
        &self,
        agent: &Agent,
        scope: InstallScope,
        skill_name: &str,
    ) -> anyhow::Result<PathBuf> {
        ensure_plain_name(skill_name)?;
        Ok(self.config_root(agent, scope)?.join(skill_name))
    }
}

fn ensure_relative_path(path: &Path) -> anyhow::Result<()> {
    if path.is_absolute() {
        anyhow::bail!("Absolute paths not allowed in agent roots: {}", path.display());
    }
    for component in path.components() {
        if let Component::ParentDir = component {
            anyhow::bail!("Path traversal not allowed in agent roots: {}", path.display());
        }
    }
    Ok(())
}

fn ensure_plain_name(name: &str) -> anyhow::Result<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => anyhow::bail!("Invalid skill name: '{}'", name),
    }
}
