//! Registry of the agents skills can be installed into.

use crate::error::InstallError;

use super::{Agent, AgentContext};

/// Agents known at build time.
pub const BUILTIN_AGENTS: &[Agent] = &[
    Agent {
        id: "claude-code",
        display_name: "Claude Code",
        local_root: ".claude/skills",
        global_root: ".claude/skills",
        home_marker: ".claude",
        project_marker: Some(".claude"),
    },
    Agent {
        id: "cursor",
        display_name: "Cursor",
        local_root: ".cursor/skills",
        global_root: ".cursor/skills",
        home_marker: ".cursor",
        project_marker: Some(".cursor"),
    },
    Agent {
        id: "codex",
        display_name: "Codex",
        local_root: ".codex/skills",
        global_root: ".codex/skills",
        home_marker: ".codex",
        project_marker: None,
    },
    Agent {
        id: "gemini-cli",
        display_name: "Gemini CLI",
        local_root: ".gemini/skills",
        global_root: ".gemini/skills",
        home_marker: ".gemini",
        project_marker: Some(".gemini"),
    },
    Agent {
        id: "github-copilot",
        display_name: "GitHub Copilot",
        local_root: ".github/skills",
        global_root: ".copilot/skills",
        home_marker: ".copilot",
        project_marker: None,
    },
    Agent {
        id: "opencode",
        display_name: "OpenCode",
        local_root: ".opencode/skill",
        global_root: ".config/opencode/skill",
        home_marker: ".config/opencode",
        project_marker: Some(".opencode"),
    },
    Agent {
        id: "windsurf",
        display_name: "Windsurf",
        local_root: ".windsurf/skills",
        global_root: ".codeium/windsurf/skills",
        home_marker: ".codeium/windsurf",
        project_marker: Some(".windsurf"),
    },
    Agent {
        id: "droid",
        display_name: "Droid",
        local_root: ".factory/skills",
        global_root: ".factory/skills",
        home_marker: ".factory",
        project_marker: Some(".factory"),
    },
];

/// Registry of available agents, bound to the paths they resolve against.
#[derive(Debug, Clone)]
pub struct AgentRegistry {
    agents: Vec<Agent>,
    ctx: AgentContext,
}

impl AgentRegistry {
    /// Create a registry with all built-in agents.
    pub fn with_default_agents(ctx: AgentContext) -> Self {
        Self {
            agents: BUILTIN_AGENTS.to_vec(),
            ctx,
        }
    }

    /// Create a registry over an explicit agent list.
    pub fn from_agents(agents: Vec<Agent>, ctx: AgentContext) -> Self {
        Self { agents, ctx }
    }

    pub fn context(&self) -> &AgentContext {
        &self.ctx
    }

    /// Every registered agent, in registration order.
    pub fn list_agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Get an agent by id.
    pub fn get(&self, id: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id == id)
    }

    /// Resolve request ids to agents, preserving request order.
    pub fn resolve(&self, ids: &[String]) -> Result<Vec<Agent>, InstallError> {
        ids.iter()
            .map(|id| {
                self.get(id)
                    .copied()
                    .ok_or_else(|| InstallError::UnknownAgent(id.clone()))
            })
            .collect()
    }

    /// Whether the agent appears to be present on this machine or project.
    ///
    /// Probe failures (permissions, broken links) count as absent.
    pub fn detect(&self, agent: &Agent) -> bool {
        let home_hit = self.ctx.home_dir.join(agent.home_marker).is_dir();
        let project_hit = agent
            .project_marker
            .map(|marker| self.ctx.project_root.join(marker).is_dir())
            .unwrap_or(false);
        home_hit || project_hit
    }

    /// Agents whose markers exist.
    pub fn detect_installed_agents(&self) -> Vec<Agent> {
        self.agents
            .iter()
            .filter(|a| self.detect(a))
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::path::PathBuf;

    fn ctx(tmp: &tempfile::TempDir) -> AgentContext {
        AgentContext::new(tmp.path().join("home"), tmp.path().join("project"))
    }

    #[test]
    fn builtin_ids_are_unique() {
        let ids: HashSet<_> = BUILTIN_AGENTS.iter().map(|a| a.id).collect();
        assert_eq!(ids.len(), BUILTIN_AGENTS.len());
    }

    #[test]
    fn resolve_reports_unknown_agent() {
        let registry = AgentRegistry::with_default_agents(AgentContext::new(
            PathBuf::from("/h"),
            PathBuf::from("/p"),
        ));
        let err = registry
            .resolve(&["cursor".to_string(), "vim".to_string()])
            .unwrap_err();
        assert_eq!(err, InstallError::UnknownAgent("vim".to_string()));
    }

    #[test]
    fn detect_uses_home_or_project_markers() {
        let tmp = tempfile::tempdir().expect("tempdir should succeed");
        let registry = AgentRegistry::with_default_agents(ctx(&tmp));
        let cursor = *registry.get("cursor").expect("cursor should be registered");
        let codex = *registry.get("codex").expect("codex should be registered");

        assert!(!registry.detect(&cursor));

        std::fs::create_dir_all(tmp.path().join("project").join(".cursor"))
            .expect("create_dir_all should succeed");
        std::fs::create_dir_all(tmp.path().join("home").join(".codex"))
            .expect("create_dir_all should succeed");

        assert!(registry.detect(&cursor));
        assert!(registry.detect(&codex));

        let detected: Vec<_> = registry
            .detect_installed_agents()
            .iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(detected, vec!["cursor", "codex"]);
    }
}
