//! Enumeration of skills currently present in agent roots.

use std::collections::BTreeMap;
use std::io::ErrorKind;

use serde::Serialize;
use tokio::task::JoinSet;

use crate::agent::{Agent, AgentContext, AgentRegistry};
use crate::types::InstallScope;

use super::MARKER_FILE;

/// Skill name → ids of the agents that have it (local ∪ global, deduplicated).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct InstalledSkillMap {
    entries: BTreeMap<String, Vec<String>>,
}

impl InstalledSkillMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `agent_id` for `skill`, ignoring repeats.
    pub fn insert(&mut self, skill: &str, agent_id: &str) {
        let agents = self.entries.entry(skill.to_string()).or_default();
        if !agents.iter().any(|a| a == agent_id) {
            agents.push(agent_id.to_string());
        }
    }

    pub fn agents_for(&self, skill: &str) -> &[String] {
        self.entries.get(skill).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_installed(&self, skill: &str) -> bool {
        self.entries.contains_key(skill)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Scans agent roots for installed skills.
#[derive(Debug, Clone)]
pub struct SkillScanner {
    registry: AgentRegistry,
}

impl SkillScanner {
    pub fn new(registry: AgentRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Installed skill names for one agent and scope, sorted.
    ///
    /// A missing root yields an empty list.
    pub async fn list_installed_skills(
        &self,
        agent_id: &str,
        scope: InstallScope,
    ) -> anyhow::Result<Vec<String>> {
        let agent = self
            .registry
            .get(agent_id)
            .ok_or_else(|| anyhow::anyhow!("unknown agent '{}'", agent_id))?;
        list_installed_skills(self.registry.context(), agent, scope).await
    }

    /// Build the installed-skill map across every known agent.
    ///
    /// Agents are scanned concurrently, each agent's local and global roots
    /// in parallel. An agent whose scan fails contributes nothing.
    pub async fn fetch_installed_skills(&self) -> InstalledSkillMap {
        let mut tasks = JoinSet::new();
        for (index, agent) in self.registry.list_agents().iter().copied().enumerate() {
            let ctx = self.registry.context().clone();
            tasks.spawn(async move {
                let (local, global) = tokio::join!(
                    list_installed_skills(&ctx, &agent, InstallScope::Local),
                    list_installed_skills(&ctx, &agent, InstallScope::Global),
                );
                (index, agent, local.and_then(|l| global.map(|g| (l, g))))
            });
        }

        let mut per_agent: Vec<(usize, &'static str, Vec<String>)> = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, agent, Ok((local, global)))) => {
                    let mut names = local;
                    names.extend(global);
                    per_agent.push((index, agent.id, names));
                }
                Ok((_, agent, Err(err))) => {
                    tracing::warn!(agent = agent.id, error = %err, "failed to scan installed skills");
                }
                Err(err) => {
                    tracing::warn!(error = %err, "skill scan task failed");
                }
            }
        }

        // Registry order keeps agent lists deterministic.
        per_agent.sort_by_key(|(index, _, _)| *index);
        let mut map = InstalledSkillMap::new();
        for (_, agent_id, names) in per_agent {
            for name in names {
                map.insert(&name, agent_id);
            }
        }
        map
    }
}

/// Installed skill names under one agent root.
///
/// A skill counts when `<root>/<name>/SKILL.md` is a file. Hidden entries
/// (including in-flight temp dirs) are ignored, as are entries that vanish
/// mid-scan; an unreadable directory stream ends the scan with what was seen.
pub async fn list_installed_skills(
    ctx: &AgentContext,
    agent: &Agent,
    scope: InstallScope,
) -> anyhow::Result<Vec<String>> {
    let root = ctx.config_root(agent, scope)?;
    let mut dir = match tokio::fs::read_dir(&root).await {
        Ok(dir) => dir,
        Err(err) if matches!(err.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
            return Ok(Vec::new());
        }
        Err(err) => {
            return Err(anyhow::Error::new(err)
                .context(format!("Failed to read skills root: {}", root.display())));
        }
    };

    let mut names = Vec::new();
    loop {
        let entry = match dir.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(err) => {
                tracing::debug!(root = %root.display(), error = %err, "stopping scan at unreadable entry");
                break;
            }
        };
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        let marker = entry.path().join(MARKER_FILE);
        if let Ok(meta) = tokio::fs::metadata(&marker).await
            && meta.is_file()
        {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_deduplicates_agents_per_skill() {
        let mut map = InstalledSkillMap::new();
        map.insert("pdf", "cursor");
        map.insert("pdf", "cursor");
        map.insert("pdf", "codex");
        assert_eq!(map.agents_for("pdf"), ["cursor".to_string(), "codex".to_string()]);
        assert!(map.agents_for("missing").is_empty());
        assert_eq!(map.len(), 1);
    }
}
