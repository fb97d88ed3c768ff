#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use skiff_core::agent::{AgentContext, AgentRegistry};
use skiff_core::skills::Skill;

pub fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create_dir_all should succeed in test temp dirs");
    }
    fs::write(path, content).expect("write should succeed in test temp dirs");
}

/// Isolated home directory, project root and skill catalog.
pub struct Sandbox {
    pub tmp: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        let tmp = tempfile::tempdir().expect("tempdir should succeed");
        for dir in ["home", "project", "catalog"] {
            fs::create_dir_all(tmp.path().join(dir))
                .expect("create_dir_all should succeed in test temp dirs");
        }
        Self { tmp }
    }

    pub fn home(&self) -> PathBuf {
        self.tmp.path().join("home")
    }

    pub fn project(&self) -> PathBuf {
        self.tmp.path().join("project")
    }

    pub fn catalog(&self) -> PathBuf {
        self.tmp.path().join("catalog")
    }

    pub fn registry(&self) -> AgentRegistry {
        AgentRegistry::with_default_agents(AgentContext::new(self.home(), self.project()))
    }

    /// Create `<catalog>/<name>` with a SKILL.md and one nested file.
    pub fn skill(&self, name: &str) -> Skill {
        let dir = self.catalog().join(name);
        write_file(
            &dir.join("SKILL.md"),
            &format!("---\nname: {name}\ndescription: {name} helper\n---\n# {name}\n"),
        );
        write_file(&dir.join("scripts").join("run.sh"), "echo hello\n");
        Skill::from_dir(&dir).expect("Skill::from_dir should succeed")
    }

    /// Local install path of `skill` for `agent_root` (e.g. `.cursor/skills`).
    pub fn local_install(&self, agent_root: &str, skill: &str) -> PathBuf {
        self.project().join(agent_root).join(skill)
    }
}
