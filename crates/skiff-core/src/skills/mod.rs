//! Skills: catalog entries, delivery into agent roots, and scanning.

pub mod linker;
pub mod scanner;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub use scanner::{InstalledSkillMap, SkillScanner};

/// File whose presence inside `<root>/<skill>/` marks the skill as installed.
pub const MARKER_FILE: &str = "SKILL.md";

/// A skill from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    /// Unique identifier, also the install directory name.
    pub name: String,
    pub description: String,
    /// Directory holding the skill's files.
    #[serde(rename = "path")]
    pub source_path: PathBuf,
}

impl Skill {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        source_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            source_path: source_path.into(),
        }
    }

    /// Read a skill from a directory containing a `SKILL.md`.
    ///
    /// `name` and `description` come from the front matter; the directory
    /// name is used when the front matter has no name.
    pub fn from_dir(dir: &Path) -> anyhow::Result<Self> {
        let marker = dir.join(MARKER_FILE);
        let content = fs::read_to_string(&marker)
            .with_context(|| format!("Failed to read {}", marker.display()))?;
        let front = parse_front_matter(&content);
        let dir_name = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| anyhow::anyhow!("Skill directory has no name: {}", dir.display()))?;

        Ok(Self {
            name: front.name.unwrap_or(dir_name),
            description: front.description.unwrap_or_default(),
            source_path: dir.to_path_buf(),
        })
    }
}

/// Load every skill under a catalog directory, sorted by name.
///
/// Directories named `(group)` are category folders and are searched one
/// level deeper. Directories without a `SKILL.md` are skipped.
pub fn load_catalog(dir: &Path) -> anyhow::Result<Vec<Skill>> {
    let mut skills = Vec::new();
    collect_catalog(dir, &mut skills, true)?;
    skills.sort_by(|a, b| a.name.cmp(&b.name));
    skills.dedup_by(|a, b| a.name == b.name);
    Ok(skills)
}

fn collect_catalog(dir: &Path, out: &mut Vec<Skill>, allow_groups: bool) -> anyhow::Result<()> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("Failed to read catalog: {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to read dir entry: {}", dir.display()))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if allow_groups && name.starts_with('(') && name.ends_with(')') {
            collect_catalog(&path, out, false)?;
        } else if path.join(MARKER_FILE).is_file() {
            out.push(Skill::from_dir(&path)?);
        }
    }
    Ok(())
}

#[derive(Debug, Default)]
struct FrontMatter {
    name: Option<String>,
    description: Option<String>,
}

fn parse_front_matter(content: &str) -> FrontMatter {
    let mut lines = content.lines();
    let mut front = FrontMatter::default();
    if lines.next().map(str::trim) != Some("---") {
        return front;
    }
    for line in lines {
        let line = line.trim();
        if line == "---" {
            break;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().trim_matches(|c| c == '"' || c == '\'').to_string();
        if value.is_empty() {
            continue;
        }
        match key.trim() {
            "name" => front.name = Some(value),
            "description" => front.description = Some(value),
            _ => {}
        }
    }
    front
}
