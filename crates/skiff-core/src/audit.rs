//! Append-only audit trail of install, remove and update actions.
//!
//! One JSON object per line at `<project>/.agents/audit.log`. Writes go
//! through [`crate::background::spawn_best_effort`]; a failed write never
//! affects the action being recorded.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;

use crate::background::spawn_best_effort;

pub const AGENTS_DIR: &str = ".agents";
pub const AUDIT_LOG_FILE: &str = "audit.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Install,
    Remove,
    Update,
}

/// One line of the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub action: AuditAction,
    pub skill_name: String,
    /// Agent display names the action was attempted on.
    pub agents: Vec<String>,
    pub success: usize,
    pub failed: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forced: Option<bool>,
    pub timestamp: DateTime<Utc>,
}

/// A per-pair outcome that can be summarized into audit entries.
pub trait AuditRow {
    fn skill(&self) -> &str;
    fn agent(&self) -> &str;
    fn succeeded(&self) -> bool;
}

/// Collapse per-pair rows into one entry per skill, in first-seen order.
pub fn summarize<R: AuditRow>(action: AuditAction, rows: &[R], forced: bool) -> Vec<AuditEntry> {
    let timestamp = Utc::now();
    let mut entries: Vec<AuditEntry> = Vec::new();
    for row in rows {
        let existing = entries.iter().position(|e| e.skill_name == row.skill());
        let entry = match existing {
            Some(i) => &mut entries[i],
            None => {
                entries.push(AuditEntry {
                    action,
                    skill_name: row.skill().to_string(),
                    agents: Vec::new(),
                    success: 0,
                    failed: 0,
                    forced: (action != AuditAction::Remove).then_some(forced),
                    timestamp,
                });
                let last = entries.len() - 1;
                &mut entries[last]
            }
        };
        if !entry.agents.iter().any(|a| a == row.agent()) {
            entry.agents.push(row.agent().to_string());
        }
        if row.succeeded() {
            entry.success += 1;
        } else {
            entry.failed += 1;
        }
    }
    entries
}

#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Log stored under the project's `.agents` directory.
    pub fn for_project(project_root: &Path) -> Self {
        Self::new(project_root.join(AGENTS_DIR).join(AUDIT_LOG_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append entries, creating the directory on first use.
    pub async fn append(&self, entries: &[AuditEntry]) -> anyhow::Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create audit directory: {}", parent.display()))?;
        }

        let mut buf = Vec::new();
        for entry in entries {
            serde_json::to_writer(&mut buf, entry).context("Failed to serialize audit entry")?;
            buf.push(b'\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open audit log: {}", self.path.display()))?;
        file.write_all(&buf)
            .await
            .with_context(|| format!("Failed to append audit log: {}", self.path.display()))?;
        file.flush().await?;
        Ok(())
    }

    /// Summarize a batch and append it in the background.
    pub fn record_batch<R: AuditRow>(
        &self,
        action: AuditAction,
        rows: &[R],
        forced: bool,
    ) -> Option<JoinHandle<()>> {
        let entries = summarize(action, rows, forced);
        if entries.is_empty() {
            return None;
        }
        let log = self.clone();
        spawn_best_effort("audit-log", async move { log.append(&entries).await })
    }

    /// Parse the log, skipping lines that are not valid entries.
    pub async fn read_entries(&self) -> anyhow::Result<Vec<AuditEntry>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(anyhow::Error::new(err)
                    .context(format!("Failed to read audit log: {}", self.path.display())));
            }
        };
        Ok(content
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Row(&'static str, &'static str, bool);

    impl AuditRow for Row {
        fn skill(&self) -> &str {
            self.0
        }
        fn agent(&self) -> &str {
            self.1
        }
        fn succeeded(&self) -> bool {
            self.2
        }
    }

    #[test]
    fn summarize_groups_by_skill() {
        let rows = [
            Row("pdf", "Cursor", true),
            Row("pdf", "Claude Code", false),
            Row("xlsx", "Cursor", true),
        ];
        let entries = summarize(AuditAction::Install, &rows, false);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].skill_name, "pdf");
        assert_eq!(entries[0].agents, vec!["Cursor", "Claude Code"]);
        assert_eq!((entries[0].success, entries[0].failed), (1, 1));
        assert_eq!(entries[0].forced, Some(false));

        let removed = summarize(AuditAction::Remove, &rows[..1], false);
        assert_eq!(removed[0].forced, None);
    }

    #[test]
    fn entry_serializes_camel_case() {
        let entry = summarize(AuditAction::Update, &[Row("pdf", "Codex", true)], true).remove(0);
        let json = serde_json::to_value(&entry).expect("AuditEntry serialization should succeed");
        assert_eq!(json["action"], "update");
        assert_eq!(json["skillName"], "pdf");
        assert_eq!(json["forced"], true);
        assert!(json["timestamp"].as_str().is_some_and(|t| t.ends_with('Z')));
    }

    #[tokio::test]
    async fn append_then_read_back() {
        let tmp = tempfile::tempdir().expect("tempdir should succeed");
        let log = AuditLog::for_project(tmp.path());
        let entries = summarize(AuditAction::Install, &[Row("pdf", "Cursor", true)], false);

        log.append(&entries).await.expect("append should succeed");
        log.append(&entries).await.expect("append should succeed");

        let read = log.read_entries().await.expect("read should succeed");
        assert_eq!(read.len(), 2);
        assert_eq!(read[0], entries[0]);
    }
}
