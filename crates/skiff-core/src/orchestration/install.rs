//! Install, update and uninstall of skills across agents.
//!
//! Every request expands to (agent, skill) pairs in agent-major order. Each
//! pair yields exactly one result; per-pair failures never abort the batch.
//! Pairs run on the blocking pool, and pairs that resolve to the same
//! destination path share a task so they never race each other.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::task::{JoinHandle, JoinSet};

use crate::agent::{Agent, AgentContext, AgentRegistry};
use crate::audit::{AuditAction, AuditLog, AuditRow};
use crate::error::{FailureReason, InstallError};
use crate::fs::InstallMethod;
use crate::skills::Skill;
use crate::skills::linker::{
    Existing, LinkerOptions, deliver_dir, inspect_destination, is_symlink_unsupported_error,
    remove_install,
};
use crate::types::InstallScope;

/// Validated description of an install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallRequest {
    /// Skills to install, by name. Empty selects every supplied skill.
    pub skills: Vec<String>,
    /// Agent ids, in the order results should appear.
    pub agents: Vec<String>,
    pub method: InstallMethod,
    pub scope: InstallScope,
    pub force: bool,
}

impl InstallRequest {
    pub fn new(agents: Vec<String>, method: InstallMethod, scope: InstallScope) -> Self {
        Self {
            skills: Vec::new(),
            agents,
            method,
            scope,
            force: false,
        }
    }

    pub fn with_skills(mut self, skills: Vec<String>) -> Self {
        self.skills = skills;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Build a request from loosely typed input, rejecting unknown values.
    pub fn parse(
        skills: Vec<String>,
        agents: Vec<String>,
        method: &str,
        scope: &str,
        force: bool,
    ) -> Result<Self, InstallError> {
        Ok(Self {
            skills,
            agents,
            method: method.parse()?,
            scope: scope.parse()?,
            force,
        })
    }
}

/// Outcome for one (agent, skill) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallResult {
    /// Agent display name.
    pub agent: String,
    pub agent_id: String,
    pub skill: String,
    pub success: bool,
    pub method: InstallMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailureReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl InstallResult {
    /// Short status shown in result rows.
    pub fn status(&self) -> String {
        match (self.success, &self.reason) {
            (true, None) => "installed".to_string(),
            (true, Some(reason)) => reason.to_string(),
            (false, Some(reason)) => format!("failed: {reason}"),
            (false, None) => "failed".to_string(),
        }
    }
}

impl AuditRow for InstallResult {
    fn skill(&self) -> &str {
        &self.skill
    }
    fn agent(&self) -> &str {
        &self.agent
    }
    fn succeeded(&self) -> bool {
        self.success
    }
}

/// Which installs to remove.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UninstallRequest {
    pub skills: Vec<String>,
    pub agents: Vec<String>,
    pub scope: InstallScope,
}

/// Outcome of removing one (agent, skill) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UninstallResult {
    pub agent: String,
    pub agent_id: String,
    pub skill: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailureReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl UninstallResult {
    pub fn status(&self) -> String {
        match (self.success, &self.reason) {
            (true, None) => "removed".to_string(),
            (true, Some(reason)) => reason.to_string(),
            (false, Some(reason)) => format!("failed: {reason}"),
            (false, None) => "failed".to_string(),
        }
    }
}

impl AuditRow for UninstallResult {
    fn skill(&self) -> &str {
        &self.skill
    }
    fn agent(&self) -> &str {
        &self.agent
    }
    fn succeeded(&self) -> bool {
        self.success
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PairMode {
    Install { force: bool },
    /// Reinstall only where the skill is already present.
    Update,
}

/// One (agent, skill) pair with its resolved destination.
#[derive(Debug, Clone)]
struct PairPlan {
    index: usize,
    agent: Agent,
    skill: Skill,
    dst: Result<PathBuf, String>,
}

/// Coordinates skill delivery into agent roots.
#[derive(Debug, Clone)]
pub struct SkillInstaller {
    registry: AgentRegistry,
    audit: Option<AuditLog>,
    pending_audit: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl SkillInstaller {
    pub fn new(registry: AgentRegistry) -> Self {
        Self {
            registry,
            audit: None,
            pending_audit: Arc::default(),
        }
    }

    /// Record a summary of every batch in `audit`.
    pub fn with_audit_log(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Install `skills` into every requested agent.
    ///
    /// Returns one result per (agent, skill) pair in request order. Only a
    /// malformed request (unknown agent or skill) is an error, and it is
    /// reported before anything is written.
    pub async fn install_skills(
        &self,
        skills: &[Skill],
        request: &InstallRequest,
    ) -> Result<Vec<InstallResult>, InstallError> {
        let mode = PairMode::Install {
            force: request.force,
        };
        let results = self.run(skills, request, mode).await?;
        self.audit_batch(AuditAction::Install, &results, request.force);
        Ok(results)
    }

    /// Refresh skills that are already installed, overwriting local content.
    ///
    /// Pairs where the skill is absent fail with `not-installed`.
    pub async fn update_skills(
        &self,
        skills: &[Skill],
        request: &InstallRequest,
    ) -> Result<Vec<InstallResult>, InstallError> {
        let results = self.run(skills, request, PairMode::Update).await?;
        self.audit_batch(AuditAction::Update, &results, true);
        Ok(results)
    }

    /// Remove installs. Absent skills count as removed.
    pub async fn uninstall_skills(
        &self,
        request: &UninstallRequest,
    ) -> Result<Vec<UninstallResult>, InstallError> {
        if request.skills.is_empty() || request.agents.is_empty() {
            return Ok(Vec::new());
        }
        ensure_unique(&request.agents, InstallError::DuplicateAgent)?;
        ensure_unique(&request.skills, InstallError::DuplicateSkill)?;
        let agents = self.registry.resolve(&request.agents)?;
        let names = request.skills.clone();
        let ctx = self.registry.context();

        let mut plans = Vec::with_capacity(agents.len() * names.len());
        for agent in &agents {
            for name in &names {
                plans.push(PairPlan {
                    index: plans.len(),
                    agent: *agent,
                    skill: Skill::new(name.clone(), "", PathBuf::new()),
                    dst: ctx
                        .skill_dir(agent, request.scope, name)
                        .map_err(|e| format!("{e:#}")),
                });
            }
        }

        let results = run_pairs(plans, |plan| remove_pair(plan), |plan, detail| UninstallResult {
            agent: plan.agent.display_name.to_string(),
            agent_id: plan.agent.id.to_string(),
            skill: plan.skill.name.clone(),
            success: false,
            reason: Some(FailureReason::Io(detail)),
            path: plan.dst.clone().ok(),
        })
        .await;

        self.audit_batch(AuditAction::Remove, &results, false);
        Ok(results)
    }

    async fn run(
        &self,
        skills: &[Skill],
        request: &InstallRequest,
        mode: PairMode,
    ) -> Result<Vec<InstallResult>, InstallError> {
        if skills.is_empty() || request.agents.is_empty() {
            return Ok(Vec::new());
        }
        ensure_unique(&request.agents, InstallError::DuplicateAgent)?;
        ensure_unique(&request.skills, InstallError::DuplicateSkill)?;
        let agents = self.registry.resolve(&request.agents)?;
        let selected = select_skills(skills, &request.skills)?;
        let plans = plan_pairs(self.registry.context(), &agents, &selected, request.scope);

        let method = request.method;
        let results = run_pairs(
            plans,
            move |plan| install_pair(plan, method, mode),
            move |plan, detail| InstallResult {
                agent: plan.agent.display_name.to_string(),
                agent_id: plan.agent.id.to_string(),
                skill: plan.skill.name.clone(),
                success: false,
                method,
                reason: Some(FailureReason::Io(detail)),
                path: plan.dst.clone().ok(),
            },
        )
        .await;
        Ok(results)
    }

    /// Wait for audit appends still in flight. Front ends call this before
    /// exiting so detached writes are not cut off.
    pub async fn flush_audit(&self) {
        let handles = match self.pending_audit.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(_) => return,
        };
        for handle in handles {
            let _ = handle.await;
        }
    }

    fn audit_batch<R: AuditRow>(&self, action: AuditAction, results: &[R], forced: bool) {
        let Some(audit) = &self.audit else {
            return;
        };
        if let Some(handle) = audit.record_batch(action, results, forced)
            && let Ok(mut pending) = self.pending_audit.lock()
        {
            pending.retain(|h| !h.is_finished());
            pending.push(handle);
        }
    }
}

fn ensure_unique(
    values: &[String],
    duplicate: fn(String) -> InstallError,
) -> Result<(), InstallError> {
    for (i, value) in values.iter().enumerate() {
        if values[..i].contains(value) {
            return Err(duplicate(value.clone()));
        }
    }
    Ok(())
}

fn select_skills(skills: &[Skill], names: &[String]) -> Result<Vec<Skill>, InstallError> {
    if names.is_empty() {
        return Ok(skills.to_vec());
    }
    names
        .iter()
        .map(|name| {
            skills
                .iter()
                .find(|s| &s.name == name)
                .cloned()
                .ok_or_else(|| InstallError::UnknownSkill(name.clone()))
        })
        .collect()
}

fn plan_pairs(
    ctx: &AgentContext,
    agents: &[Agent],
    skills: &[Skill],
    scope: InstallScope,
) -> Vec<PairPlan> {
    let mut plans = Vec::with_capacity(agents.len() * skills.len());
    for agent in agents {
        for skill in skills {
            plans.push(PairPlan {
                index: plans.len(),
                agent: *agent,
                skill: skill.clone(),
                dst: ctx
                    .skill_dir(agent, scope, &skill.name)
                    .map_err(|e| format!("{e:#}")),
            });
        }
    }
    plans
}

/// Run pair plans concurrently and return results in plan order.
///
/// Plans sharing a destination run sequentially in one blocking task. A task
/// that panics still produces one result per plan via `on_panic`.
async fn run_pairs<R, F, P>(plans: Vec<PairPlan>, exec: F, on_panic: P) -> Vec<R>
where
    R: Send + 'static,
    F: Fn(&PairPlan) -> R + Send + Sync + 'static,
    P: Fn(&PairPlan, String) -> R,
{
    let total = plans.len();
    let mut batches: Vec<Vec<PairPlan>> = Vec::new();
    let mut by_dst: HashMap<PathBuf, usize> = HashMap::new();
    for plan in &plans {
        match &plan.dst {
            Ok(dst) => {
                if let Some(&batch) = by_dst.get(dst) {
                    batches[batch].push(plan.clone());
                } else {
                    by_dst.insert(dst.clone(), batches.len());
                    batches.push(vec![plan.clone()]);
                }
            }
            Err(_) => batches.push(vec![plan.clone()]),
        }
    }

    let exec = Arc::new(exec);
    let mut tasks = JoinSet::new();
    for batch in batches {
        let exec = Arc::clone(&exec);
        tasks.spawn_blocking(move || {
            batch
                .iter()
                .map(|plan| (plan.index, exec(plan)))
                .collect::<Vec<_>>()
        });
    }

    let mut slots: Vec<Option<R>> = std::iter::repeat_with(|| None).take(total).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(done) => {
                for (index, result) in done {
                    slots[index] = Some(result);
                }
            }
            Err(err) => tracing::warn!(error = %err, "install task failed"),
        }
    }

    plans
        .iter()
        .zip(slots)
        .map(|(plan, slot)| {
            slot.unwrap_or_else(|| on_panic(plan, "install task aborted".to_string()))
        })
        .collect()
}

fn install_pair(plan: &PairPlan, method: InstallMethod, mode: PairMode) -> InstallResult {
    let finish = |success: bool, reason: Option<FailureReason>| InstallResult {
        agent: plan.agent.display_name.to_string(),
        agent_id: plan.agent.id.to_string(),
        skill: plan.skill.name.clone(),
        success,
        method,
        reason,
        path: plan.dst.clone().ok(),
    };

    let dst = match &plan.dst {
        Ok(dst) => dst,
        Err(detail) => return finish(false, Some(FailureReason::Io(detail.clone()))),
    };
    let src = &plan.skill.source_path;
    if !src.is_dir() {
        return finish(false, Some(FailureReason::NotFound));
    }

    let existing = match inspect_destination(src, dst) {
        Ok(existing) => existing,
        Err(err) => return finish(false, Some(FailureReason::Io(format!("{err:#}")))),
    };

    let force = match (mode, existing) {
        (PairMode::Update, Existing::Absent) => {
            return finish(false, Some(FailureReason::NotInstalled));
        }
        (PairMode::Update, _) => true,
        (PairMode::Install { force: false }, Existing::Identical) => {
            tracing::debug!(agent = plan.agent.id, skill = %plan.skill.name, "already installed");
            return finish(true, Some(FailureReason::AlreadyInstalled));
        }
        (PairMode::Install { force: false }, Existing::Different) => {
            return finish(false, Some(FailureReason::Conflict));
        }
        (PairMode::Install { force }, _) => force,
    };

    match deliver_dir(src, dst, &LinkerOptions { method, force }) {
        Ok(delivery) => {
            tracing::info!(
                agent = plan.agent.id,
                skill = %plan.skill.name,
                method = %method,
                ?delivery,
                path = %dst.display(),
                "skill delivered"
            );
            finish(true, None)
        }
        Err(err) if is_symlink_unsupported_error(&err) => {
            finish(false, Some(FailureReason::Unsupported))
        }
        Err(err) => {
            tracing::debug!(agent = plan.agent.id, skill = %plan.skill.name, error = %format!("{err:#}"), "delivery failed");
            finish(false, Some(FailureReason::Io(format!("{err:#}"))))
        }
    }
}

fn remove_pair(plan: &PairPlan) -> UninstallResult {
    let finish = |success: bool, reason: Option<FailureReason>| UninstallResult {
        agent: plan.agent.display_name.to_string(),
        agent_id: plan.agent.id.to_string(),
        skill: plan.skill.name.clone(),
        success,
        reason,
        path: plan.dst.clone().ok(),
    };

    let dst = match &plan.dst {
        Ok(dst) => dst,
        Err(detail) => return finish(false, Some(FailureReason::Io(detail.clone()))),
    };

    match remove_install(dst) {
        Ok(true) => {
            tracing::info!(agent = plan.agent.id, skill = %plan.skill.name, "skill removed");
            finish(true, None)
        }
        Ok(false) => finish(true, Some(FailureReason::NotInstalled)),
        Err(err) => finish(false, Some(FailureReason::Io(err.to_string()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_unknown_method_and_scope() {
        let err = InstallRequest::parse(vec![], vec!["cursor".into()], "hardlink", "local", false)
            .unwrap_err();
        assert_eq!(err, InstallError::InvalidMethod("hardlink".into()));

        let err = InstallRequest::parse(vec![], vec!["cursor".into()], "copy", "shared", false)
            .unwrap_err();
        assert_eq!(err, InstallError::InvalidScope("shared".into()));
    }

    #[test]
    fn select_skills_follows_request_order() {
        let skills = vec![
            Skill::new("a", "", "/a"),
            Skill::new("b", "", "/b"),
        ];
        let picked = select_skills(&skills, &["b".to_string(), "a".to_string()])
            .expect("selection should succeed");
        let names: Vec<_> = picked.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);

        let err = select_skills(&skills, &["c".to_string()]).unwrap_err();
        assert_eq!(err, InstallError::UnknownSkill("c".into()));
    }

    #[test]
    fn ensure_unique_names_the_first_repeat() {
        let ids = ["cursor", "codex", "cursor", "codex"].map(String::from);
        assert_eq!(
            ensure_unique(&ids, InstallError::DuplicateAgent),
            Err(InstallError::DuplicateAgent("cursor".into()))
        );
        assert_eq!(ensure_unique(&ids[..2], InstallError::DuplicateAgent), Ok(()));
    }

    #[test]
    fn status_labels() {
        let mut result = InstallResult {
            agent: "Cursor".into(),
            agent_id: "cursor".into(),
            skill: "s".into(),
            success: false,
            method: InstallMethod::Copy,
            reason: Some(FailureReason::Conflict),
            path: None,
        };
        assert_eq!(result.status(), "failed: conflict");
        result.success = true;
        result.reason = None;
        assert_eq!(result.status(), "installed");
    }
}
