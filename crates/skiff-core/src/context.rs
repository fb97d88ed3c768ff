//! Application context for unified dependency injection.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::agent::{AgentContext, AgentRegistry};
use crate::audit::AuditLog;
use crate::config::{SETTINGS_FILE, Settings, default_config_dir, find_project_root};
use crate::environment::{EnvironmentMonitor, GlobalInstallProbe, PathProbe};
use crate::orchestration::SkillInstaller;
use crate::skills::SkillScanner;
use crate::version::{NpmRegistrySource, UpdateResolver, VersionCache, VersionSource};

/// Version reported by the environment snapshot.
pub const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared services and paths.
///
/// Front ends create this once and hand out the services it builds.
#[derive(Debug, Clone)]
pub struct AppContext {
    home_dir: PathBuf,
    project_root: PathBuf,
    config_dir: PathBuf,
    settings: Settings,
}

impl AppContext {
    /// Create a context with explicit paths and settings.
    pub fn new(home_dir: PathBuf, project_root: PathBuf, config_dir: PathBuf, settings: Settings) -> Self {
        Self {
            home_dir,
            project_root,
            config_dir,
            settings,
        }
    }

    /// Context for the current user and working directory.
    ///
    /// The project root is the nearest ancestor holding `.git` or `.agents`.
    pub fn from_env() -> anyhow::Result<Self> {
        let home_dir =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
        let cwd = std::env::current_dir()?;
        let project_root = find_project_root(&cwd);
        let config_dir = default_config_dir(&home_dir);
        let settings = Settings::load(&config_dir.join(SETTINGS_FILE))?;
        Ok(Self::new(home_dir, project_root, config_dir, settings))
    }

    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn agent_context(&self) -> AgentContext {
        AgentContext::new(self.home_dir.clone(), self.project_root.clone())
    }

    pub fn agent_registry(&self) -> AgentRegistry {
        AgentRegistry::with_default_agents(self.agent_context())
    }

    pub fn skill_scanner(&self) -> SkillScanner {
        SkillScanner::new(self.agent_registry())
    }

    pub fn audit_log(&self) -> AuditLog {
        AuditLog::for_project(&self.project_root)
    }

    /// Installer that records every batch in the project audit log.
    pub fn skill_installer(&self) -> SkillInstaller {
        SkillInstaller::new(self.agent_registry()).with_audit_log(self.audit_log())
    }

    pub fn version_cache(&self) -> VersionCache {
        VersionCache::in_dir(&self.config_dir)
    }

    /// Resolver backed by the configured npm registry.
    pub fn update_resolver(&self) -> anyhow::Result<UpdateResolver> {
        let source = NpmRegistrySource::new(&self.settings.registry_url, &self.settings.package)?;
        Ok(self.update_resolver_with(Arc::new(source)))
    }

    pub fn update_resolver_with(&self, source: Arc<dyn VersionSource>) -> UpdateResolver {
        UpdateResolver::new(
            source,
            self.version_cache(),
            CURRENT_VERSION,
            self.settings.update_check_timeout(),
        )
    }

    /// Monitor using the npm registry and a PATH probe for `binary`.
    pub fn environment_monitor(&self, binary: &str) -> anyhow::Result<EnvironmentMonitor> {
        Ok(self.environment_monitor_with(
            self.update_resolver()?,
            Arc::new(PathProbe::new(binary)),
        ))
    }

    pub fn environment_monitor_with(
        &self,
        resolver: UpdateResolver,
        probe: Arc<dyn GlobalInstallProbe>,
    ) -> EnvironmentMonitor {
        EnvironmentMonitor::new(resolver, probe, self.settings.publish_late_results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AGENTS_DIR, AUDIT_LOG_FILE};

    #[test]
    fn services_share_paths() {
        let tmp = tempfile::tempdir().expect("tempdir should succeed");
        let ctx = AppContext::new(
            tmp.path().join("home"),
            tmp.path().join("project"),
            tmp.path().join("config"),
            Settings::default(),
        );

        assert_eq!(ctx.agent_context().project_root, tmp.path().join("project"));
        assert_eq!(
            ctx.audit_log().path(),
            tmp.path().join("project").join(AGENTS_DIR).join(AUDIT_LOG_FILE)
        );
        assert_eq!(
            ctx.version_cache().path(),
            tmp.path().join("config").join("update-cache.json")
        );
        assert_eq!(ctx.skill_scanner().registry().list_agents().len(), 8);
    }
}
