//! Install/update/remove orchestration across agents.

pub mod install;

pub use install::{
    InstallRequest, InstallResult, SkillInstaller, UninstallRequest, UninstallResult,
};
