//! Detection of a global (on-PATH) installation.

use std::path::{Path, PathBuf};

/// Synchronous check whether the running binary is the globally installed one.
///
/// Implementations may block; callers run them on the blocking pool.
pub trait GlobalInstallProbe: Send + Sync {
    fn is_globally_installed(&self) -> anyhow::Result<bool>;
}

/// Looks up `binary` on `PATH` and compares it with the running executable.
#[derive(Debug, Clone)]
pub struct PathProbe {
    binary: String,
    current_exe: Option<PathBuf>,
}

impl PathProbe {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            current_exe: std::env::current_exe().ok(),
        }
    }

    /// Probe that compares against `current_exe` instead of the real one.
    pub fn with_current_exe(binary: impl Into<String>, current_exe: PathBuf) -> Self {
        Self {
            binary: binary.into(),
            current_exe: Some(current_exe),
        }
    }
}

impl GlobalInstallProbe for PathProbe {
    fn is_globally_installed(&self) -> anyhow::Result<bool> {
        let on_path = match which::which(&self.binary) {
            Ok(path) => path,
            Err(which::Error::CannotFindBinaryPath) => return Ok(false),
            Err(err) => return Err(anyhow::anyhow!("PATH lookup for '{}' failed: {}", self.binary, err)),
        };
        // Without a known executable, finding the binary at all is enough.
        let Some(current_exe) = &self.current_exe else {
            return Ok(true);
        };
        Ok(same_file(&on_path, current_exe))
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_is_not_global() {
        let probe = PathProbe::new("skiff-binary-that-does-not-exist-3f9a");
        assert!(!probe.is_globally_installed().expect("probe should succeed"));
    }

    #[test]
    fn same_file_resolves_links() {
        let tmp = tempfile::tempdir().expect("tempdir should succeed");
        let file = tmp.path().join("bin");
        std::fs::write(&file, "").expect("write should succeed");
        let dotted = tmp.path().join(".").join("bin");
        assert!(same_file(&file, &dotted));
        assert!(!same_file(&file, &tmp.path().join("other")));
    }
}
