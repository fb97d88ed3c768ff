//! Path discovery helpers.

use std::path::{Path, PathBuf};

use crate::audit::AGENTS_DIR;

pub const SETTINGS_FILE: &str = "config.toml";
const APP_DIR: &str = "skiff";

/// Per-user configuration directory (`<config_dir>/skiff`).
///
/// Falls back to `~/.config/skiff` on platforms without a config dir.
pub fn default_config_dir(home_dir: &Path) -> PathBuf {
    dirs::config_dir()
        .map(|p| p.join(APP_DIR))
        .unwrap_or_else(|| home_dir.join(".config").join(APP_DIR))
}

/// Walk up from `start` to the first directory holding `.git` or `.agents`.
///
/// Returns `start` itself when no ancestor qualifies.
pub fn find_project_root(start: &Path) -> PathBuf {
    start
        .ancestors()
        .find(|dir| dir.join(".git").exists() || dir.join(AGENTS_DIR).is_dir())
        .unwrap_or(start)
        .to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_root_is_nearest_marked_ancestor() {
        let tmp = tempfile::tempdir().expect("tempdir should succeed");
        let root = tmp.path().join("repo");
        let nested = root.join("src").join("deep");
        std::fs::create_dir_all(&nested).expect("create_dir_all should succeed");
        std::fs::create_dir_all(root.join(".git")).expect("create_dir_all should succeed");

        assert_eq!(find_project_root(&nested), root);
    }

    #[test]
    fn agents_dir_marks_a_project() {
        let tmp = tempfile::tempdir().expect("tempdir should succeed");
        let root = tmp.path().join("workspace");
        let nested = root.join("pkg");
        std::fs::create_dir_all(&nested).expect("create_dir_all should succeed");
        std::fs::create_dir_all(root.join(AGENTS_DIR)).expect("create_dir_all should succeed");

        assert_eq!(find_project_root(&nested), root);
    }

    #[test]
    fn unmarked_tree_falls_back_to_start() {
        let tmp = tempfile::tempdir().expect("tempdir should succeed");
        let start = tmp.path().join("a").join("b");
        std::fs::create_dir_all(&start).expect("create_dir_all should succeed");

        // The tempdir itself may live under a marked directory; only assert
        // that the result is `start` or one of its ancestors.
        let found = find_project_root(&start);
        assert!(start.starts_with(&found));
    }
}
