//! Deterministic tree hashing for content comparison
//!
//! Two directories hash equal iff they hold the same relative paths with the
//! same bytes. The executor uses this to tell an identical earlier install
//! apart from a conflicting one.

use anyhow::Context;
use std::fs;
use std::path::Path;

/// Nesting limit; guards against symlink cycles inside a skill tree.
const MAX_DEPTH: usize = 64;

/// Compute deterministic tree hash of a directory
///
/// # Algorithm
/// - Recursive traversal, entries sorted by file name
/// - Directory entries: `blake3(relative_path || 0xFF)`
/// - File entries: `blake3(relative_path || 0x00 || content)`
/// - Output: hex string
///
/// Symlinks inside the tree are followed, so a copied tree and its source
/// produce the same hash. The root itself may be a symlink.
///
/// # Example
/// ```no_run
/// use skiff_core::fs::tree_hash::hash_tree;
/// use std::path::Path;
///
/// let hash = hash_tree(Path::new("/path/to/skill"))?;
/// assert_eq!(hash.len(), 64); // blake3 hex output
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn hash_tree(path: &Path) -> anyhow::Result<String> {
    let mut hasher = blake3::Hasher::new();
    hash_dir_recursive(&mut hasher, path, "", 0)?;
    Ok(hasher.finalize().to_hex().to_string())
}

/// Returns `true` when both trees exist and hash equal.
pub fn trees_identical(a: &Path, b: &Path) -> anyhow::Result<bool> {
    Ok(hash_tree(a)? == hash_tree(b)?)
}

fn hash_dir_recursive(
    hasher: &mut blake3::Hasher,
    dir: &Path,
    base: &str,
    depth: usize,
) -> anyhow::Result<()> {
    if depth > MAX_DEPTH {
        anyhow::bail!("Directory nesting too deep (symlink cycle?): {}", dir.display());
    }

    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?;

    let mut sorted_entries: Vec<_> = entries
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to read directory entries: {}", dir.display()))?;
    sorted_entries.sort_by_key(|e| e.file_name());

    for entry in sorted_entries {
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        let rel_path = if base.is_empty() {
            name_str.to_string()
        } else {
            format!("{}/{}", base, name_str)
        };

        let path = entry.path();
        let meta = fs::metadata(&path)
            .with_context(|| format!("Failed to stat file: {}", path.display()))?;

        if meta.is_dir() {
            hasher.update(rel_path.as_bytes());
            hasher.update(&[0xFF]);
            hash_dir_recursive(hasher, &path, &rel_path, depth + 1)?;
        } else if meta.is_file() {
            hasher.update(rel_path.as_bytes());
            hasher.update(&[0x00]);
            let content = fs::read(&path)
                .with_context(|| format!("Failed to read file: {}", path.display()))?;
            hasher.update(&content);
        } else {
            anyhow::bail!("Unsupported filesystem entry type: {}", path.display());
        }
    }

    Ok(())
}
