//! Directory materialization for delivering skills to agents.
//!
//! Every delivery builds the new entry at a hidden temp sibling of the
//! destination and renames it into place, so a failed copy never leaves a
//! half-written skill behind and an existing install is only removed once
//! its replacement is complete.

use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};

pub use crate::fs::InstallMethod;
use crate::fs::tree_hash::trees_identical;

#[derive(Debug, Clone)]
pub struct LinkerOptions {
    pub method: InstallMethod,
    /// Replace whatever occupies the destination.
    pub force: bool,
}

/// What a delivery did to the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Created,
    Replaced,
}

/// What currently occupies a destination path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Existing {
    Absent,
    /// Same content as the source (or a link to it).
    Identical,
    Different,
}

/// Compare the destination against the skill source.
///
/// A symlink is identical when it resolves to the source directory; a
/// directory is identical when its tree hash equals the source's. A dangling
/// link or an unreadable tree counts as different.
pub fn inspect_destination(src_dir: &Path, dst: &Path) -> anyhow::Result<Existing> {
    let meta = match fs::symlink_metadata(dst) {
        Ok(meta) => meta,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Existing::Absent),
        Err(err) => {
            return Err(anyhow::Error::new(err)
                .context(format!("Failed to stat destination: {}", dst.display())));
        }
    };

    if meta.file_type().is_symlink() {
        let same = match (fs::canonicalize(dst), fs::canonicalize(src_dir)) {
            (Ok(a), Ok(b)) => a == b || matches!(trees_identical(&a, &b), Ok(true)),
            _ => false,
        };
        return Ok(if same {
            Existing::Identical
        } else {
            Existing::Different
        });
    }

    if meta.is_dir() && matches!(trees_identical(src_dir, dst), Ok(true)) {
        return Ok(Existing::Identical);
    }
    Ok(Existing::Different)
}

/// Deliver `src_dir` to `dst` using the requested method.
///
/// Without `force` an occupied destination is an error; callers are expected
/// to have classified it with [`inspect_destination`] first.
pub fn deliver_dir(
    src_dir: &Path,
    dst: &Path,
    options: &LinkerOptions,
) -> anyhow::Result<Delivery> {
    ensure_src_dir(src_dir)?;
    ensure_parent_dir(dst)?;

    match options.method {
        InstallMethod::Copy => deliver_copy(src_dir, dst, options),
        InstallMethod::Symlink => deliver_symlink(src_dir, dst, options),
    }
}

fn ensure_src_dir(src_dir: &Path) -> anyhow::Result<()> {
    let meta = fs::metadata(src_dir)
        .with_context(|| format!("Failed to stat source directory: {}", src_dir.display()))?;
    if !meta.is_dir() {
        anyhow::bail!("Source path is not a directory: {}", src_dir.display());
    }
    Ok(())
}

fn ensure_parent_dir(dst: &Path) -> anyhow::Result<()> {
    let parent = dst
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Destination path has no parent: {}", dst.display()))?;
    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create destination parent: {}", parent.display()))?;
    Ok(())
}

fn deliver_copy(src_dir: &Path, dst: &Path, options: &LinkerOptions) -> anyhow::Result<Delivery> {
    let tmp_dir = unique_temp_path(dst)?;
    fs::create_dir_all(&tmp_dir)
        .with_context(|| format!("Failed to create temp directory: {}", tmp_dir.display()))?;

    if let Err(err) = copy_tree(src_dir, &tmp_dir, 0) {
        let _ = fs::remove_dir_all(&tmp_dir);
        return Err(err);
    }

    replace_dst_with_tmp(dst, &tmp_dir, options)
}

fn deliver_symlink(
    src_dir: &Path,
    dst: &Path,
    options: &LinkerOptions,
) -> anyhow::Result<Delivery> {
    let target = absolute_source(src_dir)?;
    let tmp = unique_temp_path(dst)?;

    if let Err(err) = create_dir_symlink(&target, &tmp) {
        let _ = remove_install(&tmp);
        if is_symlink_unsupported_os_error(&err) {
            return Err(SymlinkUnsupported {
                path: dst.to_path_buf(),
                source: err,
            }
            .into());
        }
        return Err(anyhow::Error::new(err).context("Failed to create symlink"));
    }

    replace_dst_with_tmp(dst, &tmp, options)
}

fn absolute_source(src_dir: &Path) -> anyhow::Result<PathBuf> {
    fs::canonicalize(src_dir)
        .with_context(|| format!("Failed to resolve source directory: {}", src_dir.display()))
}

fn replace_dst_with_tmp(
    dst: &Path,
    tmp_path: &Path,
    options: &LinkerOptions,
) -> anyhow::Result<Delivery> {
    let mut delivery = Delivery::Created;
    if fs::symlink_metadata(dst).is_ok() {
        if !options.force {
            let _ = remove_install(tmp_path);
            anyhow::bail!(
                "Destination already exists: {} (use force to override)",
                dst.display()
            );
        }
        if let Err(err) = remove_install(dst) {
            let _ = remove_install(tmp_path);
            return Err(anyhow::Error::new(err).context(format!(
                "Failed to remove existing destination: {}",
                dst.display()
            )));
        }
        delivery = Delivery::Replaced;
    }

    if let Err(err) = fs::rename(tmp_path, dst) {
        let _ = remove_install(tmp_path);
        return Err(anyhow::Error::new(err).context(format!(
            "Failed to move temp path {} into destination {}",
            tmp_path.display(),
            dst.display()
        )));
    }
    Ok(delivery)
}

/// Remove an installed entry without following links.
///
/// A symlink is unlinked and its target left alone; a copied directory is
/// removed recursively. Returns `false` when nothing was there.
pub fn remove_install(path: &Path) -> std::io::Result<bool> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };

    if meta.file_type().is_symlink() {
        remove_symlink(path)?;
    } else if meta.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    Ok(true)
}

#[cfg(windows)]
fn remove_symlink(path: &Path) -> std::io::Result<()> {
    fs::remove_dir(path).or_else(|_| fs::remove_file(path))
}

#[cfg(not(windows))]
fn remove_symlink(path: &Path) -> std::io::Result<()> {
    fs::remove_file(path)
}

/// Hidden sibling of `dst`; the scanner ignores dot-entries.
fn unique_temp_path(dst: &Path) -> anyhow::Result<PathBuf> {
    let parent = dst
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Destination path has no parent: {}", dst.display()))?;
    let base = dst
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Destination path has no filename: {}", dst.display()))?;

    for attempt in 0u32..1000 {
        let name = if attempt == 0 {
            format!(".{}.tmp.{}", base.to_string_lossy(), std::process::id())
        } else {
            format!(
                ".{}.tmp.{}.{}",
                base.to_string_lossy(),
                std::process::id(),
                attempt
            )
        };
        let candidate = parent.join(name);
        if fs::symlink_metadata(&candidate).is_err() {
            return Ok(candidate);
        }
    }

    anyhow::bail!("Failed to allocate a unique temp path for {}", dst.display());
}

const MAX_COPY_DEPTH: usize = 64;

fn copy_tree(src: &Path, dst: &Path, depth: usize) -> anyhow::Result<()> {
    if depth > MAX_COPY_DEPTH {
        anyhow::bail!("Directory nesting too deep (symlink cycle?): {}", src.display());
    }
    for entry in
        fs::read_dir(src).with_context(|| format!("Failed to read dir: {}", src.display()))?
    {
        let entry =
            entry.with_context(|| format!("Failed to read dir entry: {}", src.display()))?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let meta = fs::metadata(&from)
            .with_context(|| format!("Failed to stat dir entry: {}", from.display()))?;

        if meta.is_dir() {
            fs::create_dir_all(&to)
                .with_context(|| format!("Failed to create directory: {}", to.display()))?;
            copy_tree(&from, &to, depth + 1)?;
        } else if meta.is_file() {
            fs::copy(&from, &to).with_context(|| {
                format!(
                    "Failed to copy file from {} to {}",
                    from.display(),
                    to.display()
                )
            })?;
        } else {
            anyhow::bail!("Unsupported filesystem entry type at {}", from.display());
        }
    }
    Ok(())
}

/// The filesystem refused to create a directory symlink.
#[derive(Debug, thiserror::Error)]
#[error("Symlinks are not supported at {}", .path.display())]
pub struct SymlinkUnsupported {
    pub path: PathBuf,
    #[source]
    source: std::io::Error,
}

/// Whether a delivery failed at the symlink step itself.
///
/// Only [`SymlinkUnsupported`] counts; permission errors from creating
/// parents, copying, or replacing a destination do not.
pub fn is_symlink_unsupported_error(err: &anyhow::Error) -> bool {
    err.chain().any(|e| e.is::<SymlinkUnsupported>())
}

fn is_symlink_unsupported_os_error(err: &std::io::Error) -> bool {
    if err.kind() == std::io::ErrorKind::Unsupported {
        return true;
    }
    let Some(code) = err.raw_os_error() else {
        return false;
    };

    #[cfg(unix)]
    {
        // EPERM from symlink(2) means the filesystem refuses links (e.g. FAT, some mounts).
        const EPERM: i32 = 1;
        code == EPERM
    }

    #[cfg(windows)]
    {
        const ERROR_PRIVILEGE_NOT_HELD: i32 = 1314;
        code == ERROR_PRIVILEGE_NOT_HELD
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = code;
        false
    }
}

#[cfg(unix)]
fn create_dir_symlink(src_dir: &Path, dst_link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(src_dir, dst_link)
}

#[cfg(windows)]
fn create_dir_symlink(src_dir: &Path, dst_link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_dir(src_dir, dst_link)
}

#[cfg(not(any(unix, windows)))]
fn create_dir_symlink(_src_dir: &Path, _dst_link: &Path) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "Symlinks are not supported on this platform",
    ))
}
