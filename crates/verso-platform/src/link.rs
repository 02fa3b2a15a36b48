use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use log::debug;

/// Points `link` at `target`, replacing whatever `link` was.
///
/// The new link is created under a temporary name next to `link` and renamed
/// over it, so readers see either the old pointer or the new one. A real
/// directory sitting at `link` is removed first. Relative targets are
/// resolved against the directory containing `link`.
///
/// # Errors
/// Returns an error if the link cannot be created or moved into place.
pub fn replace_symlink(target: &Path, link: &Path) -> io::Result<()> {
    let parent = link.parent().unwrap_or_else(|| Path::new("."));
    let name = link
        .file_name()
        .map_or_else(|| "link".into(), |n| n.to_string_lossy().into_owned());
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default();
    let staged = parent.join(format!(".{name}.tmp-{}-{nanos}", std::process::id()));

    create_link(target, &staged, parent)?;

    let result = swap_into_place(&staged, link);
    if result.is_err() {
        let _ = remove_link(&staged);
    }
    result
}

fn swap_into_place(staged: &Path, link: &Path) -> io::Result<()> {
    match std::fs::symlink_metadata(link) {
        Ok(meta) if meta.is_dir() => {
            debug!("Replacing directory {} with a link", link.display());
            std::fs::remove_dir_all(link)?;
        }
        Ok(_) => {
            // Windows cannot rename over an existing link.
            #[cfg(windows)]
            remove_link(link)?;
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    std::fs::rename(staged, link)
}

#[cfg(unix)]
fn create_link(target: &Path, link: &Path, _base: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_link(target: &Path, link: &Path, base: &Path) -> io::Result<()> {
    if base.join(target).is_dir() {
        std::os::windows::fs::symlink_dir(target, link)
    } else {
        std::os::windows::fs::symlink_file(target, link)
    }
}

/// Removes `link` if it is a symbolic link. Real files and directories are
/// left alone.
///
/// Returns whether a link was removed.
///
/// # Errors
/// Returns an error if the link exists but cannot be removed.
pub fn remove_link(link: &Path) -> io::Result<bool> {
    match std::fs::symlink_metadata(link) {
        Ok(meta) if meta.file_type().is_symlink() => {
            // Directory links on Windows need remove_dir.
            if std::fs::remove_file(link).is_err() {
                std::fs::remove_dir(link)?;
            }
            Ok(true)
        }
        Ok(_) => Ok(false),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// The path `link` points at, resolved against its parent when relative.
///
/// `None` when `link` is missing or is not a symbolic link. Dangling links
/// still report their target.
///
/// # Errors
/// Returns an error if the link metadata or target cannot be read.
pub fn read_link_target(link: &Path) -> io::Result<Option<PathBuf>> {
    match std::fs::symlink_metadata(link) {
        Ok(meta) if meta.file_type().is_symlink() => {
            let raw = std::fs::read_link(link)?;
            if raw.is_absolute() {
                return Ok(Some(raw));
            }
            let parent = link.parent().unwrap_or_else(|| Path::new("."));
            Ok(Some(parent.join(raw)))
        }
        Ok(_) => Ok(None),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
