use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use verso_backend::{EngineError, NodeVersion};
use verso_platform::{read_link_target, remove_link, replace_symlink};

use crate::config::Layout;

/// What the active pointer should target for an installed release: its `bin`
/// directory, or the release root when there is none (Windows layout).
#[must_use]
pub fn activation_target(version_dir: &Path) -> PathBuf {
    let bin = version_dir.join("bin");
    if bin.is_dir() {
        bin
    } else {
        version_dir.to_path_buf()
    }
}

/// Repoints the active link at `version_dir`, replacing whatever was there.
///
/// # Errors
/// Returns [`EngineError::Internal`] if `version_dir` is not a directory, or
/// an I/O error if the link cannot be swapped.
pub fn activate(layout: &Layout, version_dir: &Path) -> Result<(), EngineError> {
    if !version_dir.is_dir() {
        return Err(EngineError::internal(format!(
            "cannot activate missing release {}",
            version_dir.display()
        )));
    }

    let link = layout.active_link();
    if let Some(parent) = link.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|error| EngineError::io_at("failed to create", parent, &error))?;
    }

    let target = activation_target(version_dir);
    replace_symlink(&target, &link)
        .map_err(|error| EngineError::io_at("failed to update", &link, &error))?;
    info!("Activated {}", version_dir.display());
    Ok(())
}

/// Deletes the active link if it targets `version_dir`.
///
/// Returns whether the link was removed.
///
/// # Errors
/// Returns an I/O error if the link cannot be read or removed.
pub fn deactivate_if_pointing_at(layout: &Layout, version_dir: &Path) -> Result<bool, EngineError> {
    let link = layout.active_link();
    let Some(target) = read_link_target(&link)
        .map_err(|error| EngineError::io_at("failed to read", &link, &error))?
    else {
        return Ok(false);
    };

    if !target.starts_with(version_dir) {
        debug!("Active link targets {}, leaving it", target.display());
        return Ok(false);
    }

    remove_link(&link).map_err(|error| EngineError::io_at("failed to remove", &link, &error))?;
    info!("Deactivated {}", version_dir.display());
    Ok(true)
}

/// The installed version the active link targets.
///
/// `None` when nothing is active, or when the link dangles or points outside
/// the versions directory.
///
/// # Errors
/// Returns an I/O error if the link cannot be read.
pub fn active_version(layout: &Layout) -> Result<Option<NodeVersion>, EngineError> {
    let link = layout.active_link();
    let Some(target) = read_link_target(&link)
        .map_err(|error| EngineError::io_at("failed to read", &link, &error))?
    else {
        return Ok(None);
    };

    let version_dir = if target.file_name().is_some_and(|name| name == "bin") {
        target.parent().unwrap_or(target.as_path())
    } else {
        target.as_path()
    };

    if version_dir.parent() != Some(layout.versions_dir().as_path()) {
        warn!("Active link points outside the versions directory: {}", target.display());
        return Ok(None);
    }
    if !version_dir.is_dir() {
        warn!("Active link dangles: {}", target.display());
        return Ok(None);
    }

    Ok(version_dir
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.parse().ok()))
}
