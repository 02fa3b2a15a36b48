use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use log::{debug, info, warn};
use verso_backend::EngineError;
use xz2::read::XzDecoder;

use crate::artifact::ArchiveFormat;

/// Entry points shipped inside the release tree, linked from its `bin`.
#[cfg(unix)]
const AUX_TOOLS: [(&str, &str); 3] = [
    ("npm", "../lib/node_modules/npm/bin/npm-cli.js"),
    ("npx", "../lib/node_modules/npm/bin/npx-cli.js"),
    ("corepack", "../lib/node_modules/corepack/dist/corepack.js"),
];

/// Unpacks `artifact` so that `dest` becomes the release root.
///
/// Everything is written into a hidden staging directory beside `dest` and
/// renamed into place at the end; on failure `dest` is never created.
///
/// # Errors
/// Returns [`EngineError::UnsupportedFormat`] for unknown extensions and
/// [`EngineError::ExtractionFailed`] or an I/O error otherwise.
pub fn install_archive(artifact: &Path, dest: &Path, tool: &str) -> Result<(), EngineError> {
    let format = ArchiveFormat::from_path(artifact)?;
    let parent = dest
        .parent()
        .ok_or_else(|| EngineError::internal(format!("{} has no parent", dest.display())))?;
    std::fs::create_dir_all(parent)
        .map_err(|error| EngineError::io_at("failed to create", parent, &error))?;

    let staging = tempfile::Builder::new()
        .prefix(".staging-")
        .tempdir_in(parent)
        .map_err(|error| EngineError::io_at("failed to create staging in", parent, &error))?;

    debug!(
        "Extracting {} ({format}) into {}",
        artifact.display(),
        staging.path().display()
    );
    let file = File::open(artifact)
        .map_err(|error| EngineError::io_at("failed to open", artifact, &error))?;
    match format {
        ArchiveFormat::TarGz => extract_tar(GzDecoder::new(BufReader::new(file)), staging.path())?,
        ArchiveFormat::TarXz => extract_tar(XzDecoder::new(BufReader::new(file)), staging.path())?,
        ArchiveFormat::Zip => extract_zip(file, staging.path())?,
    }
    finalize_release(staging.path(), tool)?;

    let staged = staging.keep();
    if let Err(error) = std::fs::rename(&staged, dest) {
        let _ = std::fs::remove_dir_all(&staged);
        return Err(EngineError::io_at("failed to move release into", dest, &error));
    }

    info!("Installed release tree at {}", dest.display());
    Ok(())
}

fn extraction_error(context: &str, error: &std::io::Error) -> EngineError {
    EngineError::extraction(format!("{context}: {error}"))
}

/// Drops `.` components; rejects absolute paths and `..`.
fn sanitize(path: &Path) -> Result<PathBuf, EngineError> {
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(EngineError::extraction(format!(
                    "refusing to extract {}",
                    path.display()
                )));
            }
        }
    }
    Ok(clean)
}

/// The directory every entry is assumed to live under, judged from the first
/// entry.
fn top_level_dir(first: &Path, first_is_dir: bool) -> Option<PathBuf> {
    let mut components = first.components();
    let root = components.next()?;
    if first_is_dir || components.next().is_some() {
        Some(PathBuf::from(root.as_os_str()))
    } else {
        None
    }
}

/// `None` for the top-level directory entry itself.
fn strip_top_level(path: &Path, prefix: Option<&Path>) -> Option<PathBuf> {
    let relative = match prefix {
        Some(prefix) => path.strip_prefix(prefix).unwrap_or(path),
        None => path,
    };
    if relative.as_os_str().is_empty() {
        None
    } else {
        Some(relative.to_path_buf())
    }
}

/// Whether a symlink at `link` (relative to the release root) pointing at
/// `target` would resolve outside the release.
fn link_escapes_root(link: &Path, target: &Path) -> bool {
    if target.has_root() {
        return true;
    }
    let mut depth = link.components().count().saturating_sub(1);
    for component in target.components() {
        match component {
            Component::ParentDir => {
                if depth == 0 {
                    return true;
                }
                depth -= 1;
            }
            Component::Normal(_) => depth += 1,
            _ => {}
        }
    }
    false
}

fn extract_tar<R: Read>(reader: R, dest: &Path) -> Result<(), EngineError> {
    let mut archive = tar::Archive::new(reader);
    let mut prefix: Option<Option<PathBuf>> = None;

    let entries = archive
        .entries()
        .map_err(|error| extraction_error("failed to read tar entries", &error))?;
    for entry in entries {
        let mut entry = entry.map_err(|error| extraction_error("failed to read tar entry", &error))?;
        let raw_path = entry
            .path()
            .map_err(|error| extraction_error("invalid tar entry path", &error))?
            .into_owned();
        let path = sanitize(&raw_path)?;
        let kind = entry.header().entry_type();

        let strip = prefix.get_or_insert_with(|| top_level_dir(&path, kind.is_dir()));
        let Some(relative) = strip_top_level(&path, strip.as_deref()) else {
            continue;
        };
        let out_path = dest.join(&relative);

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|error| EngineError::io_at("failed to create", parent, &error))?;
        }

        if kind.is_hard_link() {
            let target = entry
                .link_name()
                .map_err(|error| extraction_error("invalid hard link", &error))?
                .ok_or_else(|| EngineError::extraction("hard link without target"))?;
            let target = sanitize(&target)?;
            let target = strip_top_level(&target, strip.as_deref())
                .ok_or_else(|| EngineError::extraction("hard link to archive root"))?;
            std::fs::hard_link(dest.join(target), &out_path)
                .map_err(|error| extraction_error("failed to create hard link", &error))?;
            continue;
        }

        if kind.is_symlink() {
            let target = entry
                .link_name()
                .map_err(|error| extraction_error("invalid symlink", &error))?
                .ok_or_else(|| EngineError::extraction("symlink without target"))?;
            if link_escapes_root(&relative, &target) {
                return Err(EngineError::extraction(format!(
                    "symlink {} points outside the release",
                    relative.display()
                )));
            }
        }

        entry.unpack(&out_path).map_err(|error| {
            extraction_error(&format!("failed to extract {}", relative.display()), &error)
        })?;
    }

    Ok(())
}

fn extract_zip(file: File, dest: &Path) -> Result<(), EngineError> {
    let mut archive = zip::ZipArchive::new(BufReader::new(file))
        .map_err(|error| EngineError::extraction(format!("failed to read zip archive: {error}")))?;
    let mut prefix: Option<Option<PathBuf>> = None;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|error| EngineError::extraction(format!("failed to read zip entry: {error}")))?;
        let path = entry.enclosed_name().ok_or_else(|| {
            EngineError::extraction(format!("refusing to extract {}", entry.name()))
        })?;
        let path = sanitize(&path)?;

        let strip = prefix.get_or_insert_with(|| top_level_dir(&path, entry.is_dir()));
        let Some(relative) = strip_top_level(&path, strip.as_deref()) else {
            continue;
        };
        let out_path = dest.join(&relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)
                .map_err(|error| EngineError::io_at("failed to create", &out_path, &error))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|error| EngineError::io_at("failed to create", parent, &error))?;
        }
        let mut outfile = File::create(&out_path)
            .map_err(|error| EngineError::io_at("failed to create", &out_path, &error))?;
        std::io::copy(&mut entry, &mut outfile).map_err(|error| {
            extraction_error(&format!("failed to extract {}", relative.display()), &error)
        })?;

        #[cfg(unix)]
        {
            if let Some(mode) = entry.unix_mode() {
                set_mode(&out_path, mode & 0o7777)?;
            }
        }
    }

    Ok(())
}

/// Post-extraction fixups: the release must contain its primary executable,
/// which is made executable, and the bundled entry points are linked.
fn finalize_release(root: &Path, tool: &str) -> Result<(), EngineError> {
    let primary = root.join("bin").join(tool);
    let windows_primary = root.join(format!("{tool}.exe"));
    if !primary.is_file() && !windows_primary.is_file() {
        return Err(EngineError::extraction(format!(
            "archive does not contain a {tool} executable"
        )));
    }

    #[cfg(unix)]
    {
        set_mode(root, 0o755)?;
        if primary.is_file() {
            set_mode(&primary, 0o755)?;
        }
        link_aux_tools(&root.join("bin"))?;
    }

    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<(), EngineError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .map_err(|error| EngineError::io_at("failed to set permissions on", path, &error))
}

#[cfg(unix)]
fn link_aux_tools(bin: &Path) -> Result<(), EngineError> {
    for (name, target) in AUX_TOOLS {
        if !bin.join(target).exists() {
            debug!("Release ships no {name}");
            continue;
        }
        let link = bin.join(name);
        verso_platform::replace_symlink(Path::new(target), &link)
            .map_err(|error| EngineError::io_at("failed to link", &link, &error))?;
    }
    Ok(())
}

/// Removes an installed release tree.
///
/// # Errors
/// Returns an I/O error if the tree cannot be deleted.
pub fn remove_release(dir: &Path) -> Result<(), EngineError> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            warn!("{} was already gone", dir.display());
            Ok(())
        }
        Err(error) => Err(EngineError::io_at("failed to remove", dir, &error)),
    }
}
