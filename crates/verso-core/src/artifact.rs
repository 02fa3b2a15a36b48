use std::fmt;
use std::path::{Path, PathBuf};

use log::debug;
use tempfile::TempDir;
use verso_backend::{EngineError, ReleaseDescriptor};
use verso_platform::HostPlatform;

use crate::distribution::Distribution;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    TarXz,
    Zip,
}

impl ArchiveFormat {
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::TarGz => ".tar.gz",
            Self::TarXz => ".tar.xz",
            Self::Zip => ".zip",
        }
    }

    /// Detects the format from a file name's extension.
    ///
    /// # Errors
    /// Returns [`EngineError::UnsupportedFormat`] for anything else.
    pub fn from_path(path: &Path) -> Result<Self, EngineError> {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        [Self::TarXz, Self::TarGz, Self::Zip]
            .into_iter()
            .find(|format| name.ends_with(format.extension()))
            .ok_or_else(|| EngineError::UnsupportedFormat {
                extension: path
                    .extension()
                    .map(|ext| format!(".{}", ext.to_string_lossy()))
                    .unwrap_or_default(),
            })
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// The platform-specific artifact flavour to download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactTarget {
    pub os: String,
    pub arch: String,
    pub format: ArchiveFormat,
}

impl ArtifactTarget {
    /// Checks `host` against the published platform matrix and chooses the
    /// archive format. Runs before any network traffic.
    ///
    /// # Errors
    /// Returns [`EngineError::UnsupportedPlatform`] for combinations that have
    /// no published artifact.
    pub fn select(host: &HostPlatform, has_xz: bool) -> Result<Self, EngineError> {
        let supported_arches: &[&str] = match host.os() {
            "linux" => &["x64", "arm64", "armv7l", "ppc64le", "s390x"],
            "darwin" => &["x64", "arm64"],
            "sunos" => &["x64"],
            "aix" => &["ppc64"],
            "win" => &["x64", "x86", "arm64"],
            _ => &[],
        };

        if !supported_arches.contains(&host.arch()) {
            return Err(EngineError::UnsupportedPlatform {
                os: host.os().to_string(),
                arch: host.arch().to_string(),
            });
        }

        let format = match host.os() {
            "win" => ArchiveFormat::Zip,
            "aix" => ArchiveFormat::TarGz,
            _ if has_xz => ArchiveFormat::TarXz,
            _ => ArchiveFormat::TarGz,
        };

        Ok(Self {
            os: host.os().to_string(),
            arch: host.arch().to_string(),
            format,
        })
    }

    /// `<tool>-<version>-<os>-<arch><ext>`
    #[must_use]
    pub fn slug(&self, tool: &str, release: &ReleaseDescriptor) -> String {
        format!(
            "{tool}-{}-{}-{}{}",
            release.version, self.os, self.arch, self.format
        )
    }
}

/// A downloaded artifact. The scratch directory holding it is deleted when
/// the handle is dropped.
#[derive(Debug)]
pub struct Artifact {
    path: PathBuf,
    _scratch: TempDir,
}

impl Artifact {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Downloads the artifact for `release` into a fresh scratch directory under
/// `scratch_parent`.
///
/// # Errors
/// Returns the transfer error; the scratch directory is already gone by then.
pub async fn fetch_artifact<D>(
    distribution: &D,
    release: &ReleaseDescriptor,
    target: &ArtifactTarget,
    tool: &str,
    scratch_parent: &Path,
) -> Result<Artifact, EngineError>
where
    D: Distribution + ?Sized,
{
    std::fs::create_dir_all(scratch_parent)
        .map_err(|error| EngineError::io_at("failed to create", scratch_parent, &error))?;
    let scratch = tempfile::Builder::new()
        .prefix(".download-")
        .tempdir_in(scratch_parent)
        .map_err(|error| EngineError::io_at("failed to create scratch in", scratch_parent, &error))?;

    let slug = target.slug(tool, release);
    let path = scratch.path().join(&slug);
    debug!("Fetching {slug} into {}", scratch.path().display());
    distribution
        .download_artifact(&release.version, &slug, &path)
        .await?;

    Ok(Artifact {
        path,
        _scratch: scratch,
    })
}
