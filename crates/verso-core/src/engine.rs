use async_trait::async_trait;
use log::{debug, info, warn};
use verso_backend::{
    Catalog, EngineError, ErrorKind, InstallOutcome, InstallPrompt, InstallState, NodeVersion,
    ReleaseDescriptor, ReleaseManager, RemoveOutcome, UseOutcome, UseRequest,
};
use verso_platform::{HostPlatform, has_xz_support};

use crate::activation;
use crate::archive::{install_archive, remove_release};
use crate::artifact::{ArtifactTarget, fetch_artifact};
use crate::catalog;
use crate::config::{Config, Layout};
use crate::distribution::{Distribution, HttpDistribution};
use crate::lock::InstallLock;
use crate::resolve::{Specifier, read_pinned_specifier, resolve};

/// Installs, removes and switches releases under one root directory.
///
/// Every operation runs to completion before returning; nothing is done in
/// the background.
pub struct Engine<D = HttpDistribution> {
    config: Config,
    layout: Layout,
    distribution: D,
    host: HostPlatform,
    has_xz: bool,
}

impl Engine<HttpDistribution> {
    /// An engine talking to the configured distribution mirror over HTTPS.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: Config) -> Result<Self, EngineError> {
        let distribution = HttpDistribution::new(&config)?;
        Ok(Self::new(config, distribution))
    }
}

impl<D: Distribution> Engine<D> {
    /// Uses the detected host platform and probes for xz support.
    pub fn new(config: Config, distribution: D) -> Self {
        let host = HostPlatform::detect();
        let has_xz = has_xz_support(host.os());
        Self::with_host(config, distribution, host, has_xz)
    }

    pub fn with_host(config: Config, distribution: D, host: HostPlatform, has_xz: bool) -> Self {
        let layout = config.layout();
        Self {
            config,
            layout,
            distribution,
            host,
            has_xz,
        }
    }

    /// Answered from the filesystem every time.
    #[must_use]
    pub fn install_state(&self, version: &NodeVersion) -> InstallState {
        let dir = self.layout.version_dir(version);
        if dir.is_dir() {
            InstallState::Installed(dir)
        } else {
            InstallState::NotInstalled
        }
    }

    async fn fetch_remote_catalog(&self) -> Result<Catalog, EngineError> {
        let remote = catalog::fetch_remote(&self.distribution).await?;
        catalog::write_snapshot(&self.layout.catalog_snapshot(), &remote);
        Ok(remote)
    }

    fn local_catalog(&self) -> Result<Catalog, EngineError> {
        let local = catalog::load_local(&self.layout)?;
        Ok(match catalog::read_snapshot(&self.layout.catalog_snapshot()) {
            Some(snapshot) => catalog::enrich_local(local, &snapshot),
            None => local,
        })
    }

    fn ensure_not_installed(&self, version: &NodeVersion) -> Result<(), EngineError> {
        if self.install_state(version).is_installed() {
            return Err(EngineError::AlreadyInstalled {
                version: version.clone(),
            });
        }
        Ok(())
    }

    async fn install_specifier(
        &self,
        specifier: &str,
        activate_after: bool,
    ) -> Result<InstallOutcome, EngineError> {
        if let Some(version) = Specifier::parse(specifier).exact_version() {
            self.ensure_not_installed(&version)?;
        }
        let target = ArtifactTarget::select(&self.host, self.has_xz)?;

        // The snapshot is only written once the release is known to be missing.
        let remote = catalog::fetch_remote(&self.distribution).await?;
        let release = resolve(specifier, &remote)?;
        self.ensure_not_installed(&release.version)?;
        catalog::write_snapshot(&self.layout.catalog_snapshot(), &remote);
        self.install_release(release, &target, activate_after).await
    }

    async fn install_release(
        &self,
        release: ReleaseDescriptor,
        target: &ArtifactTarget,
        activate_after: bool,
    ) -> Result<InstallOutcome, EngineError> {
        let version = release.version.clone();
        self.ensure_not_installed(&version)?;
        let first_install = catalog::load_local(&self.layout)?.is_empty();

        let _lock = InstallLock::acquire(&self.layout, &version)?;
        self.ensure_not_installed(&version)?;

        let artifact = fetch_artifact(
            &self.distribution,
            &release,
            target,
            &self.config.tool_name,
            &self.layout.cache_dir(),
        )
        .await?;

        let version_dir = self.layout.version_dir(&version);
        let source = artifact.path().to_path_buf();
        let dest = version_dir.clone();
        let tool = self.config.tool_name.clone();
        tokio::task::spawn_blocking(move || install_archive(&source, &dest, &tool))
            .await
            .map_err(|error| EngineError::internal(format!("extraction task failed: {error}")))??;
        drop(artifact);

        let activated = first_install || activate_after;
        if activated {
            activation::activate(&self.layout, &version_dir)?;
        }

        info!("Installed {version}");
        Ok(InstallOutcome {
            release,
            path: version_dir,
            activated,
        })
    }

    fn remove_specifier(&self, specifier: &str) -> Result<RemoveOutcome, EngineError> {
        let version = match Specifier::parse(specifier).exact_version() {
            Some(version) if !self.install_state(&version).is_installed() => {
                return Err(EngineError::NotInstalled { version });
            }
            Some(version) => version,
            None => resolve(specifier, &self.local_catalog()?)?.version,
        };

        let lock = InstallLock::acquire(&self.layout, &version)?;
        let version_dir = self.layout.version_dir(&version);
        let was_active = activation::deactivate_if_pointing_at(&self.layout, &version_dir)?;
        remove_release(&version_dir)?;
        lock.delete_file();

        info!("Removed {version}");
        Ok(RemoveOutcome {
            version,
            was_active,
        })
    }

    async fn use_specifier(
        &self,
        request: UseRequest,
        confirm_install: InstallPrompt<'_>,
    ) -> Result<UseOutcome, EngineError> {
        let specifier = match request.specifier {
            Some(specifier) if !specifier.trim().is_empty() => specifier,
            _ => read_pinned_specifier(&request.project_dir, &self.config.pin_file_name)?,
        };

        let release = match Specifier::parse(&specifier).exact_version() {
            Some(version) if self.install_state(&version).is_installed() => {
                debug!("{version} is installed, skipping catalog lookup");
                self.local_catalog()?
                    .find(&version)
                    .cloned()
                    .unwrap_or_else(|| ReleaseDescriptor::bare(version))
            }
            _ => {
                let catalog = match self.fetch_remote_catalog().await {
                    Ok(remote) => remote,
                    Err(error) if error.kind() == ErrorKind::Unavailable => {
                        warn!("Release index unavailable, resolving locally: {error}");
                        self.local_catalog()?
                    }
                    Err(error) => return Err(error),
                };
                resolve(&specifier, &catalog)?
            }
        };

        let installed_now = if self.install_state(&release.version).is_installed() {
            false
        } else {
            if !confirm_install(&release) {
                return Err(EngineError::NotInstalled {
                    version: release.version,
                });
            }
            let target = ArtifactTarget::select(&self.host, self.has_xz)?;
            self.install_release(release.clone(), &target, false).await?;
            true
        };

        activation::activate(&self.layout, &self.layout.version_dir(&release.version))?;
        Ok(UseOutcome {
            release,
            installed_now,
        })
    }
}

#[async_trait]
impl<D: Distribution> ReleaseManager for Engine<D> {
    async fn list_remote(&self) -> Result<Catalog, EngineError> {
        self.fetch_remote_catalog()
            .await
            .map_err(|error| error.context("list", "remote releases"))
    }

    fn list_local(&self) -> Result<Catalog, EngineError> {
        self.local_catalog()
    }

    fn active_version(&self) -> Result<Option<NodeVersion>, EngineError> {
        activation::active_version(&self.layout)
    }

    async fn resolve(&self, specifier: &str) -> Result<ReleaseDescriptor, EngineError> {
        let remote = self.fetch_remote_catalog().await?;
        resolve(specifier, &remote)
    }

    async fn install(
        &self,
        specifier: &str,
        activate_after: bool,
    ) -> Result<InstallOutcome, EngineError> {
        self.install_specifier(specifier, activate_after)
            .await
            .map_err(|error| error.context("install", specifier))
    }

    async fn remove(&self, specifier: &str) -> Result<RemoveOutcome, EngineError> {
        self.remove_specifier(specifier)
            .map_err(|error| error.context("remove", specifier))
    }

    async fn use_version(
        &self,
        request: UseRequest,
        confirm_install: InstallPrompt<'_>,
    ) -> Result<UseOutcome, EngineError> {
        let subject = request
            .specifier
            .clone()
            .unwrap_or_else(|| self.config.pin_file_name.clone());
        self.use_specifier(request, confirm_install)
            .await
            .map_err(|error| error.context("use", subject))
    }
}
