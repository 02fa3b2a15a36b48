use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::EngineError;
use crate::types::{
    Catalog, InstallOutcome, NodeVersion, ReleaseDescriptor, RemoveOutcome, UseOutcome,
};

/// Asked before `use` installs a release that is not present locally.
pub type InstallPrompt<'a> = &'a (dyn Fn(&ReleaseDescriptor) -> bool + Send + Sync);

#[derive(Debug, Clone)]
pub struct UseRequest {
    /// Explicit specifier; when `None` the project's pin file is consulted.
    pub specifier: Option<String>,
    /// Directory the pin file lookup starts from.
    pub project_dir: PathBuf,
}

/// The surface a front end drives: resolve, install, remove, switch.
#[async_trait]
pub trait ReleaseManager: Send + Sync {
    async fn list_remote(&self) -> Result<Catalog, EngineError>;

    fn list_local(&self) -> Result<Catalog, EngineError>;

    fn active_version(&self) -> Result<Option<NodeVersion>, EngineError>;

    async fn resolve(&self, specifier: &str) -> Result<ReleaseDescriptor, EngineError>;

    async fn install(
        &self,
        specifier: &str,
        activate_after: bool,
    ) -> Result<InstallOutcome, EngineError>;

    async fn remove(&self, specifier: &str) -> Result<RemoveOutcome, EngineError>;

    async fn use_version(
        &self,
        request: UseRequest,
        confirm_install: InstallPrompt<'_>,
    ) -> Result<UseOutcome, EngineError>;
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    struct MockManager {
        remote: Vec<ReleaseDescriptor>,
    }

    #[async_trait]
    impl ReleaseManager for MockManager {
        async fn list_remote(&self) -> Result<Catalog, EngineError> {
            Ok(Catalog::remote(self.remote.clone()))
        }

        fn list_local(&self) -> Result<Catalog, EngineError> {
            Ok(Catalog::local(Vec::new()))
        }

        fn active_version(&self) -> Result<Option<NodeVersion>, EngineError> {
            Ok(None)
        }

        async fn resolve(&self, specifier: &str) -> Result<ReleaseDescriptor, EngineError> {
            Err(EngineError::VersionNotFound {
                specifier: specifier.to_string(),
            })
        }

        async fn install(
            &self,
            specifier: &str,
            _activate_after: bool,
        ) -> Result<InstallOutcome, EngineError> {
            Err(EngineError::VersionNotFound {
                specifier: specifier.to_string(),
            })
        }

        async fn remove(&self, specifier: &str) -> Result<RemoveOutcome, EngineError> {
            Err(EngineError::VersionNotFound {
                specifier: specifier.to_string(),
            })
        }

        async fn use_version(
            &self,
            request: UseRequest,
            _confirm_install: InstallPrompt<'_>,
        ) -> Result<UseOutcome, EngineError> {
            Err(EngineError::VersionNotFound {
                specifier: request.specifier.unwrap_or_default(),
            })
        }
    }

    fn remote(version: &str, lts_codename: Option<&str>) -> ReleaseDescriptor {
        ReleaseDescriptor {
            version: version.parse().expect("valid version in test"),
            lts_codename: lts_codename.map(str::to_string),
            release_date: None,
            npm_version: None,
        }
    }

    #[tokio::test]
    async fn remote_listing_keeps_date_order_through_a_trait_object() {
        let manager: Box<dyn ReleaseManager> = Box::new(MockManager {
            remote: vec![
                remote("v24.0.0", None),
                remote("v22.1.0", Some("Jod")),
                remote("v24.0.0", None),
            ],
        });

        let catalog = manager.list_remote().await.expect("listing succeeds");

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.newest().map(|r| r.version.to_string()).as_deref(), Some("v24.0.0"));
        assert!(catalog.releases()[1].is_lts());
    }

    #[tokio::test]
    async fn use_version_is_reachable_through_a_trait_object() {
        let manager: Box<dyn ReleaseManager> = Box::new(MockManager { remote: Vec::new() });
        let request = UseRequest {
            specifier: Some("lts".to_string()),
            project_dir: PathBuf::from("/tmp/project"),
        };

        let result = manager.use_version(request, &|_| false).await;

        assert!(
            matches!(result, Err(EngineError::VersionNotFound { ref specifier }) if specifier == "lts")
        );
    }
}
