use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use verso_backend::NodeVersion;
use verso_platform::AppPaths;

pub const ROOT_DIR_ENV: &str = "VERSO_DIR";
pub const DIST_MIRROR_ENV: &str = "VERSO_NODE_DIST_MIRROR";

const DEFAULT_DIST_MIRROR: &str = "https://nodejs.org/dist";

/// Engine configuration, threaded explicitly into [`crate::Engine`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root of the managed tree. Empty until resolved by [`Config::load`].
    #[serde(default)]
    pub root_dir: PathBuf,

    #[serde(default = "default_dist_mirror")]
    pub dist_mirror: String,

    #[serde(default = "default_tool_name")]
    pub tool_name: String,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_true")]
    pub verify_checksums: bool,

    #[serde(default = "default_pin_file_name")]
    pub pin_file_name: String,
}

fn default_dist_mirror() -> String {
    DEFAULT_DIST_MIRROR.to_string()
}

fn default_tool_name() -> String {
    "node".to_string()
}

fn default_http_timeout() -> u64 {
    300
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_pin_file_name() -> String {
    ".nvmrc".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::new(),
            dist_mirror: default_dist_mirror(),
            tool_name: default_tool_name(),
            http_timeout_secs: default_http_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            verify_checksums: true,
            pin_file_name: default_pin_file_name(),
        }
    }
}

impl Config {
    /// Defaults rooted at `root_dir`.
    #[must_use]
    pub fn with_root(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Self::default()
        }
    }

    /// Reads `settings.json` from the config directory, falling back to
    /// defaults when it is missing or unreadable, then applies environment
    /// overrides.
    #[must_use]
    pub fn load(paths: &AppPaths) -> Self {
        let mut config = Self::read_settings(&paths.settings_file());
        config.apply_overrides(|name| std::env::var(name).ok());
        if config.root_dir.as_os_str().is_empty() {
            config.root_dir.clone_from(&paths.data_dir);
        }
        // The active link stores absolute targets.
        if let Ok(absolute) = std::path::absolute(&config.root_dir) {
            config.root_dir = absolute;
        }
        debug!("Using root directory {}", config.root_dir.display());
        config
    }

    fn read_settings(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|error| {
                warn!("Ignoring unparsable settings {}: {error}", path.display());
                Self::default()
            }),
            Err(error) => {
                warn!("Could not read settings {}: {error}", path.display());
                Self::default()
            }
        }
    }

    /// Applies `VERSO_DIR` and `VERSO_NODE_DIST_MIRROR`. Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(root) = lookup(ROOT_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            self.root_dir = PathBuf::from(root);
        }
        if let Some(mirror) = lookup(DIST_MIRROR_ENV).filter(|v| !v.trim().is_empty()) {
            self.dist_mirror = mirror;
        }
    }

    /// Distribution base URL without a trailing slash.
    #[must_use]
    pub fn dist_base(&self) -> &str {
        self.dist_mirror.trim_end_matches('/')
    }

    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    #[must_use]
    pub fn layout(&self) -> Layout {
        Layout::new(self.root_dir.clone())
    }
}

/// Every on-disk location the engine touches, derived from one root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn versions_dir(&self) -> PathBuf {
        self.root.join("versions")
    }

    #[must_use]
    pub fn version_dir(&self, version: &NodeVersion) -> PathBuf {
        self.versions_dir().join(version.to_string())
    }

    #[must_use]
    pub fn lock_file(&self, version: &NodeVersion) -> PathBuf {
        self.versions_dir().join(format!(".{version}.lock"))
    }

    /// The active pointer.
    #[must_use]
    pub fn active_link(&self) -> PathBuf {
        self.root.join("bin")
    }

    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    #[must_use]
    pub fn catalog_snapshot(&self) -> PathBuf {
        self.cache_dir().join("remote-catalog.json")
    }
}

/// Entries in `versions/` starting with a dot are staging directories and
/// lock files.
#[must_use]
pub fn is_hidden_entry(name: &str) -> bool {
    name.starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::{Config, DIST_MIRROR_ENV, Layout, ROOT_DIR_ENV};
    use std::path::PathBuf;
    use verso_backend::NodeVersion;
    use verso_platform::AppPaths;

    fn paths_in(root: &std::path::Path) -> AppPaths {
        AppPaths {
            config_dir: root.join("config"),
            data_dir: root.join("data"),
        }
    }

    #[test]
    fn defaults_match_public_distribution() {
        let config = Config::default();

        assert_eq!(config.dist_base(), "https://nodejs.org/dist");
        assert_eq!(config.tool_name, "node");
        assert_eq!(config.http_timeout_secs, 300);
        assert_eq!(config.connect_timeout_secs, 10);
        assert!(config.verify_checksums);
        assert_eq!(config.pin_file_name, ".nvmrc");
    }

    #[test]
    fn partial_settings_file_keeps_other_defaults() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let paths = paths_in(temp.path());
        std::fs::create_dir_all(&paths.config_dir).unwrap();
        std::fs::write(
            paths.settings_file(),
            r#"{ "dist_mirror": "https://mirror.example/node/", "verify_checksums": false }"#,
        )
        .unwrap();

        let config = Config::load(&paths);

        assert_eq!(config.dist_base(), "https://mirror.example/node");
        assert!(!config.verify_checksums);
        assert_eq!(config.tool_name, "node");
    }

    #[test]
    fn garbage_settings_file_falls_back_to_defaults() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let paths = paths_in(temp.path());
        std::fs::create_dir_all(&paths.config_dir).unwrap();
        std::fs::write(paths.settings_file(), "not json").unwrap();

        let config = Config::load(&paths);

        assert_eq!(config.http_timeout_secs, 300);
    }

    #[test]
    fn overrides_replace_root_and_mirror() {
        let mut config = Config::with_root("/data/verso");

        config.apply_overrides(|name| match name {
            ROOT_DIR_ENV => Some("/opt/node-versions".to_string()),
            DIST_MIRROR_ENV => Some("https://npmmirror.com/mirrors/node".to_string()),
            _ => None,
        });

        assert_eq!(config.root_dir, PathBuf::from("/opt/node-versions"));
        assert_eq!(config.dist_base(), "https://npmmirror.com/mirrors/node");
    }

    #[test]
    fn blank_overrides_are_ignored() {
        let mut config = Config::with_root("/data/verso");

        config.apply_overrides(|_| Some("  ".to_string()));

        assert_eq!(config.root_dir, PathBuf::from("/data/verso"));
        assert_eq!(config.dist_base(), "https://nodejs.org/dist");
    }

    #[test]
    fn layout_derives_paths_from_root() {
        let layout = Layout::new(PathBuf::from("/r"));
        let version = NodeVersion::new(20, 1, 0);

        assert_eq!(layout.version_dir(&version), PathBuf::from("/r/versions/v20.1.0"));
        assert_eq!(layout.lock_file(&version), PathBuf::from("/r/versions/.v20.1.0.lock"));
        assert_eq!(layout.active_link(), PathBuf::from("/r/bin"));
        assert_eq!(
            layout.catalog_snapshot(),
            PathBuf::from("/r/cache/remote-catalog.json")
        );
    }
}
