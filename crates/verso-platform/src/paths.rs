use std::path::PathBuf;
use thiserror::Error;

const APP_DIR: &str = "verso";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AppPathsError {
    #[error("Could not determine home directory")]
    HomeDirUnavailable,
    #[error("Could not determine config directory")]
    ConfigDirUnavailable,
    #[error("Could not determine data directory")]
    DataDirUnavailable,
}

/// Per-user directories the tool keeps its own files in.
///
/// The managed runtime versions live under `data_dir` unless the
/// configuration points the root somewhere else.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl AppPaths {
    /// Build application paths for the current platform.
    ///
    /// # Errors
    /// Returns an error when a required base directory (for example the user
    /// home/config/data directory) cannot be determined.
    pub fn new() -> Result<Self, AppPathsError> {
        #[cfg(target_os = "macos")]
        {
            let home = dirs::home_dir().ok_or(AppPathsError::HomeDirUnavailable)?;
            Ok(Self {
                config_dir: home.join("Library/Application Support").join(APP_DIR),
                data_dir: home.join("Library/Application Support").join(APP_DIR),
            })
        }

        #[cfg(not(target_os = "macos"))]
        {
            Ok(Self {
                config_dir: dirs::config_dir()
                    .ok_or(AppPathsError::ConfigDirUnavailable)?
                    .join(APP_DIR),
                data_dir: dirs::data_dir()
                    .ok_or(AppPathsError::DataDirUnavailable)?
                    .join(APP_DIR),
            })
        }
    }

    #[must_use]
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }

    #[must_use]
    pub fn log_file(&self) -> PathBuf {
        self.data_dir.join("verso.log")
    }

    /// Ensure all application directories exist on disk.
    ///
    /// # Errors
    /// Returns an error if any directory cannot be created.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::AppPaths;

    fn test_paths(root: &std::path::Path) -> AppPaths {
        AppPaths {
            config_dir: root.join("config"),
            data_dir: root.join("data"),
        }
    }

    #[test]
    fn file_paths_use_expected_filenames() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let paths = test_paths(temp.path());

        assert!(
            paths
                .settings_file()
                .ends_with(std::path::Path::new("config").join("settings.json"))
        );
        assert!(
            paths
                .log_file()
                .ends_with(std::path::Path::new("data").join("verso.log"))
        );
    }

    #[test]
    fn ensure_dirs_creates_all_directories() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let paths = test_paths(temp.path());

        paths
            .ensure_dirs()
            .expect("ensure_dirs should create application directories");

        assert!(paths.config_dir.is_dir());
        assert!(paths.data_dir.is_dir());
    }
}
