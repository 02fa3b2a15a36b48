//! The release engine behind verso.
//!
//! This crate turns version specifiers into installed, activated releases:
//! - Release index fetching/parsing and the installed-versions scan.
//! - Specifier resolution (`latest`, `lts`, channel names, partial versions).
//! - Artifact selection and download with SHA-256 verification.
//! - Staged archive extraction (`.tar.gz`, `.tar.xz`, `.zip`).
//! - The active-version pointer and per-version install locks.

mod activation;
mod archive;
mod artifact;
mod catalog;
mod config;
mod distribution;
mod engine;
mod lock;
mod resolve;

pub use activation::{activate, activation_target, active_version, deactivate_if_pointing_at};
pub use archive::{install_archive, remove_release};
pub use artifact::{ArchiveFormat, Artifact, ArtifactTarget, fetch_artifact};
pub use catalog::{enrich_local, fetch_remote, load_local, parse_index, read_snapshot, write_snapshot};
/// Engine configuration and the on-disk layout derived from it.
pub use config::{Config, DIST_MIRROR_ENV, Layout, ROOT_DIR_ENV};
pub use distribution::{Distribution, HttpDistribution};
pub use engine::Engine;
pub use lock::InstallLock;
pub use resolve::{PartialVersion, Specifier, find_pin_file, read_pinned_specifier, resolve};
