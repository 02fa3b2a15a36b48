use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl NodeVersion {
    #[must_use]
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl Ord for NodeVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
    }
}

impl PartialOrd for NodeVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for NodeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionComponent {
    Major,
    Minor,
    Patch,
}

impl fmt::Display for VersionComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Major => write!(f, "major"),
            Self::Minor => write!(f, "minor"),
            Self::Patch => write!(f, "patch"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionParseError {
    #[error("Expected vX.Y.Z format, got: {input}")]
    InvalidFormat { input: String },
    #[error("Invalid {component} version: {value}")]
    InvalidComponent {
        component: VersionComponent,
        value: String,
    },
}

fn parse_component(value: &str, component: VersionComponent) -> Result<u32, VersionParseError> {
    value
        .parse()
        .map_err(|_| VersionParseError::InvalidComponent {
            component,
            value: value.to_string(),
        })
}

impl FromStr for NodeVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let body = trimmed.strip_prefix('v').unwrap_or(trimmed);

        let parts: Vec<&str> = body.split('.').collect();
        let [major, minor, patch] = parts.as_slice() else {
            return Err(VersionParseError::InvalidFormat {
                input: trimmed.to_string(),
            });
        };

        Ok(NodeVersion::new(
            parse_component(major, VersionComponent::Major)?,
            parse_component(minor, VersionComponent::Minor)?,
            parse_component(patch, VersionComponent::Patch)?,
        ))
    }
}

/// One published release, as described by a single catalog record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseDescriptor {
    pub version: NodeVersion,
    /// LTS channel codename; `None` means the release is not an LTS release.
    pub lts_codename: Option<String>,
    pub release_date: Option<NaiveDate>,
    #[serde(default)]
    pub npm_version: Option<String>,
}

impl ReleaseDescriptor {
    /// A descriptor that only knows its version, as produced by a directory scan.
    #[must_use]
    pub fn bare(version: NodeVersion) -> Self {
        Self {
            version,
            lts_codename: None,
            release_date: None,
            npm_version: None,
        }
    }

    #[must_use]
    pub fn is_lts(&self) -> bool {
        self.lts_codename.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CatalogOrigin {
    Remote,
    Local,
}

/// An ordered, duplicate-free set of releases.
///
/// Remote catalogs are ordered newest release date first; local catalogs are
/// ordered by version, highest first. The order is fixed at construction and
/// resolution relies on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    origin: CatalogOrigin,
    releases: Vec<ReleaseDescriptor>,
}

impl Catalog {
    #[must_use]
    pub fn remote(releases: Vec<ReleaseDescriptor>) -> Self {
        let mut releases = dedup_versions(releases);
        // `sort_by` is stable, so same-day releases keep their index order.
        releases.sort_by(|a, b| b.release_date.cmp(&a.release_date));
        Self {
            origin: CatalogOrigin::Remote,
            releases,
        }
    }

    #[must_use]
    pub fn local(releases: Vec<ReleaseDescriptor>) -> Self {
        let mut releases = dedup_versions(releases);
        releases.sort_by(|a, b| b.version.cmp(&a.version));
        Self {
            origin: CatalogOrigin::Local,
            releases,
        }
    }

    #[must_use]
    pub fn origin(&self) -> CatalogOrigin {
        self.origin
    }

    #[must_use]
    pub fn releases(&self) -> &[ReleaseDescriptor] {
        &self.releases
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ReleaseDescriptor> {
        self.releases.iter()
    }

    #[must_use]
    pub fn newest(&self) -> Option<&ReleaseDescriptor> {
        self.releases.first()
    }

    #[must_use]
    pub fn find(&self, version: &NodeVersion) -> Option<&ReleaseDescriptor> {
        self.releases.iter().find(|r| &r.version == version)
    }

    #[must_use]
    pub fn contains(&self, version: &NodeVersion) -> bool {
        self.find(version).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.releases.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }

    #[must_use]
    pub fn into_releases(self) -> Vec<ReleaseDescriptor> {
        self.releases
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a ReleaseDescriptor;
    type IntoIter = std::slice::Iter<'a, ReleaseDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.releases.iter()
    }
}

fn dedup_versions(releases: Vec<ReleaseDescriptor>) -> Vec<ReleaseDescriptor> {
    let mut seen = HashSet::with_capacity(releases.len());
    releases
        .into_iter()
        .filter(|release| seen.insert(release.version.clone()))
        .collect()
}

/// Whether a version is installed, answered by a live directory check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallState {
    NotInstalled,
    Installed(PathBuf),
}

impl InstallState {
    #[must_use]
    pub fn is_installed(&self) -> bool {
        matches!(self, Self::Installed(_))
    }
}

#[derive(Debug, Clone)]
pub struct InstallOutcome {
    pub release: ReleaseDescriptor,
    pub path: PathBuf,
    pub activated: bool,
}

#[derive(Debug, Clone)]
pub struct RemoveOutcome {
    pub version: NodeVersion,
    /// The removed version was the active one; nothing is active any more.
    pub was_active: bool,
}

#[derive(Debug, Clone)]
pub struct UseOutcome {
    pub release: ReleaseDescriptor,
    /// The release had to be installed before it could be activated.
    pub installed_now: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dated(version: &str, date: &str, lts: Option<&str>) -> ReleaseDescriptor {
        ReleaseDescriptor {
            version: version.parse().unwrap(),
            lts_codename: lts.map(str::to_string),
            release_date: Some(NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap()),
            npm_version: None,
        }
    }

    #[test]
    fn test_parse_version_with_v_prefix() {
        let v: NodeVersion = "v20.11.0".parse().unwrap();
        assert_eq!(v, NodeVersion::new(20, 11, 0));
    }

    #[test]
    fn test_parse_version_without_v_prefix() {
        let v: NodeVersion = "20.11.0".parse().unwrap();
        assert_eq!(v, NodeVersion::new(20, 11, 0));
    }

    #[test]
    fn test_parse_version_with_whitespace() {
        let v: NodeVersion = "  v20.11.0  ".parse().unwrap();
        assert_eq!(v.major, 20);
    }

    #[test]
    fn test_parse_version_rejects_partial_and_extra_components() {
        assert!("v20.11".parse::<NodeVersion>().is_err());
        assert!("v20.11.0.1".parse::<NodeVersion>().is_err());
    }

    #[test]
    fn test_parse_version_invalid_major() {
        let result: Result<NodeVersion, _> = "vXX.11.0".parse();
        assert!(matches!(
            result,
            Err(VersionParseError::InvalidComponent {
                component: VersionComponent::Major,
                ..
            })
        ));
    }

    #[test]
    fn test_version_display_is_canonical() {
        assert_eq!(NodeVersion::new(20, 11, 0).to_string(), "v20.11.0");
    }

    #[test]
    fn test_version_ordering_is_numeric() {
        let v9: NodeVersion = "v20.9.0".parse().unwrap();
        let v10: NodeVersion = "v20.10.0".parse().unwrap();
        assert!(v10 > v9);
        assert!(NodeVersion::new(20, 11, 1) > NodeVersion::new(20, 11, 0));
        assert!(NodeVersion::new(20, 0, 0) > NodeVersion::new(18, 99, 99));
    }

    #[test]
    fn remote_catalog_orders_newest_date_first() {
        let catalog = Catalog::remote(vec![
            dated("v18.20.0", "2024-03-26", Some("Hydrogen")),
            dated("v22.1.0", "2024-05-02", None),
            dated("v20.12.0", "2024-03-26", Some("Iron")),
        ]);

        let order: Vec<String> = catalog.iter().map(|r| r.version.to_string()).collect();
        assert_eq!(order, ["v22.1.0", "v18.20.0", "v20.12.0"]);
        assert_eq!(catalog.origin(), CatalogOrigin::Remote);
    }

    #[test]
    fn catalogs_drop_duplicate_versions() {
        let catalog = Catalog::remote(vec![
            dated("v20.1.0", "2024-01-01", None),
            dated("v20.1.0", "2024-02-01", Some("Iron")),
        ]);

        assert_eq!(catalog.len(), 1);
        assert!(!catalog.releases()[0].is_lts());
    }

    #[test]
    fn local_catalog_orders_highest_version_first() {
        let catalog = Catalog::local(vec![
            ReleaseDescriptor::bare(NodeVersion::new(18, 0, 0)),
            ReleaseDescriptor::bare(NodeVersion::new(20, 10, 0)),
            ReleaseDescriptor::bare(NodeVersion::new(20, 9, 0)),
        ]);

        assert_eq!(
            catalog.newest().map(|r| r.version.clone()),
            Some(NodeVersion::new(20, 10, 0))
        );
        assert_eq!(catalog.origin(), CatalogOrigin::Local);
        assert!(catalog.contains(&NodeVersion::new(18, 0, 0)));
    }
}
