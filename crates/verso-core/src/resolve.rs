use std::path::{Path, PathBuf};

use log::debug;
use verso_backend::{Catalog, EngineError, NodeVersion, ReleaseDescriptor};

/// A parsed version specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Specifier {
    /// Empty, `latest`, `current` or `stable`.
    Latest,
    /// `lts` or `lts/*`.
    Lts,
    /// A channel codename such as `iron` or `lts/iron`.
    LtsChannel(String),
    Version(PartialVersion),
}

impl Specifier {
    /// Never fails: anything that is not a keyword or a version is taken as a
    /// channel name, which simply matches nothing if no such channel exists.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let keyword = trimmed.to_ascii_lowercase();

        match keyword.as_str() {
            "" | "latest" | "current" | "stable" => return Self::Latest,
            "lts" | "lts/*" => return Self::Lts,
            _ => {}
        }

        if let Some(channel) = keyword.strip_prefix("lts/") {
            return Self::LtsChannel(channel.to_string());
        }

        match PartialVersion::parse(trimmed) {
            Some(version) => Self::Version(version),
            None => Self::LtsChannel(trimmed.to_string()),
        }
    }

    /// The one version this specifier can name, when it is fully qualified.
    #[must_use]
    pub fn exact_version(&self) -> Option<NodeVersion> {
        match self {
            Self::Version(partial) => partial.exact(),
            _ => None,
        }
    }
}

/// `major[.minor[.patch]]` with an optional leading `v`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialVersion {
    pub major: u32,
    pub minor: Option<u32>,
    pub patch: Option<u32>,
}

impl PartialVersion {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let body = raw
            .strip_prefix('v')
            .or_else(|| raw.strip_prefix('V'))
            .unwrap_or(raw);

        let mut parts = body.split('.');
        let major = parse_number(parts.next()?)?;
        let minor = match parts.next() {
            Some(part) => Some(parse_number(part)?),
            None => None,
        };
        let patch = match parts.next() {
            Some(part) => Some(parse_number(part)?),
            None => None,
        };
        if parts.next().is_some() {
            return None;
        }

        Some(Self {
            major,
            minor,
            patch,
        })
    }

    #[must_use]
    pub fn matches(&self, version: &NodeVersion) -> bool {
        self.major == version.major
            && self.minor.is_none_or(|minor| minor == version.minor)
            && self.patch.is_none_or(|patch| patch == version.patch)
    }

    #[must_use]
    pub fn exact(&self) -> Option<NodeVersion> {
        Some(NodeVersion::new(self.major, self.minor?, self.patch?))
    }
}

fn parse_number(part: &str) -> Option<u32> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

/// Picks the first release, in catalog order, that the specifier selects.
///
/// # Errors
/// Returns [`EngineError::VersionNotFound`] when nothing matches.
pub fn resolve(specifier: &str, catalog: &Catalog) -> Result<ReleaseDescriptor, EngineError> {
    let parsed = Specifier::parse(specifier);
    let found = match &parsed {
        Specifier::Latest => catalog.newest(),
        Specifier::Lts => catalog.iter().find(|release| release.is_lts()),
        Specifier::LtsChannel(channel) if channel.is_empty() => None,
        Specifier::LtsChannel(channel) => catalog.iter().find(|release| {
            release
                .lts_codename
                .as_deref()
                .is_some_and(|codename| codename.eq_ignore_ascii_case(channel))
        }),
        Specifier::Version(partial) => catalog.iter().find(|release| partial.matches(&release.version)),
    };

    match found {
        Some(release) => {
            debug!("Resolved {specifier:?} to {}", release.version);
            Ok(release.clone())
        }
        None => Err(EngineError::VersionNotFound {
            specifier: specifier.to_string(),
        }),
    }
}

/// Looks for `file_name` in `start` and then each of its ancestors.
#[must_use]
pub fn find_pin_file(start: &Path, file_name: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(file_name))
        .find(|candidate| candidate.is_file())
}

/// The specifier recorded in the nearest pin file: its first non-empty line.
///
/// # Errors
/// Returns [`EngineError::NoPinnedVersion`] when no pin file exists or it is
/// empty, or an I/O error if it cannot be read.
pub fn read_pinned_specifier(start: &Path, file_name: &str) -> Result<String, EngineError> {
    let missing = || EngineError::NoPinnedVersion {
        dir: start.display().to_string(),
        file_name: file_name.to_string(),
    };

    let path = find_pin_file(start, file_name).ok_or_else(missing)?;
    let content = std::fs::read_to_string(&path)
        .map_err(|error| EngineError::io_at("failed to read", &path, &error))?;
    let specifier = content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or_else(missing)?;

    debug!("Pinned version {specifier:?} from {}", path.display());
    Ok(specifier.to_string())
}
