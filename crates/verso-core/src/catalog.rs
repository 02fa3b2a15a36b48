use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use verso_backend::{Catalog, EngineError, NodeVersion, ReleaseDescriptor};

use crate::config::{Layout, is_hidden_entry};
use crate::distribution::Distribution;

const VERSION_FIELD: usize = 0;
const DATE_FIELD: usize = 1;
const NPM_FIELD: usize = 3;
const LTS_FIELD: usize = 9;
const MIN_FIELDS: usize = 10;

/// Fetches the release index and parses it into a remote catalog.
///
/// # Errors
/// Returns the transport error, or [`EngineError::MalformedCatalog`] when any
/// record fails to parse.
pub async fn fetch_remote<D>(distribution: &D) -> Result<Catalog, EngineError>
where
    D: Distribution + ?Sized,
{
    let index = distribution.fetch_index().await?;
    let catalog = parse_index(&index)?;
    debug!("Remote catalog has {} releases", catalog.len());
    Ok(catalog)
}

/// Parses the tab-separated index. The first line is a header. A single bad
/// record rejects the whole document.
///
/// # Errors
/// Returns [`EngineError::MalformedCatalog`] with the 1-based line number of
/// the first record that cannot be parsed.
pub fn parse_index(text: &str) -> Result<Catalog, EngineError> {
    let mut releases = Vec::new();

    for (index, line) in text.lines().enumerate().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let release = parse_record(line).map_err(|details| EngineError::MalformedCatalog {
            line: index + 1,
            details,
        })?;
        releases.push(release);
    }

    Ok(Catalog::remote(releases))
}

fn parse_record(line: &str) -> Result<ReleaseDescriptor, String> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < MIN_FIELDS {
        return Err(format!(
            "expected at least {MIN_FIELDS} fields, found {}",
            fields.len()
        ));
    }

    let version: NodeVersion = fields[VERSION_FIELD]
        .parse()
        .map_err(|error: verso_backend::VersionParseError| error.to_string())?;
    let date = NaiveDate::parse_from_str(fields[DATE_FIELD].trim(), "%Y-%m-%d")
        .map_err(|error| format!("invalid date {:?}: {error}", fields[DATE_FIELD]))?;

    Ok(ReleaseDescriptor {
        version,
        lts_codename: optional_field(fields[LTS_FIELD]),
        release_date: Some(date),
        npm_version: optional_field(fields[NPM_FIELD]),
    })
}

fn optional_field(raw: &str) -> Option<String> {
    let value = raw.trim();
    match value {
        "" | "-" | "\u{2013}" => None,
        _ => Some(value.to_string()),
    }
}

/// One entry per installed version directory.
///
/// A missing versions directory is an empty catalog. Hidden entries and
/// directories whose names are not versions are skipped.
///
/// # Errors
/// Returns an I/O error if the versions directory cannot be listed.
pub fn load_local(layout: &Layout) -> Result<Catalog, EngineError> {
    let versions_dir = layout.versions_dir();
    let entries = match std::fs::read_dir(&versions_dir) {
        Ok(entries) => entries,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Catalog::local(Vec::new()));
        }
        Err(error) => return Err(EngineError::io_at("failed to list", &versions_dir, &error)),
    };

    let mut releases = Vec::new();
    for entry in entries {
        let entry =
            entry.map_err(|error| EngineError::io_at("failed to list", &versions_dir, &error))?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if is_hidden_entry(&name) || !entry.path().is_dir() {
            continue;
        }
        match name.parse::<NodeVersion>() {
            Ok(version) => releases.push(ReleaseDescriptor::bare(version)),
            Err(error) => debug!("Skipping {name} in versions directory: {error}"),
        }
    }

    Ok(Catalog::local(releases))
}

#[derive(Debug, Serialize, Deserialize)]
struct CatalogSnapshot {
    fetched_at: DateTime<Utc>,
    releases: Vec<ReleaseDescriptor>,
}

/// Records a remote catalog for later offline enrichment. Failures are logged
/// and otherwise ignored.
pub fn write_snapshot(path: &Path, catalog: &Catalog) {
    let snapshot = CatalogSnapshot {
        fetched_at: Utc::now(),
        releases: catalog.releases().to_vec(),
    };

    let result = (|| -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string(&snapshot)?;
        std::fs::write(path, content)
    })();

    if let Err(error) = result {
        warn!("Could not write catalog snapshot {}: {error}", path.display());
    }
}

/// The last recorded remote catalog, if one exists and parses.
#[must_use]
pub fn read_snapshot(path: &Path) -> Option<Catalog> {
    let content = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str::<CatalogSnapshot>(&content) {
        Ok(snapshot) => {
            debug!("Catalog snapshot from {}", snapshot.fetched_at);
            Some(Catalog::remote(snapshot.releases))
        }
        Err(error) => {
            warn!("Ignoring unreadable catalog snapshot {}: {error}", path.display());
            None
        }
    }
}

/// Fills in channel, date and npm version for installed releases that the
/// snapshot knows about.
#[must_use]
pub fn enrich_local(local: Catalog, snapshot: &Catalog) -> Catalog {
    let releases = local
        .into_releases()
        .into_iter()
        .map(|release| {
            snapshot
                .find(&release.version)
                .cloned()
                .unwrap_or(release)
        })
        .collect();
    Catalog::local(releases)
}
