use std::fmt;
use std::path::Path;

use thiserror::Error;

use crate::types::NodeVersion;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("{version} is already installed")]
    AlreadyInstalled { version: NodeVersion },

    #[error("{version} is not installed")]
    NotInstalled { version: NodeVersion },

    #[error("No version given and no {file_name} file found in {dir} or its parents")]
    NoPinnedVersion { dir: String, file_name: String },

    #[error("Version not found: {specifier}")]
    VersionNotFound { specifier: String },

    #[error("Network error during {operation} ({stage}): {details}")]
    NetworkError {
        operation: &'static str,
        stage: NetworkStage,
        details: String,
    },

    #[error("{operation} failed with HTTP {status} for {url}")]
    HttpStatus {
        operation: &'static str,
        url: String,
        status: u16,
    },

    #[error("Malformed release index at line {line}: {details}")]
    MalformedCatalog { line: usize, details: String },

    #[error("Checksum verification failed for {asset}: {details}")]
    ChecksumMismatch { asset: String, details: String },

    #[error("Another process is installing {version}")]
    Locked { version: NodeVersion },

    #[error("IO error ({kind}): {message}")]
    IoError {
        kind: std::io::ErrorKind,
        message: String,
    },

    #[error("Extraction failed: {details}")]
    ExtractionFailed { details: String },

    #[error("Unsupported platform: {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("Unsupported archive format: {extension}")]
    UnsupportedFormat { extension: String },

    #[error("Internal error: {details}")]
    Internal { details: String },

    #[error("{operation} {subject}: {source}")]
    Context {
        operation: &'static str,
        subject: String,
        #[source]
        source: Box<EngineError>,
    },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStage {
    #[error("request")]
    Request,
    #[error("response parse")]
    ResponseParse,
}

/// Coarse classification a caller can act on (for example to pick an exit code).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad or pointless request: nothing to do, or the user must change input.
    Usage,
    /// No release matched the specifier.
    NotFound,
    /// The release index or an artifact could not be retrieved or trusted.
    Unavailable,
    /// A filesystem operation failed.
    Io,
    /// Platform, architecture or archive format is not handled.
    Unsupported,
    /// An internal invariant was violated.
    Software,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Usage => "usage",
            Self::NotFound => "not found",
            Self::Unavailable => "unavailable",
            Self::Io => "io",
            Self::Unsupported => "unsupported",
            Self::Software => "software",
        };
        f.write_str(label)
    }
}

impl EngineError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AlreadyInstalled { .. }
            | Self::NotInstalled { .. }
            | Self::NoPinnedVersion { .. } => ErrorKind::Usage,
            Self::VersionNotFound { .. } => ErrorKind::NotFound,
            Self::NetworkError { .. }
            | Self::HttpStatus { .. }
            | Self::MalformedCatalog { .. }
            | Self::ChecksumMismatch { .. }
            | Self::Locked { .. } => ErrorKind::Unavailable,
            Self::IoError { .. } | Self::ExtractionFailed { .. } => ErrorKind::Io,
            Self::UnsupportedPlatform { .. } | Self::UnsupportedFormat { .. } => {
                ErrorKind::Unsupported
            }
            Self::Internal { .. } => ErrorKind::Software,
            Self::Context { source, .. } => source.kind(),
        }
    }

    /// Strips any [`EngineError::Context`] wrappers.
    #[must_use]
    pub fn root(&self) -> &EngineError {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }

    #[must_use]
    pub fn context(self, operation: &'static str, subject: impl Into<String>) -> Self {
        Self::Context {
            operation,
            subject: subject.into(),
            source: Box::new(self),
        }
    }

    pub fn network_request(operation: &'static str, details: impl Into<String>) -> Self {
        Self::NetworkError {
            operation,
            stage: NetworkStage::Request,
            details: details.into(),
        }
    }

    pub fn network_request_from<E>(operation: &'static str, error: E) -> Self
    where
        E: std::fmt::Display,
    {
        Self::network_request(operation, error.to_string())
    }

    pub fn network_parse(operation: &'static str, details: impl Into<String>) -> Self {
        Self::NetworkError {
            operation,
            stage: NetworkStage::ResponseParse,
            details: details.into(),
        }
    }

    pub fn network_parse_from<E>(operation: &'static str, error: E) -> Self
    where
        E: std::fmt::Display,
    {
        Self::network_parse(operation, error.to_string())
    }

    #[must_use]
    pub fn io(context: &str, error: &std::io::Error) -> Self {
        Self::IoError {
            kind: error.kind(),
            message: format!("{context}: {error}"),
        }
    }

    #[must_use]
    pub fn io_at(context: &str, path: &Path, error: &std::io::Error) -> Self {
        Self::IoError {
            kind: error.kind(),
            message: format!("{context} {}: {error}", path.display()),
        }
    }

    pub fn extraction(details: impl Into<String>) -> Self {
        Self::ExtractionFailed {
            details: details.into(),
        }
    }

    pub fn internal(details: impl Into<String>) -> Self {
        Self::Internal {
            details: details.into(),
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::IoError {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
