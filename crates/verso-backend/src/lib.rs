mod error;
mod traits;
mod types;

pub use error::{EngineError, ErrorKind, NetworkStage};
pub use traits::{InstallPrompt, ReleaseManager, UseRequest};
pub use types::{
    Catalog, CatalogOrigin, InstallOutcome, InstallState, NodeVersion, ReleaseDescriptor,
    RemoveOutcome, UseOutcome, VersionComponent, VersionParseError,
};
