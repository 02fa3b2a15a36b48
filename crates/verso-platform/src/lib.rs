mod host;
mod link;
mod paths;

pub use host::{HostPlatform, has_xz_support};
pub use link::{read_link_target, remove_link, replace_symlink};
pub use paths::{AppPaths, AppPathsError};
