use std::fmt;
use std::path::Path;

use log::debug;

/// Host operating system and architecture in the distribution's naming
/// convention (`linux`/`darwin`/`win`, `x64`/`arm64`/...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostPlatform {
    os: String,
    arch: String,
}

impl HostPlatform {
    #[must_use]
    pub fn detect() -> Self {
        let arch = if cfg!(all(target_arch = "powerpc64", target_endian = "little")) {
            "powerpc64le"
        } else {
            std::env::consts::ARCH
        };
        Self::from_raw(std::env::consts::OS, arch)
    }

    /// Normalize toolchain-style names (`macos`, `x86_64`, `amd64`, ...).
    #[must_use]
    pub fn from_raw(os: &str, arch: &str) -> Self {
        let os = normalize_os(os);
        let arch = normalize_arch(&os, arch);
        Self { os, arch }
    }

    #[must_use]
    pub fn os(&self) -> &str {
        &self.os
    }

    #[must_use]
    pub fn arch(&self) -> &str {
        &self.arch
    }
}

impl fmt::Display for HostPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

fn normalize_os(os: &str) -> String {
    let lower = os.to_ascii_lowercase();
    match lower.as_str() {
        "macos" | "darwin" => "darwin".to_string(),
        "windows" | "win32" => "win".to_string(),
        "solaris" | "illumos" => "sunos".to_string(),
        _ => lower,
    }
}

fn normalize_arch(os: &str, arch: &str) -> String {
    let lower = arch.to_ascii_lowercase();
    match lower.as_str() {
        "x86_64" | "amd64" => "x64".to_string(),
        "x86" | "386" | "i386" | "i686" => "x86".to_string(),
        "aarch64" => "arm64".to_string(),
        "arm" | "armv7" => "armv7l".to_string(),
        "powerpc64le" => "ppc64le".to_string(),
        // Only AIX ships big-endian ppc64 builds.
        "powerpc64" | "ppc64" if os == "aix" => "ppc64".to_string(),
        "powerpc64" => "ppc64".to_string(),
        _ => lower,
    }
}

/// Whether `.tar.xz` artifacts can be unpacked on this host.
///
/// Absence of a decompressor is not an error; callers fall back to gzip.
#[must_use]
pub fn has_xz_support(os: &str) -> bool {
    if os == "win" {
        return false;
    }

    if os == "freebsd" && Path::new("/usr/lib/liblzma.so").exists() {
        return true;
    }

    let found = which::which("xz").is_ok();
    debug!("xz decompressor available: {found}");
    found
}
