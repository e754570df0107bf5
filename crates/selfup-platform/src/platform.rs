use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Operating system and architecture pair used to pick a release artifact,
/// rendered as `{os}-{arch}` (for example `linux-amd64`).
///
/// Names follow the release layout convention rather than Rust's target
/// names, so `macos` becomes `darwin` and `x86_64` becomes `amd64`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Platform {
    os: String,
    arch: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid platform identifier '{0}', expected <os>-<arch>")]
pub struct ParsePlatformError(String);

impl Platform {
    #[must_use]
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// The platform this binary was compiled for.
    #[must_use]
    pub fn current() -> Self {
        Self::new(
            release_os_name(std::env::consts::OS),
            release_arch_name(std::env::consts::ARCH),
        )
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

fn release_os_name(os: &str) -> &str {
    match os {
        "macos" => "darwin",
        other => other,
    }
}

fn release_arch_name(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        "powerpc64" => "ppc64",
        "s390x" => "s390x",
        other => other,
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

impl FromStr for Platform {
    type Err = ParsePlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (os, arch) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| ParsePlatformError(s.to_string()))?;
        let is_segment = |part: &str| !part.is_empty() && !part.contains(['/', '\\', '.']);
        if !is_segment(os) || !is_segment(arch) {
            return Err(ParsePlatformError(s.to_string()));
        }
        Ok(Self::new(os, arch))
    }
}

impl TryFrom<String> for Platform {
    type Error = ParsePlatformError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Platform> for String {
    fn from(value: Platform) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{Platform, release_arch_name, release_os_name};

    #[test]
    fn display_joins_os_and_arch() {
        assert_eq!(Platform::new("linux", "amd64").to_string(), "linux-amd64");
    }

    #[test]
    fn rust_target_names_map_to_release_names() {
        assert_eq!(release_os_name("macos"), "darwin");
        assert_eq!(release_os_name("linux"), "linux");
        assert_eq!(release_arch_name("x86_64"), "amd64");
        assert_eq!(release_arch_name("aarch64"), "arm64");
        assert_eq!(release_arch_name("x86"), "386");
        assert_eq!(release_arch_name("riscv64"), "riscv64");
    }

    #[test]
    fn parse_accepts_os_arch_pairs() {
        let platform: Platform = "windows-386".parse().expect("identifier should parse");

        assert_eq!(platform.os(), "windows");
        assert_eq!(platform.arch(), "386");
    }

    #[test]
    fn parse_rejects_malformed_identifiers() {
        assert!("linux".parse::<Platform>().is_err());
        assert!("-amd64".parse::<Platform>().is_err());
        assert!("linux-".parse::<Platform>().is_err());
        assert!("linux-../amd64".parse::<Platform>().is_err());
        assert!("../x-amd64".parse::<Platform>().is_err());
        assert!("win\\dows-amd64".parse::<Platform>().is_err());
    }

    #[test]
    fn serde_uses_identifier_string() {
        let platform = Platform::new("darwin", "arm64");

        let json = serde_json::to_string(&platform).expect("platform should serialize");
        assert_eq!(json, "\"darwin-arm64\"");

        let parsed: Platform = serde_json::from_str(&json).expect("platform should deserialize");
        assert_eq!(parsed, platform);
    }

    #[test]
    fn current_platform_is_well_formed() {
        let current = Platform::current();

        assert!(!current.os().is_empty());
        assert!(!current.arch().is_empty());
        assert_ne!(current.os(), "macos");
        assert_ne!(current.arch(), "x86_64");
    }
}
