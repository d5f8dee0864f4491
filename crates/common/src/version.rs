use std::fmt;

use serde::{Deserialize, Serialize};

/// Application tag every HexHoot instance announces on the local network.
pub const APPLICATION: &str = "hexhoot";

/// Build metadata captured by `build.rs` at compile time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildInfo {
    pub build_profile: String,
    pub build_features: String,
    pub build_timestamp: String,
    pub rust_version: String,
    pub repo_version: String,
    pub version: String,
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {} build, features: {}, built {} with {})",
            self.version,
            self.repo_version,
            self.build_profile,
            self.build_features,
            self.build_timestamp,
            self.rust_version
        )
    }
}

/// Build info for this crate.
pub fn build_info() -> BuildInfo {
    BuildInfo {
        build_profile: env!("BUILD_PROFILE").to_string(),
        build_features: env!("BUILD_FEATURES").to_string(),
        build_timestamp: env!("BUILD_TIMESTAMP").to_string(),
        rust_version: env!("RUST_VERSION").to_string(),
        repo_version: env!("REPO_VERSION").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

/// Shorthand for [`build_info`].
#[macro_export]
macro_rules! build_info {
    () => {
        $crate::version::build_info()
    };
}
