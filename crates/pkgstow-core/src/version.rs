use std::fmt::Write;

/// The current version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Schema version for the default data and cache directories.
/// Bump this when the store layout changes incompatibly.
pub const SCHEMA_VERSION: u32 = 1;

/// Returns a formatted version string including build metadata if available.
#[must_use]
pub fn version_string() -> String {
    let mut s = format!("pkgstow {VERSION}");

    if let Some(hash) = option_env!("PKGSTOW_BUILD_GIT_HASH") {
        let _ = write!(s, " ({hash})");
    }

    s
}
