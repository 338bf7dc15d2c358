use crate::config::Channel;
use crate::version::SCHEMA_VERSION;
use std::path::PathBuf;

/// Name of the store directory inside the publish root.
pub const STORE_DIR: &str = ".pkgstow";

/// Get the cache directory for pkgstow.
///
/// - Linux: `$XDG_CACHE_HOME/pkgstow/v{N}/{channel}` or `~/.cache/pkgstow/v{N}/{channel}`
/// - macOS: `~/Library/Caches/pkgstow/v{N}/{channel}`
/// - Windows: `%LOCALAPPDATA%\pkgstow\v{N}\{channel}`
#[must_use]
pub fn cache_dir(channel: Channel) -> PathBuf {
    let base = dirs_next::cache_dir().map_or_else(
        || {
            dirs_next::home_dir().map_or_else(
                || PathBuf::from(".pkgstow-cache"),
                |p| p.join(".cache").join("pkgstow"),
            )
        },
        |p| p.join("pkgstow"),
    );

    base.join(format!("v{SCHEMA_VERSION}"))
        .join(channel.as_str())
}

/// Get the data directory for pkgstow (installed packages live under here).
///
/// - Linux: `$XDG_DATA_HOME/pkgstow/v{N}/{channel}` or `~/.local/share/pkgstow/v{N}/{channel}`
/// - macOS: `~/Library/Application Support/pkgstow/v{N}/{channel}`
/// - Windows: `%APPDATA%\pkgstow\v{N}\{channel}`
#[must_use]
pub fn data_dir(channel: Channel) -> PathBuf {
    let base = dirs_next::data_dir().map_or_else(
        || {
            dirs_next::home_dir().map_or_else(
                || PathBuf::from(".pkgstow-data"),
                |p| p.join(".local").join("share").join("pkgstow"),
            )
        },
        |p| p.join("pkgstow"),
    );

    base.join(format!("v{SCHEMA_VERSION}"))
        .join(channel.as_str())
}

/// Default publish root: `<data_dir>/root`.
#[must_use]
pub fn default_publish_root(channel: Channel) -> PathBuf {
    data_dir(channel).join("root")
}

/// Default scratch root: `<cache_dir>/tmp`.
#[must_use]
pub fn default_scratch_root(channel: Channel) -> PathBuf {
    cache_dir(channel).join("tmp")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_contain_version_and_channel() {
        let cache = cache_dir(Channel::Stable);
        let data = data_dir(Channel::Dev);
        assert!(cache.to_string_lossy().contains(&format!("v{SCHEMA_VERSION}")));
        assert!(cache.ends_with("stable"));
        assert!(data.ends_with("dev"));
    }

    #[test]
    fn test_different_channels_different_roots() {
        assert_ne!(
            default_publish_root(Channel::Stable),
            default_publish_root(Channel::Nightly)
        );
        assert_ne!(
            default_scratch_root(Channel::Stable),
            default_scratch_root(Channel::Dev)
        );
    }

    #[test]
    fn test_default_roots_shape() {
        assert!(default_publish_root(Channel::Stable).ends_with("stable/root"));
        assert!(default_scratch_root(Channel::Stable).ends_with("stable/tmp"));
    }
}
