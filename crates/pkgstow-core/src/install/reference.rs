//! Tarball references: remote URLs, `file://` paths and bare paths.

use super::error::InstallError;
use std::path::{Path, PathBuf};
use url::Url;

const FILE_PREFIX: &str = "file://";

/// Where a tarball comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TarballRef {
    Remote(Url),
    Local(PathBuf),
}

impl TarballRef {
    /// Classify `reference`. Relative local paths resolve against `cwd`.
    ///
    /// # Errors
    /// Returns `PKG_REFERENCE_UNREACHABLE` for an `http(s)://` reference that is not a
    /// valid URL, or an empty reference.
    pub fn parse(reference: &str, cwd: &Path) -> Result<Self, InstallError> {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            return Url::parse(reference)
                .map(Self::Remote)
                .map_err(|e| InstallError::reference_unreachable(reference, e));
        }

        let path = reference.strip_prefix(FILE_PREFIX).unwrap_or(reference);
        if path.is_empty() {
            return Err(InstallError::reference_unreachable(reference, "empty path"));
        }

        Ok(Self::Local(cwd.join(path)))
    }
}
