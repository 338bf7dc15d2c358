//! Moving an unpacked package into its store location.

use super::descriptor::PackageDescriptor;
use super::error::InstallError;
use super::layout::InstallLayout;
use pkgstow_util::fs::{ensure_dir, move_dir, MoveStrategy, DEFAULT_DIR_MODE};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Move `unpacked` to `<store>/<name>/<version>/package`, replacing whatever was there.
///
/// Any existing version directory is removed first, so a fresh install always wins
/// and no stale shim survives. On success `descriptor.store_path` is set and returned.
///
/// # Errors
/// - `PKG_REMOVAL_FAILED` if the previous occupant cannot be deleted
/// - `PKG_DIRECTORY_CREATE_FAILED` / `PKG_NOT_A_DIRECTORY` if the version directory
///   cannot be ensured
/// - `PKG_MOVE_FAILED` if neither rename nor copy can move the tree
pub fn place_into_store(
    layout: &InstallLayout,
    unpacked: &Path,
    descriptor: &mut PackageDescriptor,
) -> Result<PathBuf, InstallError> {
    let version_dir = layout.version_dir(&descriptor.name, &descriptor.version);
    let target = layout.package_dir(&descriptor.name, &descriptor.version);

    match fs::symlink_metadata(&version_dir) {
        Ok(meta) if meta.is_dir() => {
            debug!(path = %version_dir.display(), "Exists, removing it");
            fs::remove_dir_all(&version_dir)
                .map_err(|e| InstallError::removal_failed(&version_dir, e))?;
        }
        Ok(_) => {
            debug!(path = %version_dir.display(), "Stale entry, removing it");
            fs::remove_file(&version_dir)
                .map_err(|e| InstallError::removal_failed(&version_dir, e))?;
        }
        Err(_) => debug!(path = %version_dir.display(), "Doesn't exist, creating it"),
    }

    ensure_dir(&version_dir, DEFAULT_DIR_MODE)?;

    let strategy = move_dir(unpacked, &target)
        .map_err(|e| InstallError::move_failed(unpacked, &target, e))?;
    match strategy {
        MoveStrategy::Rename => {}
        MoveStrategy::CopyThenDelete => {
            debug!(from = %unpacked.display(), "Rename crossed filesystems, copied instead");
        }
        MoveStrategy::CopyKeptSource => {
            warn!(
                from = %unpacked.display(),
                "Copied into the store but could not remove the source"
            );
        }
    }

    descriptor.store_path = Some(target.clone());
    Ok(target)
}
