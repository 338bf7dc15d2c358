//! Symlinks in the flat publish root.

use super::descriptor::PackageDescriptor;
use super::error::InstallError;
use super::layout::InstallLayout;
use pkgstow_util::fs::{ensure_dir, DEFAULT_DIR_MODE};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Link `<publish>/<name>-<version>.js` to the generated shim.
///
/// An entry already present at the link path is left alone: the shim path for a given
/// name and version never changes, so the version counts as published. Returns the
/// link path, or `None` when the package declares no `main`.
///
/// # Errors
/// Returns a directory error if the publish root cannot be ensured, or
/// `PKG_LINK_FAILED` if the link cannot be created.
pub fn link_main(
    layout: &InstallLayout,
    descriptor: &PackageDescriptor,
) -> Result<Option<PathBuf>, InstallError> {
    if descriptor.main.is_none() {
        return Ok(None);
    }

    let shim = layout.shim_path(&descriptor.name, &descriptor.version);
    let link = layout.published_shim_path(&descriptor.name, &descriptor.version);

    if fs::symlink_metadata(&link).is_ok() {
        debug!(link = %link.display(), "Main shim already published");
        return Ok(Some(link));
    }

    ensure_dir(layout.publish_root(), DEFAULT_DIR_MODE)?;
    create_file_link(&shim, &link)?;
    Ok(Some(link))
}

/// Link `<publish>/<name>-<version>` to the package's library directory.
///
/// A missing or non-directory default `lib` is a valid package shape and yields
/// `Ok(None)`. Any existing entry at the link path is replaced.
///
/// # Errors
/// - `PKG_LIB_DIR_NOT_FOUND` if an explicitly declared lib dir does not exist
/// - `PKG_LIB_DIR_NOT_A_DIRECTORY` if an explicitly declared lib dir is not a directory
/// - `PKG_LINK_FAILED` if the old entry cannot be removed or the link cannot be created
pub fn link_lib(
    layout: &InstallLayout,
    descriptor: &PackageDescriptor,
) -> Result<Option<PathBuf>, InstallError> {
    let lib = descriptor.lib_dir();
    let package_dir = descriptor
        .store_path
        .clone()
        .unwrap_or_else(|| layout.package_dir(&descriptor.name, &descriptor.version));
    let source = package_dir.join(lib.path);
    let link = layout.published_lib_path(&descriptor.name, &descriptor.version);

    match fs::metadata(&source) {
        Err(_) if lib.declared => return Err(InstallError::lib_dir_not_found(&source)),
        Err(_) => {
            debug!(path = %source.display(), "No lib directory, skipping lib link");
            return Ok(None);
        }
        Ok(meta) if !meta.is_dir() => {
            if lib.declared {
                return Err(InstallError::lib_dir_not_a_directory(lib.path));
            }
            debug!(path = %source.display(), "Default lib is not a directory, skipping");
            return Ok(None);
        }
        Ok(_) => {}
    }

    ensure_dir(layout.publish_root(), DEFAULT_DIR_MODE)?;
    if fs::symlink_metadata(&link).is_ok() {
        remove_link_or_dir(&link)?;
    }
    create_dir_link(&source, &link)?;

    Ok(Some(link))
}

/// Remove a symlink, junction, file, or directory.
fn remove_link_or_dir(path: &Path) -> Result<(), InstallError> {
    #[cfg(windows)]
    {
        use std::os::windows::fs::MetadataExt;

        if let Ok(metadata) = fs::symlink_metadata(path) {
            // FILE_ATTRIBUTE_REPARSE_POINT = 0x400
            if metadata.file_attributes() & 0x400 != 0 && metadata.is_dir() {
                fs::remove_dir(path).map_err(|e| {
                    InstallError::link_failed(format!(
                        "Failed to remove existing junction {}: {e}",
                        path.display()
                    ))
                })?;
                return Ok(());
            }
        }
    }

    let is_real_dir = fs::symlink_metadata(path)
        .map(|m| m.file_type().is_dir())
        .unwrap_or(false);

    let result = if is_real_dir {
        fs::remove_dir_all(path)
    } else {
        // Symlinks (dangling or not) and plain files
        fs::remove_file(path)
    };

    result.map_err(|e| {
        InstallError::link_failed(format!(
            "Failed to remove existing {}: {e}",
            path.display()
        ))
    })
}

/// Create a directory link (symlink on Unix, junction on Windows).
fn create_dir_link(src: &Path, dst: &Path) -> Result<(), InstallError> {
    #[cfg(unix)]
    let result = std::os::unix::fs::symlink(src, dst);

    #[cfg(windows)]
    let result = junction::create(src, dst);

    #[cfg(not(any(unix, windows)))]
    let result: std::io::Result<()> = Err(std::io::ErrorKind::Unsupported.into());

    result.map_err(|e| {
        InstallError::link_failed(format!(
            "Failed to link {} to {}: {e}",
            dst.display(),
            src.display()
        ))
    })
}

/// Create a file symlink.
fn create_file_link(src: &Path, dst: &Path) -> Result<(), InstallError> {
    #[cfg(unix)]
    let result = std::os::unix::fs::symlink(src, dst);

    #[cfg(windows)]
    let result = std::os::windows::fs::symlink_file(src, dst);

    #[cfg(not(any(unix, windows)))]
    let result: std::io::Result<()> = Err(std::io::ErrorKind::Unsupported.into());

    result.map_err(|e| {
        InstallError::link_failed(format!(
            "Failed to link {} to {}: {e}",
            dst.display(),
            src.display()
        ))
    })
}
