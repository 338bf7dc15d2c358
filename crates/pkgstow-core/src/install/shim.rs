//! Generated forwarding module for a package's `main` entry.

use super::descriptor::PackageDescriptor;
use super::error::InstallError;
use super::layout::InstallLayout;
use pkgstow_util::fs::atomic_write;
use std::path::{Path, PathBuf};

/// First line of every generated shim.
pub const SHIM_HEADER: &str = "// generated by pkgstow, please don't touch!";

/// Render the shim source forwarding to `entry`.
#[must_use]
pub fn render_shim(entry: &Path) -> String {
    // JSON string escaping is valid JS string literal escaping
    let literal = serde_json::Value::String(entry.to_string_lossy().into_owned()).to_string();
    format!("{SHIM_HEADER}\nmodule.exports=require({literal});\n")
}

/// Write `<store>/<name>/<version>/main.js` forwarding to `<store_path>/<main>`.
///
/// Does nothing and returns `Ok(None)` when the package declares no `main`. An
/// existing shim is always overwritten.
///
/// # Errors
/// Returns `PKG_SHIM_WRITE_FAILED` if the file cannot be written.
pub fn write_shim(
    layout: &InstallLayout,
    descriptor: &PackageDescriptor,
) -> Result<Option<PathBuf>, InstallError> {
    let Some(main) = descriptor.main.as_deref() else {
        return Ok(None);
    };

    let package_dir = descriptor
        .store_path
        .clone()
        .unwrap_or_else(|| layout.package_dir(&descriptor.name, &descriptor.version));
    let shim = layout.shim_path(&descriptor.name, &descriptor.version);

    atomic_write(&shim, render_shim(&package_dir.join(main)).as_bytes())
        .map_err(|e| InstallError::shim_write_failed(&shim, e))?;

    Ok(Some(shim))
}
