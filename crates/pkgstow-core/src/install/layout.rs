//! Store and publish path conventions.
//!
//! Every path here is a pure function of one of the configured roots plus a
//! package name and version:
//!
//! ```text
//! <store>/<name>/<version>/package     unpacked package contents
//! <store>/<name>/<version>/main.js     generated shim
//! <publish>/<name>-<version>.js        link to the shim
//! <publish>/<name>-<version>           link to the library directory
//! ```

use super::error::InstallError;
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the generated shim inside a version directory.
pub const SHIM_FILE: &str = "main.js";

/// Directory holding the unpacked package inside a version directory.
pub const PACKAGE_DIR: &str = "package";

/// Path conventions derived from the three configured roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    store_root: PathBuf,
    publish_root: PathBuf,
    scratch_root: PathBuf,
}

impl InstallLayout {
    #[must_use]
    pub fn new(store_root: PathBuf, publish_root: PathBuf, scratch_root: PathBuf) -> Self {
        Self {
            store_root,
            publish_root,
            scratch_root,
        }
    }

    #[must_use]
    pub fn store_root(&self) -> &Path {
        &self.store_root
    }

    #[must_use]
    pub fn publish_root(&self) -> &Path {
        &self.publish_root
    }

    #[must_use]
    pub fn scratch_root(&self) -> &Path {
        &self.scratch_root
    }

    /// `<store>/<name>/<version>`
    #[must_use]
    pub fn version_dir(&self, name: &str, version: &str) -> PathBuf {
        self.store_root.join(name).join(version)
    }

    /// `<store>/<name>/<version>/package`
    #[must_use]
    pub fn package_dir(&self, name: &str, version: &str) -> PathBuf {
        self.version_dir(name, version).join(PACKAGE_DIR)
    }

    /// `<store>/<name>/<version>/main.js`
    #[must_use]
    pub fn shim_path(&self, name: &str, version: &str) -> PathBuf {
        self.version_dir(name, version).join(SHIM_FILE)
    }

    /// `<publish>/<name>-<version>.js`
    #[must_use]
    pub fn published_shim_path(&self, name: &str, version: &str) -> PathBuf {
        self.publish_root.join(format!("{name}-{version}.js"))
    }

    /// `<publish>/<name>-<version>`
    #[must_use]
    pub fn published_lib_path(&self, name: &str, version: &str) -> PathBuf {
        self.publish_root.join(format!("{name}-{version}"))
    }

    /// List every installed `(name, version)` pair, sorted.
    ///
    /// A version counts as installed when its `package/` directory exists.
    ///
    /// # Errors
    /// Returns an error if the store root exists but cannot be read.
    pub fn list_installed(&self) -> Result<Vec<(String, String)>, InstallError> {
        let mut result = Vec::new();

        if !self.store_root.is_dir() {
            return Ok(result);
        }

        let entries = fs::read_dir(&self.store_root)
            .map_err(|e| InstallError::store_unreadable(&self.store_root, e))?;

        for entry in entries.flatten() {
            let name_path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || !name_path.is_dir() {
                continue;
            }

            let Ok(versions) = fs::read_dir(&name_path) else {
                continue;
            };
            for version_entry in versions.flatten() {
                let version = version_entry.file_name().to_string_lossy().into_owned();
                if version.starts_with('.') {
                    continue;
                }
                if version_entry.path().join(PACKAGE_DIR).is_dir() {
                    result.push((name.clone(), version));
                }
            }
        }

        result.sort();
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn layout() -> InstallLayout {
        InstallLayout::new(
            PathBuf::from("/srv/root/.pkgstow"),
            PathBuf::from("/srv/root"),
            PathBuf::from("/tmp/pkgstow"),
        )
    }

    #[test]
    fn test_store_paths() {
        let layout = layout();
        assert_eq!(
            layout.package_dir("demo", "1.0.0"),
            PathBuf::from("/srv/root/.pkgstow/demo/1.0.0/package")
        );
        assert_eq!(
            layout.shim_path("demo", "1.0.0"),
            PathBuf::from("/srv/root/.pkgstow/demo/1.0.0/main.js")
        );
    }

    #[test]
    fn test_published_paths() {
        let layout = layout();
        assert_eq!(
            layout.published_shim_path("demo", "1.0.0"),
            PathBuf::from("/srv/root/demo-1.0.0.js")
        );
        assert_eq!(
            layout.published_lib_path("demo", "1.0.0-beta.1"),
            PathBuf::from("/srv/root/demo-1.0.0-beta.1")
        );
    }

    #[test]
    fn test_paths_are_deterministic() {
        assert_eq!(layout(), layout());
        assert_eq!(
            layout().package_dir("a", "1.2.3"),
            layout().package_dir("a", "1.2.3")
        );
    }

    #[test]
    fn test_list_missing_store_is_empty() {
        let dir = tempdir().unwrap();
        let layout = InstallLayout::new(
            dir.path().join("nope"),
            dir.path().to_path_buf(),
            dir.path().to_path_buf(),
        );
        assert!(layout.list_installed().unwrap().is_empty());
    }

    #[test]
    fn test_list_installed() {
        let dir = tempdir().unwrap();
        let layout = InstallLayout::new(
            dir.path().to_path_buf(),
            dir.path().join("pub"),
            dir.path().join("tmp"),
        );

        fs::create_dir_all(layout.package_dir("zeta", "2.0.0")).unwrap();
        fs::create_dir_all(layout.package_dir("alpha", "1.0.0")).unwrap();
        // Version dir without a package/ is not installed
        fs::create_dir_all(layout.version_dir("broken", "0.1.0")).unwrap();

        let installed = layout.list_installed().unwrap();
        assert_eq!(
            installed,
            vec![
                ("alpha".to_string(), "1.0.0".to_string()),
                ("zeta".to_string(), "2.0.0".to_string()),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_list_unreadable_store() {
        use super::super::error::codes;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let store = dir.path().join("store");
        fs::create_dir_all(store.join("demo/1.0.0/package")).unwrap();
        let layout = InstallLayout::new(
            store.clone(),
            dir.path().to_path_buf(),
            dir.path().join("tmp"),
        );

        fs::set_permissions(&store, fs::Permissions::from_mode(0o000)).unwrap();
        let result = layout.list_installed();
        fs::set_permissions(&store, fs::Permissions::from_mode(0o755)).unwrap();

        // Root can still read it
        if let Err(err) = result {
            assert_eq!(err.code(), codes::PKG_STORE_UNREADABLE);
            assert!(err.message().contains("store"));
        }
    }
}
