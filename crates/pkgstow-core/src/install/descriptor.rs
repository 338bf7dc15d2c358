//! Package descriptor (`package.json`) reading and validation.

use super::error::InstallError;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Metadata file name at the root of an unpacked package.
pub const DESCRIPTOR_FILE: &str = "package.json";

/// Library directory used when a package declares none.
pub const DEFAULT_LIB_DIR: &str = "lib";

/// Three numeric components, optionally followed by `-` and a pre-release tag.
///
/// Also admits tags like `0.1.2-L24561-2010-02-25-13-41-32-903` used by link/test packages.
const VERSION_PATTERN: &str = r"^[0-9]+\.[0-9]+\.[0-9]+(-[a-zA-Z0-9.-]+)?$";

/// Any run of characters other than ASCII letters, digits and `-`.
const NAME_SEPARATOR_PATTERN: &str = r"[^a-zA-Z0-9-]+";

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(VERSION_PATTERN).expect("VERSION_PATTERN is a valid regex"))
}

fn name_separator_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(NAME_SEPARATOR_PATTERN).expect("NAME_SEPARATOR_PATTERN is a valid regex")
    })
}

/// Validated package metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDescriptor {
    /// Normalized name (only ASCII letters, digits and `-`).
    pub name: String,
    pub version: String,
    /// Entry module, relative to the package root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,
    /// Build command run inside the placed package.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    /// Declared library directory (`directories.lib`, else legacy `lib`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lib: Option<String>,
    /// Set once the package has been placed into the store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,
}

/// Library directory to publish and whether the package declared it explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LibDir<'a> {
    pub path: &'a str,
    pub declared: bool,
}

#[derive(Debug, Deserialize)]
struct RawDescriptor {
    name: Option<String>,
    version: Option<String>,
    main: Option<String>,
    make: Option<String>,
    #[serde(default)]
    directories: RawDirectories,
    lib: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawDirectories {
    lib: Option<String>,
}

impl PackageDescriptor {
    /// Registry key: `<name>-<version>`.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }

    /// The library directory, defaulting to `lib` when none was declared.
    #[must_use]
    pub fn lib_dir(&self) -> LibDir<'_> {
        match self.lib.as_deref() {
            Some(path) => LibDir {
                path,
                declared: true,
            },
            None => LibDir {
                path: DEFAULT_LIB_DIR,
                declared: false,
            },
        }
    }

    /// Parse and validate descriptor JSON. `origin` is only used in error messages.
    ///
    /// # Errors
    /// Returns `PKG_METADATA_MALFORMED` if the JSON does not parse or lacks a name,
    /// and `PKG_INVALID_VERSION` if the version is missing or does not match the
    /// accepted pattern.
    pub fn parse(raw: &str, origin: &Path) -> Result<Self, InstallError> {
        let parsed: RawDescriptor = serde_json::from_str(raw)
            .map_err(|e| InstallError::metadata_malformed(origin, e, raw))?;

        let name = parsed
            .name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                InstallError::metadata_malformed(
                    origin,
                    "Name or version not found in package info.",
                    raw,
                )
            })?;

        let version = parsed.version.unwrap_or_default();
        if !is_valid_version(&version) {
            return Err(InstallError::invalid_version(&version));
        }

        let lib = non_empty(parsed.directories.lib).or_else(|| non_empty(parsed.lib));

        Ok(Self {
            name: normalize_name(&name),
            version,
            main: non_empty(parsed.main),
            make: non_empty(parsed.make),
            lib,
            store_path: None,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Replace every run of characters outside `[A-Za-z0-9-]` with a single `-`.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name_separator_regex().replace_all(name, "-").into_owned()
}

/// Whether `version` matches the accepted `X.Y.Z[-tag]` pattern.
#[must_use]
pub fn is_valid_version(version: &str) -> bool {
    version_regex().is_match(version)
}

/// Read and validate the descriptor at `path`.
///
/// # Errors
/// Returns `PKG_METADATA_UNREADABLE` if the file cannot be read, otherwise see
/// [`PackageDescriptor::parse`].
pub fn read_descriptor(path: &Path) -> Result<PackageDescriptor, InstallError> {
    let raw = fs::read_to_string(path).map_err(|e| InstallError::metadata_unreadable(path, e))?;
    PackageDescriptor::parse(&raw, path)
}
