//! Installing a single package tarball.
//!
//! Provides:
//! - Classifying tarball references (URL, `file://`, plain path)
//! - Fetching remote tarballs into the scratch root
//! - Extracting with the system `tar`
//! - Reading and validating `package.json`
//! - Placing the unpacked tree into the versioned store
//! - Writing the entry shim and publishing symlinks
//! - Running a package's `make` command
//! - Cancellation and per-key locking for concurrent installs

pub mod build;
pub mod cancel;
pub mod descriptor;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod layout;
pub mod lock;
pub mod orchestrator;
pub mod place;
pub mod process;
pub mod publish;
pub mod reference;
pub mod registry;
pub mod shim;

#[cfg(test)]
mod test_support;

pub use build::run_make;
pub use cancel::{cancellation, CancelHandle, Cancellation};
pub use descriptor::{
    is_valid_version, normalize_name, read_descriptor, LibDir, PackageDescriptor,
    DEFAULT_LIB_DIR, DESCRIPTOR_FILE,
};
pub use error::{codes, InstallError, Stage};
pub use extract::{ArchiveExtractor, DEFAULT_TAR_PROGRAM};
pub use fetch::{fetch_target, Fetcher, HttpFetcher, MAX_TARBALL_SIZE};
pub use layout::{InstallLayout, PACKAGE_DIR, SHIM_FILE};
pub use lock::KeyLocks;
pub use orchestrator::{InstallOutcome, Installer};
pub use place::place_into_store;
pub use process::ProcessRunner;
pub use publish::{link_lib, link_main};
pub use reference::TarballRef;
pub use registry::InstallRegistry;
pub use shim::{render_shim, write_shim, SHIM_HEADER};
