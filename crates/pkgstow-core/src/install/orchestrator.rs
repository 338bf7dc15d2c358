//! The end-to-end install pipeline.
//!
//! ```text
//! remote? -> fetch into scratch root
//! stat -> scratch dir -> extract -> delete tarball -> read descriptor
//!      -> [key lock] place -> shim -> link main -> make -> link lib [unlock]
//! ```
//!
//! Stages run strictly in order and the first failure aborts the rest. Nothing is
//! rolled back after placement: re-running the install repairs a half-published
//! package because placement and linking replace what they find.

use super::build::run_make;
use super::cancel::Cancellation;
use super::descriptor::{read_descriptor, PackageDescriptor, DESCRIPTOR_FILE};
use super::error::{InstallError, Stage};
use super::extract::ArchiveExtractor;
use super::fetch::{fetch_target, rand_u32, Fetcher, HttpFetcher};
use super::layout::InstallLayout;
use super::lock::KeyLocks;
use super::place::place_into_store;
use super::process::ProcessRunner;
use super::publish::{link_lib, link_main};
use super::reference::TarballRef;
use super::registry::InstallRegistry;
use super::shim::write_shim;
use crate::config::Config;
use pkgstow_util::fs::{ensure_dir, DEFAULT_DIR_MODE};
use pkgstow_util::hash::integrity_of_file;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};
use url::Url;

/// Result of a successful install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallOutcome {
    pub key: String,
    pub name: String,
    pub version: String,
    pub store_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shim_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_shim: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_lib: Option<PathBuf>,
    pub built: bool,
    /// BLAKE3 integrity string of the installed tarball.
    pub integrity: String,
}

/// Where the tarball being installed came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// Supplied by the caller.
    Local,
    /// Downloaded by us into the scratch root.
    Fetched,
}

trait AtStage<T> {
    fn at(self, stage: Stage) -> Result<T, InstallError>;
}

impl<T, E: Into<InstallError>> AtStage<T> for Result<T, E> {
    fn at(self, stage: Stage) -> Result<T, InstallError> {
        self.map_err(|e| e.into().at(stage))
    }
}

/// Installs single package tarballs into the store and publish root.
#[derive(Debug)]
pub struct Installer<F = HttpFetcher> {
    layout: InstallLayout,
    fetcher: F,
    extractor: ArchiveExtractor,
    runner: ProcessRunner,
    cwd: PathBuf,
    keep_tarball: bool,
    registry: Mutex<InstallRegistry>,
    locks: KeyLocks,
}

impl Installer<HttpFetcher> {
    /// Build an installer from runtime configuration.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn from_config(config: &Config) -> Result<Self, InstallError> {
        let runner = ProcessRunner::new().with_stdout_to_stderr(config.json_logs);
        let fetcher = HttpFetcher::new()?.with_auth_token(config.auth_token.clone());
        Ok(Self::new(config.layout(), fetcher)
            .with_runner(runner)
            .with_extractor(ArchiveExtractor::new(config.tar_program.clone(), runner))
            .with_cwd(config.cwd.clone())
            .with_keep_tarball(config.keep_tarball))
    }
}

impl<F: Fetcher> Installer<F> {
    #[must_use]
    pub fn new(layout: InstallLayout, fetcher: F) -> Self {
        Self {
            layout,
            fetcher,
            extractor: ArchiveExtractor::default(),
            runner: ProcessRunner::new(),
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            keep_tarball: false,
            registry: Mutex::new(InstallRegistry::new()),
            locks: KeyLocks::new(),
        }
    }

    #[must_use]
    pub fn with_extractor(mut self, extractor: ArchiveExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    #[must_use]
    pub fn with_runner(mut self, runner: ProcessRunner) -> Self {
        self.runner = runner;
        self
    }

    /// Directory relative tarball paths resolve against.
    #[must_use]
    pub fn with_cwd(mut self, cwd: PathBuf) -> Self {
        self.cwd = cwd;
        self
    }

    /// Keep a caller-supplied tarball instead of deleting it once unpacked.
    #[must_use]
    pub fn with_keep_tarball(mut self, keep: bool) -> Self {
        self.keep_tarball = keep;
        self
    }

    /// Start from an existing registry, e.g. one returned by [`Self::into_registry`].
    #[must_use]
    pub fn with_registry(mut self, registry: InstallRegistry) -> Self {
        self.registry = Mutex::new(registry);
        self
    }

    #[must_use]
    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    /// Snapshot of every descriptor read so far.
    #[must_use]
    pub fn registry(&self) -> InstallRegistry {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn into_registry(self) -> InstallRegistry {
        self.registry
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Install the tarball named by `reference` (URL, `file://` path or plain path).
    ///
    /// # Errors
    /// Returns the first failing stage's error; see [`super::error::codes`].
    pub async fn install(
        &self,
        reference: &str,
        cancel: &Cancellation,
    ) -> Result<InstallOutcome, InstallError> {
        match TarballRef::parse(reference, &self.cwd).at(Stage::Stat)? {
            TarballRef::Remote(url) => {
                info!(url = %url, "Fetch and then install");
                let tarball = self.fetch(reference, &url, cancel).await?;
                debug!(tarball = %tarball.display(), "Fetched, installing from local copy");
                self.install_local(&tarball, Origin::Fetched, cancel).await
            }
            TarballRef::Local(path) => self.install_local(&path, Origin::Local, cancel).await,
        }
    }

    async fn fetch(
        &self,
        reference: &str,
        url: &Url,
        cancel: &Cancellation,
    ) -> Result<PathBuf, InstallError> {
        ensure_dir(self.layout.scratch_root(), DEFAULT_DIR_MODE).at(Stage::Fetch)?;
        let target = fetch_target(self.layout.scratch_root(), reference);

        let mut cancelled = cancel.clone();
        let result = tokio::select! {
            result = self.fetcher.fetch(url, &target) => result,
            () = cancelled.cancelled() => Err(InstallError::cancelled()),
        };

        if let Err(e) = result {
            remove_quietly(&target);
            return Err(e.at(Stage::Fetch));
        }
        Ok(target)
    }

    async fn install_local(
        &self,
        tarball: &Path,
        origin: Origin,
        cancel: &Cancellation,
    ) -> Result<InstallOutcome, InstallError> {
        info!(tarball = %tarball.display(), "Install from");

        let scratch = self.scratch_dir_for(tarball);
        let result = self.run_pipeline(tarball, &scratch, origin, cancel).await;

        if let Err(e) = &result {
            warn!(code = e.code(), stage = ?e.stage(), "Install aborted");
            remove_quietly(&scratch);
            if origin == Origin::Fetched {
                remove_quietly(tarball);
            }
        }
        result
    }

    async fn run_pipeline(
        &self,
        tarball: &Path,
        scratch: &Path,
        origin: Origin,
        cancel: &Cancellation,
    ) -> Result<InstallOutcome, InstallError> {
        // The tarball must be fully written before we get here: fetched files are
        // closed by the fetcher, local files are confirmed by this stat.
        let meta = fs::metadata(tarball)
            .map_err(|e| InstallError::reference_unreachable(&tarball.display().to_string(), e))
            .at(Stage::Stat)?;
        if !meta.is_file() {
            return Err(InstallError::reference_unreachable(
                &tarball.display().to_string(),
                "not a regular file",
            )
            .at(Stage::Stat));
        }
        let integrity = integrity_of_file(tarball)
            .map_err(|e| InstallError::reference_unreachable(&tarball.display().to_string(), e))
            .at(Stage::Stat)?;

        check_cancel(cancel, Stage::Scratch)?;
        ensure_dir(scratch, DEFAULT_DIR_MODE).at(Stage::Scratch)?;

        self.extractor
            .extract(tarball, scratch, cancel)
            .await
            .at(Stage::Extract)?;

        if origin == Origin::Fetched || !self.keep_tarball {
            debug!(tarball = %tarball.display(), "Unpacked, deleting");
            fs::remove_file(tarball)
                .map_err(|e| InstallError::removal_failed(tarball, e))
                .at(Stage::Cleanup)?;
        }

        check_cancel(cancel, Stage::Descriptor)?;
        let mut descriptor = read_descriptor(&scratch.join(DESCRIPTOR_FILE)).at(Stage::Descriptor)?;
        self.register(descriptor.clone());

        let key = descriptor.key();
        let _guard = self.locks.acquire(&key).await;

        check_cancel(cancel, Stage::Place)?;
        let store_path =
            place_into_store(&self.layout, scratch, &mut descriptor).at(Stage::Place)?;
        info!(key = %key, path = %store_path.display(), "Moved into place");
        self.register(descriptor.clone());

        let shim_path = write_shim(&self.layout, &descriptor).at(Stage::Shim)?;
        let published_shim = link_main(&self.layout, &descriptor).at(Stage::LinkMain)?;

        check_cancel(cancel, Stage::Build)?;
        let built = run_make(&self.runner, &descriptor, cancel)
            .await
            .at(Stage::Build)?;

        let published_lib = link_lib(&self.layout, &descriptor).at(Stage::LinkLib)?;

        info!(key = %key, "Successfully installed");

        Ok(InstallOutcome {
            key,
            name: descriptor.name,
            version: descriptor.version,
            store_path,
            shim_path,
            published_shim,
            published_lib,
            built,
            integrity,
        })
    }

    fn register(&self, descriptor: PackageDescriptor) {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .register(descriptor);
    }

    /// `<scratch>/<tarball basename without .tgz>-<random>`
    fn scratch_dir_for(&self, tarball: &Path) -> PathBuf {
        let base = tarball
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "package".to_string());
        let base = base.strip_suffix(".tgz").unwrap_or(&base);
        self.layout
            .scratch_root()
            .join(format!("{base}-{:08x}", rand_u32()))
    }
}

fn check_cancel(cancel: &Cancellation, stage: Stage) -> Result<(), InstallError> {
    if cancel.is_cancelled() {
        Err(InstallError::cancelled().at(stage))
    } else {
        Ok(())
    }
}

/// Best-effort removal of a scratch file or directory.
fn remove_quietly(path: &Path) {
    let result = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(_) => return,
    };
    if let Err(e) = result {
        warn!(path = %path.display(), error = %e, "Failed to clean up scratch");
    }
}
