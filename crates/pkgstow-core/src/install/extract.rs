//! Tarball extraction through an external `tar`.

use super::cancel::Cancellation;
use super::error::InstallError;
use super::process::ProcessRunner;
use std::ffi::OsString;
use std::path::Path;
use tracing::debug;

/// Default archive tool.
pub const DEFAULT_TAR_PROGRAM: &str = "tar";

/// Extracts gzip tarballs, dropping the archive's single top-level directory.
#[derive(Debug, Clone)]
pub struct ArchiveExtractor {
    program: String,
    runner: ProcessRunner,
}

impl Default for ArchiveExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_TAR_PROGRAM, ProcessRunner::new())
    }
}

impl ArchiveExtractor {
    #[must_use]
    pub fn new(program: impl Into<String>, runner: ProcessRunner) -> Self {
        Self {
            program: program.into(),
            runner,
        }
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments passed to the tar tool for one extraction.
    #[must_use]
    pub fn args(tarball: &Path, target: &Path) -> Vec<OsString> {
        vec![
            OsString::from("-xzf"),
            tarball.as_os_str().to_owned(),
            OsString::from("--strip-components=1"),
            OsString::from("-C"),
            target.as_os_str().to_owned(),
        ]
    }

    /// Extract `tarball` into the existing directory `target`, so that `pkg/a.js`
    /// inside the archive ends up at `target/a.js`.
    ///
    /// The caller must only hand over a tarball that is completely written and closed.
    ///
    /// # Errors
    /// Returns `PKG_EXTRACTION_FAILED` if the tool exits non-zero or cannot be run,
    /// or `PKG_CANCELLED` when cancelled.
    pub async fn extract(
        &self,
        tarball: &Path,
        target: &Path,
        cancel: &Cancellation,
    ) -> Result<(), InstallError> {
        debug!(
            tarball = %tarball.display(),
            target = %target.display(),
            "Extracting tarball"
        );

        self.runner
            .run(&self.program, Self::args(tarball, target), None, cancel)
            .await
            .map_err(|e| {
                if e.is_cancelled() {
                    e
                } else {
                    InstallError::extraction_failed(format!(
                        "Failed to extract {}: {}",
                        tarball.display(),
                        e.message()
                    ))
                }
            })
    }
}
