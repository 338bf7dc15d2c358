//! Running a package's declared `make` command.

use super::cancel::Cancellation;
use super::descriptor::PackageDescriptor;
use super::error::InstallError;
use super::process::ProcessRunner;
use tracing::info;

/// Run `descriptor.make` inside the placed package directory.
///
/// The working directory is passed to the child only; the installer's own
/// working directory never changes. Returns whether a build ran.
///
/// # Errors
/// Returns `PKG_EXTERNAL_COMMAND_FAILED` if the command exits non-zero, or
/// `PKG_CANCELLED` when cancelled.
pub async fn run_make(
    runner: &ProcessRunner,
    descriptor: &PackageDescriptor,
    cancel: &Cancellation,
) -> Result<bool, InstallError> {
    let Some(make) = descriptor.make.as_deref() else {
        return Ok(false);
    };
    let Some(cwd) = descriptor.store_path.as_deref() else {
        return Err(InstallError::command_spawn_failed(
            make,
            "package has not been placed into the store",
        ));
    };

    info!(command = %make, cwd = %cwd.display(), "Running make");
    runner.run_shell(make, Some(cwd), cancel).await?;
    Ok(true)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::install::error::codes;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn descriptor(raw: &str, store_path: &Path) -> PackageDescriptor {
        let mut desc = PackageDescriptor::parse(raw, Path::new("package.json")).unwrap();
        desc.store_path = Some(store_path.to_path_buf());
        desc
    }

    #[tokio::test]
    async fn test_no_make_is_noop() {
        let dir = tempdir().unwrap();
        let desc = descriptor(r#"{"name":"d","version":"1.0.0"}"#, dir.path());

        let ran = run_make(&ProcessRunner::new(), &desc, &Cancellation::never())
            .await
            .unwrap();
        assert!(!ran);
    }

    #[tokio::test]
    async fn test_make_runs_in_package_dir() {
        let dir = tempdir().unwrap();
        let before = std::env::current_dir().unwrap();
        let desc = descriptor(
            r#"{"name":"d","version":"1.0.0","make":"echo built > out.txt"}"#,
            dir.path(),
        );

        let ran = run_make(&ProcessRunner::new(), &desc, &Cancellation::never())
            .await
            .unwrap();

        assert!(ran);
        assert_eq!(
            fs::read_to_string(dir.path().join("out.txt")).unwrap().trim(),
            "built"
        );
        assert_eq!(std::env::current_dir().unwrap(), before);
    }

    #[tokio::test]
    async fn test_failing_make_propagates() {
        let dir = tempdir().unwrap();
        let desc = descriptor(r#"{"name":"d","version":"1.0.0","make":"exit 7"}"#, dir.path());

        let err = run_make(&ProcessRunner::new(), &desc, &Cancellation::never())
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::PKG_EXTERNAL_COMMAND_FAILED);
        assert_eq!(err.exit_code(), Some(7));
    }
}
