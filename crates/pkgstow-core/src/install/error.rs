//! Install pipeline error types.

use pkgstow_util::fs::EnsureDirError;
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Install error codes.
pub mod codes {
    pub const PKG_REFERENCE_UNREACHABLE: &str = "PKG_REFERENCE_UNREACHABLE";
    pub const PKG_FETCH_FAILED: &str = "PKG_FETCH_FAILED";
    pub const PKG_DIRECTORY_CREATE_FAILED: &str = "PKG_DIRECTORY_CREATE_FAILED";
    pub const PKG_NOT_A_DIRECTORY: &str = "PKG_NOT_A_DIRECTORY";
    pub const PKG_EXTRACTION_FAILED: &str = "PKG_EXTRACTION_FAILED";
    pub const PKG_METADATA_UNREADABLE: &str = "PKG_METADATA_UNREADABLE";
    pub const PKG_METADATA_MALFORMED: &str = "PKG_METADATA_MALFORMED";
    pub const PKG_INVALID_VERSION: &str = "PKG_INVALID_VERSION";
    pub const PKG_REMOVAL_FAILED: &str = "PKG_REMOVAL_FAILED";
    pub const PKG_MOVE_FAILED: &str = "PKG_MOVE_FAILED";
    pub const PKG_SHIM_WRITE_FAILED: &str = "PKG_SHIM_WRITE_FAILED";
    pub const PKG_LIB_DIR_NOT_FOUND: &str = "PKG_LIB_DIR_NOT_FOUND";
    pub const PKG_LIB_DIR_NOT_A_DIRECTORY: &str = "PKG_LIB_DIR_NOT_A_DIRECTORY";
    pub const PKG_EXTERNAL_COMMAND_FAILED: &str = "PKG_EXTERNAL_COMMAND_FAILED";
    pub const PKG_LINK_FAILED: &str = "PKG_LINK_FAILED";
    pub const PKG_CANCELLED: &str = "PKG_CANCELLED";
    pub const PKG_STORE_UNREADABLE: &str = "PKG_STORE_UNREADABLE";
}

/// Pipeline stage an error is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    Stat,
    Scratch,
    Extract,
    Cleanup,
    Descriptor,
    Place,
    Shim,
    LinkMain,
    Build,
    LinkLib,
}

impl Stage {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Stat => "stat",
            Self::Scratch => "scratch",
            Self::Extract => "extract",
            Self::Cleanup => "cleanup",
            Self::Descriptor => "descriptor",
            Self::Place => "place",
            Self::Shim => "shim",
            Self::LinkMain => "link_main",
            Self::Build => "build",
            Self::LinkLib => "link_lib",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Install pipeline error.
#[derive(Debug)]
pub struct InstallError {
    code: &'static str,
    stage: Option<Stage>,
    message: String,
    exit_code: Option<i32>,
}

impl InstallError {
    /// Create a new error with the given code and message.
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            stage: None,
            message: message.into(),
            exit_code: None,
        }
    }

    /// Attribute this error to a pipeline stage.
    ///
    /// The first attribution wins, so a nested install keeps its own stage.
    #[must_use]
    pub fn at(mut self, stage: Stage) -> Self {
        self.stage.get_or_insert(stage);
        self
    }

    /// Get the error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// Get the stage, if one was attached.
    #[must_use]
    pub fn stage(&self) -> Option<Stage> {
        self.stage
    }

    /// Get the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Exit code of the failed external command, if any.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn reference_unreachable(reference: &str, reason: impl fmt::Display) -> Self {
        Self::new(
            codes::PKG_REFERENCE_UNREACHABLE,
            format!("Cannot access tarball '{reference}': {reason}"),
        )
    }

    pub fn fetch_failed(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_FETCH_FAILED, msg)
    }

    pub fn extraction_failed(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_EXTRACTION_FAILED, msg)
    }

    #[must_use]
    pub fn store_unreadable(path: &Path, reason: impl fmt::Display) -> Self {
        Self::new(
            codes::PKG_STORE_UNREADABLE,
            format!("Cannot list store {}: {reason}", path.display()),
        )
    }

    #[must_use]
    pub fn metadata_unreadable(path: &Path, reason: impl fmt::Display) -> Self {
        Self::new(
            codes::PKG_METADATA_UNREADABLE,
            format!("Failed to read {}: {reason}", path.display()),
        )
    }

    #[must_use]
    pub fn metadata_malformed(path: &Path, reason: impl fmt::Display, raw: &str) -> Self {
        Self::new(
            codes::PKG_METADATA_MALFORMED,
            format!(
                "Failed to parse json file: {}\n{reason}\n{raw}",
                path.display()
            ),
        )
    }

    #[must_use]
    pub fn invalid_version(version: &str) -> Self {
        Self::new(
            codes::PKG_INVALID_VERSION,
            format!("Invalid version: '{version}'"),
        )
    }

    #[must_use]
    pub fn removal_failed(path: &Path, reason: impl fmt::Display) -> Self {
        Self::new(
            codes::PKG_REMOVAL_FAILED,
            format!("{} exists, and can't be removed: {reason}", path.display()),
        )
    }

    #[must_use]
    pub fn move_failed(from: &Path, to: &Path, reason: impl fmt::Display) -> Self {
        Self::new(
            codes::PKG_MOVE_FAILED,
            format!(
                "Failed to move {} to {}: {reason}",
                from.display(),
                to.display()
            ),
        )
    }

    #[must_use]
    pub fn shim_write_failed(path: &Path, reason: impl fmt::Display) -> Self {
        Self::new(
            codes::PKG_SHIM_WRITE_FAILED,
            format!("Failed to write shim {}: {reason}", path.display()),
        )
    }

    #[must_use]
    pub fn lib_dir_not_found(path: &Path) -> Self {
        Self::new(
            codes::PKG_LIB_DIR_NOT_FOUND,
            format!("Libs dir not found: {}", path.display()),
        )
    }

    #[must_use]
    pub fn lib_dir_not_a_directory(lib: &str) -> Self {
        Self::new(
            codes::PKG_LIB_DIR_NOT_A_DIRECTORY,
            format!("Libs dir not a dir: {lib}"),
        )
    }

    /// An external command ran and exited unsuccessfully.
    #[must_use]
    pub fn command_failed(command: &str, exit_code: i32) -> Self {
        Self {
            exit_code: Some(exit_code),
            ..Self::new(
                codes::PKG_EXTERNAL_COMMAND_FAILED,
                format!("`{command}` failed with {exit_code}"),
            )
        }
    }

    /// An external command could not be started or waited on.
    pub fn command_spawn_failed(command: &str, reason: impl fmt::Display) -> Self {
        Self::new(
            codes::PKG_EXTERNAL_COMMAND_FAILED,
            format!("Failed to run `{command}`: {reason}"),
        )
    }

    pub fn link_failed(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_LINK_FAILED, msg)
    }

    #[must_use]
    pub fn cancelled() -> Self {
        Self::new(codes::PKG_CANCELLED, "Install cancelled")
    }

    /// Whether this error came from an observed cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.code == codes::PKG_CANCELLED
    }
}

impl fmt::Display for InstallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stage {
            Some(stage) => write!(f, "{} (stage: {stage}): {}", self.code, self.message),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

impl std::error::Error for InstallError {}

impl From<EnsureDirError> for InstallError {
    fn from(e: EnsureDirError) -> Self {
        let code = match e {
            EnsureDirError::NotADirectory { .. } => codes::PKG_NOT_A_DIRECTORY,
            EnsureDirError::CreateFailed { .. } | EnsureDirError::WorkingDir { .. } => {
                codes::PKG_DIRECTORY_CREATE_FAILED
            }
        };
        Self::new(code, e.to_string())
    }
}

impl From<reqwest::Error> for InstallError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::fetch_failed(format!("Request timed out: {e}"))
        } else if e.is_connect() {
            Self::fetch_failed(format!("Connection failed: {e}"))
        } else {
            Self::fetch_failed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_error_code_format() {
        let err = InstallError::invalid_version("1.2");
        assert_eq!(err.code(), codes::PKG_INVALID_VERSION);
        assert!(err.to_string().contains(codes::PKG_INVALID_VERSION));
        assert!(err.message().contains("1.2"));
    }

    #[test]
    fn test_first_stage_wins() {
        let err = InstallError::cancelled()
            .at(Stage::Extract)
            .at(Stage::Fetch);
        assert_eq!(err.stage(), Some(Stage::Extract));
        assert!(err.to_string().contains("stage: extract"));
    }

    #[test]
    fn test_command_failed_keeps_exit_code() {
        let err = InstallError::command_failed("make", 2);
        assert_eq!(err.code(), codes::PKG_EXTERNAL_COMMAND_FAILED);
        assert_eq!(err.exit_code(), Some(2));
        assert!(err.message().contains("`make` failed with 2"));
    }

    #[test]
    fn test_ensure_dir_error_mapping() {
        let not_dir = EnsureDirError::NotADirectory {
            path: PathBuf::from("/a"),
            ensuring: PathBuf::from("/a/b"),
        };
        assert_eq!(InstallError::from(not_dir).code(), codes::PKG_NOT_A_DIRECTORY);

        let create = EnsureDirError::CreateFailed {
            path: PathBuf::from("/a"),
            ensuring: PathBuf::from("/a/b"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        let err = InstallError::from(create);
        assert_eq!(err.code(), codes::PKG_DIRECTORY_CREATE_FAILED);
        assert!(err.message().contains("/a"));
    }

    #[test]
    fn test_store_unreadable_is_not_a_metadata_error() {
        let err = InstallError::store_unreadable(Path::new("/srv/store"), "permission denied");
        assert_eq!(err.code(), codes::PKG_STORE_UNREADABLE);
        assert_ne!(err.code(), codes::PKG_METADATA_UNREADABLE);
        assert!(err.message().contains("/srv/store"));
        assert!(err.message().contains("permission denied"));
    }

    #[test]
    fn test_error_codes_uppercase() {
        let all_codes = [
            codes::PKG_REFERENCE_UNREACHABLE,
            codes::PKG_FETCH_FAILED,
            codes::PKG_DIRECTORY_CREATE_FAILED,
            codes::PKG_NOT_A_DIRECTORY,
            codes::PKG_EXTRACTION_FAILED,
            codes::PKG_METADATA_UNREADABLE,
            codes::PKG_METADATA_MALFORMED,
            codes::PKG_INVALID_VERSION,
            codes::PKG_REMOVAL_FAILED,
            codes::PKG_MOVE_FAILED,
            codes::PKG_SHIM_WRITE_FAILED,
            codes::PKG_LIB_DIR_NOT_FOUND,
            codes::PKG_LIB_DIR_NOT_A_DIRECTORY,
            codes::PKG_EXTERNAL_COMMAND_FAILED,
            codes::PKG_LINK_FAILED,
            codes::PKG_CANCELLED,
            codes::PKG_STORE_UNREADABLE,
        ];

        for code in all_codes {
            assert!(
                code.chars().all(|c| c.is_uppercase() || c == '_'),
                "Error code '{code}' should be SCREAMING_SNAKE_CASE"
            );
        }
    }
}
