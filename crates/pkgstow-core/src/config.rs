use crate::error::Error;
use crate::install::{InstallLayout, DEFAULT_TAR_PROGRAM};
use crate::paths::{default_publish_root, default_scratch_root, STORE_DIR};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Config file looked up in the working directory when `--config` is not given.
pub const CONFIG_FILE: &str = "pkgstow.json";

pub const STORE_ROOT_ENV: &str = "PKGSTOW_STORE_ROOT";
pub const PUBLISH_ROOT_ENV: &str = "PKGSTOW_PUBLISH_ROOT";
pub const SCRATCH_ROOT_ENV: &str = "PKGSTOW_SCRATCH_ROOT";
pub const TAR_PROGRAM_ENV: &str = "PKGSTOW_TAR";
pub const CHANNEL_ENV: &str = "PKGSTOW_CHANNEL";
pub const AUTH_TOKEN_ENV: &str = "PKGSTOW_TOKEN";

/// Runtime configuration for pkgstow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Current working directory.
    pub cwd: PathBuf,

    /// Whether to emit JSON logs and output.
    pub json_logs: bool,

    /// Verbosity level (0 = INFO, 1 = DEBUG, 2+ = TRACE).
    pub verbosity: u8,

    /// Channel (dev, nightly, stable) - namespaces the default directories.
    pub channel: Channel,

    /// Versioned package store. `None` means `<publish_root>/.pkgstow`.
    pub store_root: Option<PathBuf>,

    /// Directory receiving the published symlinks.
    pub publish_root: PathBuf,

    /// Scratch space for downloads and extraction.
    pub scratch_root: PathBuf,

    /// Archive tool invoked for extraction.
    pub tar_program: String,

    /// Keep a local tarball after it has been unpacked.
    pub keep_tarball: bool,

    /// Bearer token sent with tarball downloads. Only ever read from the environment.
    #[serde(skip)]
    pub auth_token: Option<String>,
}

/// Release channel for data/cache directory namespacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    #[default]
    Stable,
    Nightly,
    Dev,
}

impl Channel {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Nightly => "nightly",
            Self::Dev => "dev",
        }
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stable" => Ok(Self::Stable),
            "nightly" => Ok(Self::Nightly),
            "dev" => Ok(Self::Dev),
            other => Err(format!(
                "unknown channel '{other}' (expected stable, nightly or dev)"
            )),
        }
    }
}

/// On-disk config file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    pub store_root: Option<PathBuf>,
    pub publish_root: Option<PathBuf>,
    pub scratch_root: Option<PathBuf>,
    pub tar_program: Option<String>,
    pub keep_tarball: Option<bool>,
}

impl ConfigFile {
    /// Read and parse a config file.
    pub fn read(path: &Path) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::new(cwd)
    }
}

impl Config {
    /// Create a config with default roots for the stable channel.
    #[must_use]
    pub fn new(cwd: PathBuf) -> Self {
        let channel = Channel::default();
        Self {
            cwd,
            json_logs: false,
            verbosity: 0,
            channel,
            store_root: None,
            publish_root: default_publish_root(channel),
            scratch_root: default_scratch_root(channel),
            tar_program: DEFAULT_TAR_PROGRAM.to_string(),
            keep_tarball: false,
            auth_token: None,
        }
    }

    /// Set verbosity level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set JSON log output.
    #[must_use]
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }

    /// Set channel and reset the default roots to that channel's directories.
    ///
    /// Apply this before any explicit root, or the roots are lost.
    #[must_use]
    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channel = channel;
        self.publish_root = default_publish_root(channel);
        self.scratch_root = default_scratch_root(channel);
        self
    }

    #[must_use]
    pub fn with_store_root(mut self, path: impl AsRef<Path>) -> Self {
        self.store_root = Some(self.resolve(path.as_ref()));
        self
    }

    #[must_use]
    pub fn with_publish_root(mut self, path: impl AsRef<Path>) -> Self {
        self.publish_root = self.resolve(path.as_ref());
        self
    }

    #[must_use]
    pub fn with_scratch_root(mut self, path: impl AsRef<Path>) -> Self {
        self.scratch_root = self.resolve(path.as_ref());
        self
    }

    #[must_use]
    pub fn with_tar_program(mut self, program: impl Into<String>) -> Self {
        self.tar_program = program.into();
        self
    }

    #[must_use]
    pub fn with_keep_tarball(mut self, keep: bool) -> Self {
        self.keep_tarball = keep;
        self
    }

    /// Layer a config file over the current values.
    ///
    /// With `explicit` set the file must exist. Otherwise `pkgstow.json` in the
    /// working directory is used if present.
    pub fn with_config_file(self, explicit: Option<&Path>) -> Result<Self, Error> {
        let path = match explicit {
            Some(p) => self.resolve(p),
            None => {
                let candidate = self.cwd.join(CONFIG_FILE);
                if !candidate.is_file() {
                    return Ok(self);
                }
                candidate
            }
        };

        let file = ConfigFile::read(&path)?;
        tracing::debug!(path = %path.display(), "Loaded config file");
        Ok(self.apply_file(file))
    }

    /// Apply the keys present in `file`.
    #[must_use]
    pub fn apply_file(mut self, file: ConfigFile) -> Self {
        if let Some(p) = file.store_root {
            self = self.with_store_root(p);
        }
        if let Some(p) = file.publish_root {
            self = self.with_publish_root(p);
        }
        if let Some(p) = file.scratch_root {
            self = self.with_scratch_root(p);
        }
        if let Some(t) = file.tar_program {
            self.tar_program = t;
        }
        if let Some(k) = file.keep_tarball {
            self.keep_tarball = k;
        }
        self
    }

    /// Apply `PKGSTOW_*` environment overrides. Empty values are ignored.
    #[must_use]
    pub fn with_env(mut self) -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        if let Some(p) = var(STORE_ROOT_ENV) {
            self = self.with_store_root(p);
        }
        if let Some(p) = var(PUBLISH_ROOT_ENV) {
            self = self.with_publish_root(p);
        }
        if let Some(p) = var(SCRATCH_ROOT_ENV) {
            self = self.with_scratch_root(p);
        }
        if let Some(t) = var(TAR_PROGRAM_ENV) {
            self.tar_program = t;
        }
        if let Some(t) = var(AUTH_TOKEN_ENV) {
            self.auth_token = Some(t);
        }
        self
    }

    /// Effective store root.
    #[must_use]
    pub fn store_root(&self) -> PathBuf {
        self.store_root
            .clone()
            .unwrap_or_else(|| self.publish_root.join(STORE_DIR))
    }

    /// Directory layout the installer works against.
    #[must_use]
    pub fn layout(&self) -> InstallLayout {
        InstallLayout::new(
            self.store_root(),
            self.publish_root.clone(),
            self.scratch_root.clone(),
        )
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            dunce::simplified(&self.cwd.join(path)).to_path_buf()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::tempdir;

    fn clear_env() {
        for var in [
            STORE_ROOT_ENV,
            PUBLISH_ROOT_ENV,
            SCRATCH_ROOT_ENV,
            TAR_PROGRAM_ENV,
            AUTH_TOKEN_ENV,
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::new(PathBuf::from("/w"));
        assert_eq!(config.tar_program, "tar");
        assert!(!config.keep_tarball);
        assert_eq!(config.store_root(), config.publish_root.join(".pkgstow"));

        let layout = config.layout();
        assert_eq!(layout.publish_root(), config.publish_root);
        assert_eq!(layout.scratch_root(), config.scratch_root);
    }

    #[test]
    fn test_store_follows_publish_root() {
        let config = Config::new(PathBuf::from("/w")).with_publish_root("/opt/pub");
        assert_eq!(config.store_root(), PathBuf::from("/opt/pub/.pkgstow"));

        let config = config.with_store_root("/srv/store");
        assert_eq!(config.store_root(), PathBuf::from("/srv/store"));
    }

    #[test]
    fn test_relative_roots_resolve_against_cwd() {
        let config = Config::new(PathBuf::from("/w"))
            .with_publish_root("pub")
            .with_scratch_root("tmp");
        assert_eq!(config.publish_root, PathBuf::from("/w/pub"));
        assert_eq!(config.scratch_root, PathBuf::from("/w/tmp"));
    }

    #[test]
    fn test_channel_resets_default_roots() {
        let stable = Config::new(PathBuf::from("/w"));
        let dev = Config::new(PathBuf::from("/w")).with_channel(Channel::Dev);
        assert_ne!(stable.publish_root, dev.publish_root);
        assert_ne!(stable.scratch_root, dev.scratch_root);
    }

    #[test]
    fn test_channel_parse() {
        assert_eq!("dev".parse::<Channel>(), Ok(Channel::Dev));
        assert_eq!("Nightly".parse::<Channel>(), Ok(Channel::Nightly));
        assert!("beta".parse::<Channel>().unwrap_err().contains("beta"));
    }

    #[test]
    fn test_channel_then_explicit_root() {
        let config = Config::new(PathBuf::from("/w"))
            .with_channel(Channel::Nightly)
            .with_publish_root("/opt/pub");
        assert_eq!(config.channel, Channel::Nightly);
        assert_eq!(config.publish_root, PathBuf::from("/opt/pub"));
        assert_eq!(config.scratch_root, default_scratch_root(Channel::Nightly));
    }

    #[test]
    fn test_config_file_in_cwd() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{"publishRoot":"pub","tarProgram":"gtar","keepTarball":true}"#,
        )
        .unwrap();

        let config = Config::new(dir.path().to_path_buf())
            .with_config_file(None)
            .unwrap();
        assert_eq!(config.publish_root, dir.path().join("pub"));
        assert_eq!(config.tar_program, "gtar");
        assert!(config.keep_tarball);
    }

    #[test]
    fn test_missing_optional_config_file_is_fine() {
        let dir = tempdir().unwrap();
        let config = Config::new(dir.path().to_path_buf())
            .with_config_file(None)
            .unwrap();
        assert_eq!(config.tar_program, "tar");
    }

    #[test]
    fn test_explicit_config_file_errors() {
        let dir = tempdir().unwrap();
        let err = Config::new(dir.path().to_path_buf())
            .with_config_file(Some(Path::new("nope.json")))
            .unwrap_err();
        assert!(matches!(err, Error::ConfigRead { .. }));

        fs::write(dir.path().join("bad.json"), "{not json").unwrap();
        let err = Config::new(dir.path().to_path_buf())
            .with_config_file(Some(Path::new("bad.json")))
            .unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        clear_env();
        std::env::set_var(SCRATCH_ROOT_ENV, "/env/tmp");
        std::env::set_var(TAR_PROGRAM_ENV, "bsdtar");
        std::env::set_var(STORE_ROOT_ENV, "");

        let file = ConfigFile {
            scratch_root: Some(PathBuf::from("/file/tmp")),
            tar_program: Some("gtar".to_string()),
            ..ConfigFile::default()
        };
        let config = Config::new(PathBuf::from("/w")).apply_file(file).with_env();

        assert_eq!(config.scratch_root, PathBuf::from("/env/tmp"));
        assert_eq!(config.tar_program, "bsdtar");
        assert!(config.store_root.is_none());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_auth_token() {
        clear_env();
        let config = Config::new(PathBuf::from("/w")).with_env();
        assert!(config.auth_token.is_none());

        std::env::set_var(AUTH_TOKEN_ENV, "s3cret");
        let config = Config::new(PathBuf::from("/w")).with_env();
        assert_eq!(config.auth_token.as_deref(), Some("s3cret"));

        // Never written back out
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("s3cret"));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_relative_root() {
        clear_env();
        std::env::set_var(PUBLISH_ROOT_ENV, "published");

        let config = Config::new(PathBuf::from("/w")).with_env();
        assert_eq!(config.publish_root, PathBuf::from("/w/published"));

        clear_env();
    }
}
