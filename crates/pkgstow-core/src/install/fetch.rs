//! Downloading remote tarballs into the scratch root.

use super::error::InstallError;
use bytes::Bytes;
use reqwest::Client;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::io::AsyncWriteExt;
use url::Url;

/// Maximum tarball size (200 MB).
pub const MAX_TARBALL_SIZE: u64 = 200 * 1024 * 1024;

/// Download timeout in seconds.
const DOWNLOAD_TIMEOUT_SECS: u64 = 30;

/// Connect timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Something that can place a remote tarball at a local path.
///
/// On success the file at `dest` must be completely written and closed.
pub trait Fetcher {
    fn fetch(&self, url: &Url, dest: &Path)
        -> impl Future<Output = Result<(), InstallError>> + Send;
}

/// HTTP(S) fetcher backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http: Client,
    max_bytes: u64,
    auth_token: Option<String>,
}

impl HttpFetcher {
    /// Create a fetcher with default timeouts and size limit.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new() -> Result<Self, InstallError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .user_agent(concat!("pkgstow/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| InstallError::fetch_failed(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            max_bytes: MAX_TARBALL_SIZE,
            auth_token: None,
        })
    }

    /// Attach a `Bearer` token to every request.
    #[must_use]
    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token;
        self
    }

    #[must_use]
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    async fn download(&self, url: &Url) -> Result<Bytes, InstallError> {
        let mut request = self.http.get(url.as_str());
        if let Some(token) = &self.auth_token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| InstallError::fetch_failed(format!("Failed to download '{url}': {e}")))?;

        if !response.status().is_success() {
            return Err(InstallError::fetch_failed(format!(
                "Download failed with status {} for '{url}'",
                response.status()
            )));
        }

        let max_bytes = self.max_bytes;
        if let Some(len) = response.content_length() {
            if len > max_bytes {
                return Err(InstallError::fetch_failed(format!(
                    "Tarball too large: {len} bytes (max: {max_bytes})"
                )));
            }
        }

        let bytes = response.bytes().await?;
        if bytes.len() as u64 > max_bytes {
            return Err(InstallError::fetch_failed(format!(
                "Tarball too large: {} bytes (max: {max_bytes})",
                bytes.len()
            )));
        }

        Ok(bytes)
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, dest: &Path) -> Result<(), InstallError> {
        let bytes = self.download(url).await?;
        write_closed(dest, &bytes).await
    }
}

/// Write `bytes` to `dest`, flush to disk, and close the file before returning.
async fn write_closed(dest: &Path, bytes: &[u8]) -> Result<(), InstallError> {
    let write_err =
        |e: std::io::Error| InstallError::fetch_failed(format!("Failed to write {}: {e}", dest.display()));

    let mut file = tokio::fs::File::create(dest).await.map_err(write_err)?;
    file.write_all(bytes).await.map_err(write_err)?;
    file.sync_all().await.map_err(write_err)?;
    drop(file);
    Ok(())
}

/// Scratch file name for a fetched tarball: the reference with non-alphanumerics
/// replaced by `-`, then a millisecond timestamp and a random suffix.
#[must_use]
pub fn fetch_target(scratch_root: &Path, reference: &str) -> PathBuf {
    let sanitized: String = reference
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);

    scratch_root.join(format!("{sanitized}-{millis}-{:08x}.tgz", rand_u32()))
}

/// Some randomness for scratch names.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn rand_u32() -> u32 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let mut hasher = RandomState::new().build_hasher();
    hasher.write_u64(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0),
    );
    hasher.write_u32(std::process::id());
    hasher.finish() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_fetch_target_name() {
        let target = fetch_target(Path::new("/tmp/scratch"), "https://ex.com/a-1.0.0.tgz");
        assert_eq!(target.parent().unwrap(), Path::new("/tmp/scratch"));

        let name = target.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("https---ex-com-a-1-0-0-tgz-"));
        assert!(
            name.ends_with(".tgz"),
            "fetched tarball should keep a .tgz suffix: {name}"
        );
    }

    #[test]
    fn test_fetch_targets_do_not_collide() {
        let a = fetch_target(Path::new("/s"), "https://ex.com/a.tgz");
        let b = fetch_target(Path::new("/s"), "https://ex.com/a.tgz");
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_write_closed() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("out.tgz");
        write_closed(&dest, b"payload").await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"payload");
    }

    #[tokio::test]
    async fn test_write_into_missing_dir_fails() {
        let dir = tempdir().unwrap();
        let err = write_closed(&dir.path().join("missing").join("out.tgz"), b"x")
            .await
            .unwrap_err();
        assert_eq!(err.code(), crate::install::error::codes::PKG_FETCH_FAILED);
    }
}
