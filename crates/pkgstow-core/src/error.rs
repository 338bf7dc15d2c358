use std::path::PathBuf;
use thiserror::Error;

/// Errors loading configuration. Install failures use `InstallError`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_file() {
        let err = Error::ConfigRead {
            path: PathBuf::from("/w/pkgstow.json"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.to_string().contains("/w/pkgstow.json"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
