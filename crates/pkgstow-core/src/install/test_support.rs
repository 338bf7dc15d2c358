//! Tarball fixtures shared by the install unit tests.

use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tar::Builder;

/// Build a gzip tarball in memory from `(path, contents)` pairs.
pub fn tgz(files: &[(&str, &str)]) -> Vec<u8> {
    let mut tar_bytes = Vec::new();
    {
        let mut builder = Builder::new(&mut tar_bytes);
        for (path, contents) in files {
            let mut header = tar::Header::new_gnu();
            header.set_path(path).unwrap();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append(&header, contents.as_bytes()).unwrap();
        }
        builder.finish().unwrap();
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&tar_bytes).unwrap();
    encoder.finish().unwrap()
}

/// Write tarball bytes to `dir/name` and return the path.
pub fn write_tgz(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, bytes).unwrap();
    path
}

/// Tarball with the canonical `demo@1.0.0` package (main = index.js, no lib/).
pub fn demo_tgz() -> Vec<u8> {
    tgz(&[
        (
            "pkg/package.json",
            r#"{"name":"demo","version":"1.0.0","main":"index.js"}"#,
        ),
        ("pkg/index.js", "module.exports = 42;"),
    ])
}
