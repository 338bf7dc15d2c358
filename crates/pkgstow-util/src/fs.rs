use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Default permission bits for directories created by [`ensure_dir`].
pub const DEFAULT_DIR_MODE: u32 = 0o755;

/// Failure while ensuring a directory exists.
#[derive(Debug, Error)]
pub enum EnsureDirError {
    /// An ancestor could not be created.
    #[error("Failed to make {} while ensuring {}: {source}", path.display(), ensuring.display())]
    CreateFailed {
        path: PathBuf,
        ensuring: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A path component exists but is not a directory.
    #[error("Failed to mkdir {}: File exists (while ensuring {})", path.display(), ensuring.display())]
    NotADirectory { path: PathBuf, ensuring: PathBuf },

    /// A relative path was given and the working directory is unavailable.
    #[error("Cannot resolve relative path {}: {source}", path.display())]
    WorkingDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl EnsureDirError {
    /// The path component that caused the failure.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::CreateFailed { path, .. }
            | Self::NotADirectory { path, .. }
            | Self::WorkingDir { path, .. } => path,
        }
    }
}

/// Ensure `path` exists as a directory, creating missing ancestors left to right.
///
/// Relative paths are resolved against the current working directory. Existing
/// directories are left untouched, so calling this twice is a no-op the second time.
/// `mode` applies to newly created directories on Unix and is ignored elsewhere.
///
/// Returns the absolute path that was ensured.
///
/// # Errors
/// Returns [`EnsureDirError::NotADirectory`] if a component exists as a file (or any
/// other non-directory entry), and [`EnsureDirError::CreateFailed`] naming the first
/// ancestor that could not be created.
pub fn ensure_dir(path: &Path, mode: u32) -> Result<PathBuf, EnsureDirError> {
    let target = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|source| EnsureDirError::WorkingDir {
                path: path.to_path_buf(),
                source,
            })?
            .join(path)
    };

    let mut current = PathBuf::new();
    for component in target.components() {
        current.push(component);
        if matches!(component, Component::Prefix(_) | Component::RootDir) {
            continue;
        }

        match fs::metadata(&current) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(EnsureDirError::NotADirectory {
                    path: current,
                    ensuring: target.clone(),
                })
            }
            Err(_) => create_one(&current, mode).map_err(|source| {
                if current.exists() && !current.is_dir() {
                    EnsureDirError::NotADirectory {
                        path: current.clone(),
                        ensuring: target.clone(),
                    }
                } else {
                    EnsureDirError::CreateFailed {
                        path: current.clone(),
                        ensuring: target.clone(),
                        source,
                    }
                }
            })?,
        }
    }

    Ok(target)
}

fn create_one(dir: &Path, mode: u32) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();

    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    match builder.create(dir) {
        // Lost a race with another creator; fine as long as it is a directory.
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
        other => other,
    }
}

/// Atomically write bytes to a file by writing to a temp file then renaming.
///
/// The file will either have the old contents or the new contents, never a partial write.
///
/// # Errors
/// Returns an error if the write or rename fails.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));

    // Same directory as the target so the rename never crosses filesystems
    let temp_path = parent.join(format!(
        ".{}.tmp.{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("file"),
        std::process::id()
    ));

    {
        let mut file = File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    match fs::rename(&temp_path, path) {
        Ok(()) => Ok(()),
        Err(e) => {
            if cfg!(windows) {
                fs::copy(&temp_path, path)?;
                let _ = fs::remove_file(&temp_path);
                Ok(())
            } else {
                let _ = fs::remove_file(&temp_path);
                Err(e)
            }
        }
    }
}

/// How [`move_dir`] got the tree into place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveStrategy {
    Rename,
    CopyThenDelete,
    /// The copy is complete but the source could not be removed.
    CopyKeptSource,
}

/// Move a directory tree from `src` to `dst`.
///
/// Tries a rename first. If that fails (for example `EXDEV` when `src` and `dst` live on
/// different filesystems) the tree is copied and the source removed afterwards.
/// `dst` must not exist.
///
/// Once the copy has landed `dst` is complete, so a source that cannot be removed is
/// reported as [`MoveStrategy::CopyKeptSource`] rather than as an error.
///
/// # Errors
/// Returns an error describing both the rename and the copy failure when neither works.
pub fn move_dir(src: &Path, dst: &Path) -> io::Result<MoveStrategy> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(MoveStrategy::Rename),
        Err(rename_err) => copy_then_delete(src, dst, &rename_err),
    }
}

fn copy_then_delete(src: &Path, dst: &Path, rename_err: &io::Error) -> io::Result<MoveStrategy> {
    if let Err(copy_err) = copy_dir_all(src, dst) {
        let _ = fs::remove_dir_all(dst);
        return Err(io::Error::new(
            copy_err.kind(),
            format!("rename failed ({rename_err}); copy fallback failed ({copy_err})"),
        ));
    }

    match fs::remove_dir_all(src) {
        Ok(()) => Ok(MoveStrategy::CopyThenDelete),
        Err(_) => Ok(MoveStrategy::CopyKeptSource),
    }
}

/// Recursively copy `src` into `dst`, preserving file permissions and (on Unix) symlinks.
///
/// # Errors
/// Returns an error if any entry cannot be read or written.
pub fn copy_dir_all(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;

    for entry in WalkDir::new(src).min_depth(1).follow_links(false) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            #[cfg(unix)]
            std::os::unix::fs::symlink(fs::read_link(entry.path())?, &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }

    Ok(())
}
