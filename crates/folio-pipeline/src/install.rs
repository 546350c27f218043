//! Artifact installation.
//!
//! Copies a finished build into its install destination. The copy is made in
//! a staging directory next to the destination and swapped in with renames,
//! so the destination holds either the previous install or the new one and
//! never a mix of both.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::hash::{hash_directory, ContentHash, HashError};

/// A finished install.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallReport {
    pub dest: PathBuf,
    /// Files installed, symlinks included
    pub files: usize,
    /// Hash of the installed tree
    pub hash: ContentHash,
}

/// Errors that can occur while installing.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("build output not found: {0}")]
    MissingOutput(String),

    #[error("install destination has no parent directory: {0}")]
    InvalidDest(String),

    #[error("failed to install {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error("installed tree does not match the build output: expected {expected}, found {actual}")]
    Verify {
        expected: ContentHash,
        actual: ContentHash,
    },
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> InstallError + '_ {
    move |source| InstallError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Installs build output to a destination directory.
pub struct Installer {
    dest: PathBuf,
}

impl Installer {
    pub fn new(dest: impl Into<PathBuf>) -> Self {
        Self { dest: dest.into() }
    }

    /// Replace the destination with a copy of `output`.
    ///
    /// Installing the same output twice leaves an identical tree.
    pub fn install(&self, output: &Path) -> Result<InstallReport, InstallError> {
        if !output.is_dir() {
            return Err(InstallError::MissingOutput(output.display().to_string()));
        }

        let expected = hash_directory(output)?;

        let staging = self.sibling("folio-staging")?;
        let previous = self.sibling("folio-previous")?;
        remove_any(&staging)?;
        remove_any(&previous)?;

        let files = copy_tree(output, &staging)?;
        debug!(files, staging = %staging.display(), "staged install");

        swap(&staging, &self.dest, &previous)?;
        remove_any(&previous)?;

        let actual = hash_directory(&self.dest)?;
        if actual != expected {
            return Err(InstallError::Verify { expected, actual });
        }

        info!("Installed {} files to {}", files, self.dest.display());

        Ok(InstallReport {
            dest: self.dest.clone(),
            files,
            hash: actual,
        })
    }

    /// `.<name>.<suffix>` next to the destination.
    fn sibling(&self, suffix: &str) -> Result<PathBuf, InstallError> {
        let name = self
            .dest
            .file_name()
            .ok_or_else(|| InstallError::InvalidDest(self.dest.display().to_string()))?;
        let parent = match self.dest.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(io_error(&parent))?;
        Ok(parent.join(format!(".{}.{}", name.to_string_lossy(), suffix)))
    }
}

/// Move `dest` aside to `previous` and `staging` into its place.
///
/// When the second rename fails the previous tree is moved back.
fn swap(staging: &Path, dest: &Path, previous: &Path) -> Result<(), InstallError> {
    let had_previous = fs::symlink_metadata(dest).is_ok();
    if had_previous {
        fs::rename(dest, previous).map_err(io_error(dest))?;
    }

    if let Err(e) = fs::rename(staging, dest) {
        if had_previous {
            match fs::rename(previous, dest) {
                Ok(()) => warn!("restored previous install at {}", dest.display()),
                Err(restore) => error!(
                    "failed to restore previous install from {}: {}",
                    previous.display(),
                    restore
                ),
            }
        }
        return Err(io_error(dest)(e));
    }

    Ok(())
}

/// Remove a file, symlink or directory tree if it exists.
fn remove_any(path: &Path) -> Result<(), InstallError> {
    let result = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => Err(e),
    };
    result.map_err(io_error(path))
}

/// Copy a tree, recreating symlinks rather than following them.
fn copy_tree(src: &Path, dest: &Path) -> Result<usize, InstallError> {
    let mut files = 0;

    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry.map_err(HashError::from)?;
        let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dest.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(io_error(&target))?;
        } else if file_type.is_symlink() {
            let link = fs::read_link(entry.path()).map_err(io_error(entry.path()))?;
            symlink(&link, &target).map_err(io_error(&target))?;
            files += 1;
        } else if file_type.is_file() {
            fs::copy(entry.path(), &target).map_err(io_error(&target))?;
            files += 1;
        }
    }

    Ok(files)
}

#[cfg(unix)]
fn symlink(link: &Path, target: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(link, target)
}

#[cfg(windows)]
fn symlink(link: &Path, target: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(link, target)
}
