//! Content hashing for toolchain references and output trees.

use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

/// A full 64-character SHA-256 hash in lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
    /// Reference form used in lock files: `sha256:<hex>`.
    pub fn to_reference(&self) -> String {
        format!("sha256:{}", self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error during hashing.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("failed to walk directory: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Hash arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    ContentHash(hex::encode(hasher.finalize()))
}

/// Hash a file's contents.
pub fn hash_file(path: &Path) -> Result<ContentHash, HashError> {
    let read_error = |source| HashError::Read {
        path: path.display().to_string(),
        source,
    };

    let mut file = fs::File::open(path).map_err(read_error)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = file.read(&mut buffer).map_err(read_error)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(ContentHash(hex::encode(hasher.finalize())))
}

/// Compute a deterministic hash of a directory tree.
///
/// Covers relative paths, file contents and symlink targets; ignores
/// timestamps and permissions. Entries are visited in name order.
pub fn hash_directory(path: &Path) -> Result<ContentHash, HashError> {
    let mut hasher = Sha256::new();

    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry?;
        let entry_path = entry.path();

        let rel_path = entry_path
            .strip_prefix(path)
            .unwrap_or(entry_path)
            .to_string_lossy()
            .replace('\\', "/");

        if rel_path.is_empty() {
            continue;
        }

        let file_type = entry.file_type();
        let line = if file_type.is_symlink() {
            let target = fs::read_link(entry_path).map_err(|source| HashError::Read {
                path: entry_path.display().to_string(),
                source,
            })?;
            format!("L:{}:{}", rel_path, hash_bytes(target.to_string_lossy().as_bytes()))
        } else if file_type.is_dir() {
            format!("D:{}", rel_path)
        } else if file_type.is_file() {
            format!("F:{}:{}", rel_path, hash_file(entry_path)?)
        } else {
            continue;
        };

        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }

    Ok(ContentHash(hex::encode(hasher.finalize())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn hash_empty_directory() {
        let temp = tempdir().unwrap();
        let hash = hash_directory(temp.path()).unwrap();
        assert_eq!(hash.0.len(), 64);
    }

    #[test]
    fn hash_is_deterministic_across_trees() {
        let a = tempdir().unwrap();
        let b = tempdir().unwrap();
        for root in [a.path(), b.path()] {
            fs::create_dir_all(root.join("posts")).unwrap();
            fs::write(root.join("index.html"), "home").unwrap();
            fs::write(root.join("posts/one.html"), "one").unwrap();
        }

        assert_eq!(hash_directory(a.path()).unwrap(), hash_directory(b.path()).unwrap());
    }

    #[test]
    fn hash_changes_with_content() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("file.txt"), "original").unwrap();
        let before = hash_directory(temp.path()).unwrap();

        fs::write(temp.path().join("file.txt"), "modified").unwrap();
        let after = hash_directory(temp.path()).unwrap();

        assert_ne!(before, after);
    }

    #[test]
    fn hash_changes_with_extra_file() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.txt"), "a").unwrap();
        let before = hash_directory(temp.path()).unwrap();

        fs::write(temp.path().join("b.txt"), "").unwrap();
        let after = hash_directory(temp.path()).unwrap();

        assert_ne!(before, after);
    }

    #[test]
    fn file_hash_matches_byte_hash() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("tool");
        fs::write(&path, b"#!/bin/sh\n").unwrap();

        assert_eq!(hash_file(&path).unwrap(), hash_bytes(b"#!/bin/sh\n"));
        assert!(hash_bytes(b"").to_reference().starts_with("sha256:e3b0c442"));
    }
}
