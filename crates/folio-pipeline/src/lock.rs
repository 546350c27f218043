//! Toolchain pin file.
//!
//! The lock file (`folio.lock`) pins every toolchain component to a content
//! reference so that a build resolves to the exact same tools on every
//! machine. It lives next to the descriptor.
//!
//! # Lock File Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "package": "ui-paradigms",
//!   "tools": {
//!     "generator": {
//!       "kind": "builtin",
//!       "name": "folio-site 0.1.0",
//!       "reference": "sha256:9f2c..."
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Current lock file format version.
pub const LOCK_VERSION: u32 = 1;

/// Lock file name.
pub const LOCK_FILENAME: &str = "folio.lock";

/// A lock file pinning toolchain references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockFile {
    /// Lock file format version.
    pub version: u32,
    /// Package the lock belongs to.
    pub package: String,
    /// Pinned tools, keyed by role (`generator`, `shell`).
    pub tools: BTreeMap<String, LockedTool>,
}

/// How a tool is provided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    /// Compiled into the folio binary
    Builtin,
    /// An executable file on disk
    Executable,
}

/// A pinned tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockedTool {
    pub kind: ToolKind,

    /// Generator identity or the name the tool was requested by.
    pub name: String,

    /// Where the executable was found: relative to the descriptor when it
    /// lives in the package, absolute otherwise. Informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// `sha256:<hex>` content reference.
    pub reference: String,
}

/// Errors that can occur when working with lock files.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("failed to read lock file: {0}")]
    Read(#[source] io::Error),

    #[error("failed to write lock file: {0}")]
    Write(#[source] io::Error),

    #[error("failed to parse lock file: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("failed to serialize lock file: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("unsupported lock file version {0}, expected {LOCK_VERSION}")]
    UnsupportedVersion(u32),
}

impl LockFile {
    /// Create an empty lock file for a package.
    pub fn new(package: &str) -> Self {
        Self {
            version: LOCK_VERSION,
            package: package.to_string(),
            tools: BTreeMap::new(),
        }
    }

    /// Load a lock file from the given path.
    ///
    /// Returns `Ok(None)` if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Option<Self>, LockError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LockError::Read(e)),
        };

        let lock: LockFile = serde_json::from_str(&content).map_err(LockError::Parse)?;

        if lock.version != LOCK_VERSION {
            return Err(LockError::UnsupportedVersion(lock.version));
        }

        Ok(Some(lock))
    }

    /// Save the lock file as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), LockError> {
        let mut content = serde_json::to_string_pretty(self).map_err(LockError::Serialize)?;
        content.push('\n');
        fs::write(path, content).map_err(LockError::Write)
    }

    /// Get a pinned tool by role.
    pub fn get(&self, role: &str) -> Option<&LockedTool> {
        self.tools.get(role)
    }

    /// Insert or update a pinned tool.
    pub fn insert(&mut self, role: impl Into<String>, tool: LockedTool) {
        self.tools.insert(role.into(), tool);
    }
}
