//! Environment resolution.
//!
//! Turns the toolchain declared in the descriptor into concrete, content
//! addressed tools. With a lock file present every tool must match its pin
//! exactly; without one the tools are resolved fresh and pinned.

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::descriptor::{Descriptor, GeneratorSpec};
use crate::hash::{hash_bytes, hash_file, HashError};
use crate::lock::{LockError, LockFile, LockedTool, ToolKind};

/// Role of the site generator in the toolchain.
pub const GENERATOR_ROLE: &str = "generator";

/// Role of the shell running external build commands.
pub const SHELL_ROLE: &str = "shell";

/// A tool resolved to an exact reference.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTool {
    pub kind: ToolKind,
    pub name: String,
    pub location: Option<PathBuf>,
    pub reference: String,
}

impl ResolvedTool {
    /// Lock entry for this tool. Locations under `root` are stored relative
    /// to it so the lock stays valid when the package moves.
    fn to_locked(&self, root: Option<&Path>) -> LockedTool {
        LockedTool {
            kind: self.kind,
            name: self.name.clone(),
            location: self.location.as_ref().map(|path| {
                root.and_then(|root| path.strip_prefix(root).ok())
                    .map(|relative| relative.to_string_lossy().replace('\\', "/"))
                    .unwrap_or_else(|| path.to_string_lossy().to_string())
            }),
            reference: self.reference.clone(),
        }
    }
}

/// The resolved toolchain for one build.
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    tools: BTreeMap<String, ResolvedTool>,
}

impl Environment {
    pub fn get(&self, role: &str) -> Option<&ResolvedTool> {
        self.tools.get(role)
    }

    pub fn tools(&self) -> impl Iterator<Item = (&str, &ResolvedTool)> {
        self.tools.iter().map(|(role, tool)| (role.as_str(), tool))
    }

    /// Combined reference of every tool, stable for identical toolchains.
    pub fn fingerprint(&self) -> String {
        let mut lines = String::new();
        for (role, tool) in &self.tools {
            lines.push_str(role);
            lines.push('=');
            lines.push_str(&tool.reference);
            lines.push('\n');
        }
        hash_bytes(lines.as_bytes()).to_reference()
    }
}

/// Errors that can occur while resolving the toolchain.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("lock file belongs to package '{locked}', descriptor declares '{declared}'")]
    PackageMismatch { locked: String, declared: String },

    #[error("{role} is not pinned in the lock file; run `folio lock`")]
    Unpinned { role: String },

    #[error("{role} '{name}' not found")]
    NotFound { role: String, name: String },

    #[error("pinned {role} at {location} is unreachable")]
    Unreachable { role: String, location: String },

    #[error("{role} does not match its pin: locked {pinned}, found {actual}")]
    Mismatch {
        role: String,
        pinned: String,
        actual: String,
    },

    #[error("failed to hash {role}: {source}")]
    Hash {
        role: String,
        #[source]
        source: HashError,
    },
}

/// What the descriptor asks for in one role.
#[derive(Debug, Clone, PartialEq)]
enum ToolRequest {
    Builtin,
    Executable(String),
}

/// Reference of the generator compiled into this binary.
pub fn builtin_reference() -> String {
    format!("sha256:{}", folio_site::fingerprint())
}

/// Resolves the toolchain of one package.
pub struct Resolver<'a> {
    descriptor: &'a Descriptor,
}

impl<'a> Resolver<'a> {
    pub fn new(descriptor: &'a Descriptor) -> Self {
        Self { descriptor }
    }

    /// Resolve against the lock file, creating it when absent.
    pub fn resolve(&self) -> Result<Environment, ResolveError> {
        let lock_path = self.descriptor.lock_path();

        match LockFile::load(&lock_path)? {
            Some(lock) => {
                debug!(lock = %lock_path.display(), "resolving against lock file");
                self.resolve_pinned(&lock)
            }
            None => {
                info!("no lock file, pinning toolchain in {}", lock_path.display());
                self.update()
            }
        }
    }

    /// Resolve fresh, ignoring any existing pins, and rewrite the lock file.
    pub fn update(&self) -> Result<Environment, ResolveError> {
        let mut tools = BTreeMap::new();
        for (role, request) in self.requests() {
            let tool = self.resolve_fresh(role, &request)?;
            info!(role, reference = %tool.reference, "resolved {}", tool.name);
            tools.insert(role.to_string(), tool);
        }

        let environment = Environment { tools };

        let root = self.descriptor.root().canonicalize().ok();
        let mut lock = LockFile::new(self.descriptor.name());
        for (role, tool) in environment.tools() {
            lock.insert(role, tool.to_locked(root.as_deref()));
        }
        lock.save(&self.descriptor.lock_path())?;

        Ok(environment)
    }

    fn requests(&self) -> Vec<(&'static str, ToolRequest)> {
        match self.descriptor.generator() {
            GeneratorSpec::Builtin => vec![(GENERATOR_ROLE, ToolRequest::Builtin)],
            GeneratorSpec::Executable(name) => vec![
                (GENERATOR_ROLE, ToolRequest::Executable(name)),
                (
                    SHELL_ROLE,
                    ToolRequest::Executable(self.descriptor.toolchain.shell.trim().to_string()),
                ),
            ],
        }
    }

    fn resolve_fresh(&self, role: &str, request: &ToolRequest) -> Result<ResolvedTool, ResolveError> {
        match request {
            ToolRequest::Builtin => Ok(ResolvedTool {
                kind: ToolKind::Builtin,
                name: folio_site::GENERATOR.to_string(),
                location: None,
                reference: builtin_reference(),
            }),
            ToolRequest::Executable(name) => {
                let location = self.locate(name).ok_or_else(|| ResolveError::NotFound {
                    role: role.to_string(),
                    name: name.clone(),
                })?;
                let reference = reference_of(role, &location)?;
                Ok(ResolvedTool {
                    kind: ToolKind::Executable,
                    name: name.clone(),
                    location: Some(location),
                    reference,
                })
            }
        }
    }

    fn resolve_pinned(&self, lock: &LockFile) -> Result<Environment, ResolveError> {
        if lock.package != self.descriptor.name() {
            return Err(ResolveError::PackageMismatch {
                locked: lock.package.clone(),
                declared: self.descriptor.name().to_string(),
            });
        }

        let mut tools = BTreeMap::new();
        for (role, request) in self.requests() {
            let pinned = lock.get(role).ok_or_else(|| ResolveError::Unpinned {
                role: role.to_string(),
            })?;
            let tool = self.verify_pin(role, &request, pinned)?;
            debug!(role, reference = %tool.reference, "pin verified");
            tools.insert(role.to_string(), tool);
        }

        Ok(Environment { tools })
    }

    fn verify_pin(
        &self,
        role: &str,
        request: &ToolRequest,
        pinned: &LockedTool,
    ) -> Result<ResolvedTool, ResolveError> {
        let mismatch = |pinned: &str, actual: &str| ResolveError::Mismatch {
            role: role.to_string(),
            pinned: pinned.to_string(),
            actual: actual.to_string(),
        };

        match request {
            ToolRequest::Builtin => {
                if pinned.kind != ToolKind::Builtin {
                    return Err(mismatch(&pinned.name, folio_site::GENERATOR));
                }
                let actual = builtin_reference();
                if actual != pinned.reference {
                    return Err(mismatch(&pinned.reference, &actual));
                }
                Ok(ResolvedTool {
                    kind: ToolKind::Builtin,
                    name: pinned.name.clone(),
                    location: None,
                    reference: actual,
                })
            }
            ToolRequest::Executable(name) => {
                if pinned.kind != ToolKind::Executable || &pinned.name != name {
                    return Err(mismatch(&pinned.name, name));
                }
                // Found again by name; only the content reference must match
                let location = self.locate(name).ok_or_else(|| ResolveError::Unreachable {
                    role: role.to_string(),
                    location: pinned.location.clone().unwrap_or_else(|| name.clone()),
                })?;
                let actual = reference_of(role, &location)?;
                if actual != pinned.reference {
                    return Err(mismatch(&pinned.reference, &actual));
                }
                Ok(ResolvedTool {
                    kind: ToolKind::Executable,
                    name: name.clone(),
                    location: Some(location),
                    reference: actual,
                })
            }
        }
    }

    /// Find an executable by path (relative to the descriptor) or on PATH.
    fn locate(&self, name: &str) -> Option<PathBuf> {
        let candidate = Path::new(name);
        let found = if candidate.components().count() > 1 || candidate.is_absolute() {
            let path = self.descriptor.root().join(candidate);
            is_executable(&path).then_some(path)
        } else {
            env::var_os("PATH").and_then(|paths| {
                env::split_paths(&paths)
                    .map(|dir| dir.join(name))
                    .find(|path| is_executable(path))
            })
        };

        found?.canonicalize().ok()
    }
}

fn reference_of(role: &str, path: &Path) -> Result<String, ResolveError> {
    hash_file(path)
        .map(|hash| hash.to_reference())
        .map_err(|source| ResolveError::Hash {
            role: role.to_string(),
            source,
        })
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn builtin_descriptor(root: &Path) -> Descriptor {
        Descriptor::parse("[package]\nname = \"blog\"\n", root).unwrap()
    }

    #[cfg(unix)]
    fn script(path: &Path, body: &str) {
        use std::os::unix::fs::PermissionsExt;
        fs::write(path, body).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn builtin_resolution_writes_lock() {
        let temp = tempdir().unwrap();
        let descriptor = builtin_descriptor(temp.path());

        let environment = Resolver::new(&descriptor).resolve().unwrap();

        let generator = environment.get(GENERATOR_ROLE).unwrap();
        assert_eq!(generator.kind, ToolKind::Builtin);
        assert_eq!(generator.reference, builtin_reference());
        assert!(environment.get(SHELL_ROLE).is_none());

        let lock = LockFile::load(&descriptor.lock_path()).unwrap().unwrap();
        assert_eq!(lock.package, "blog");
        assert_eq!(lock.get(GENERATOR_ROLE).unwrap().reference, generator.reference);
    }

    #[test]
    fn resolution_is_deterministic() {
        let temp = tempdir().unwrap();
        let descriptor = builtin_descriptor(temp.path());

        let first = Resolver::new(&descriptor).resolve().unwrap();
        let second = Resolver::new(&descriptor).resolve().unwrap();

        assert_eq!(first, second);
        assert_eq!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn tampered_pin_fails() {
        let temp = tempdir().unwrap();
        let descriptor = builtin_descriptor(temp.path());
        Resolver::new(&descriptor).resolve().unwrap();

        let mut lock = LockFile::load(&descriptor.lock_path()).unwrap().unwrap();
        lock.tools.get_mut(GENERATOR_ROLE).unwrap().reference = "sha256:0000".to_string();
        lock.save(&descriptor.lock_path()).unwrap();

        let result = Resolver::new(&descriptor).resolve();

        assert!(matches!(result, Err(ResolveError::Mismatch { .. })));
    }

    #[test]
    fn corrupt_lock_fails() {
        let temp = tempdir().unwrap();
        let descriptor = builtin_descriptor(temp.path());
        fs::write(descriptor.lock_path(), "{ not json").unwrap();

        let result = Resolver::new(&descriptor).resolve();

        assert!(matches!(result, Err(ResolveError::Lock(LockError::Parse(_)))));
    }

    #[test]
    fn lock_for_other_package_fails() {
        let temp = tempdir().unwrap();
        LockFile::new("other").save(&temp.path().join("folio.lock")).unwrap();
        let descriptor = builtin_descriptor(temp.path());

        let result = Resolver::new(&descriptor).resolve();

        assert!(matches!(result, Err(ResolveError::PackageMismatch { .. })));
    }

    #[test]
    fn missing_pin_fails() {
        let temp = tempdir().unwrap();
        LockFile::new("blog").save(&temp.path().join("folio.lock")).unwrap();
        let descriptor = builtin_descriptor(temp.path());

        let result = Resolver::new(&descriptor).resolve();

        assert!(matches!(result, Err(ResolveError::Unpinned { ref role }) if role == GENERATOR_ROLE));
    }

    #[test]
    fn update_replaces_stale_pins() {
        let temp = tempdir().unwrap();
        let descriptor = builtin_descriptor(temp.path());
        let mut lock = LockFile::new("blog");
        lock.insert(
            GENERATOR_ROLE,
            LockedTool {
                kind: ToolKind::Builtin,
                name: "folio-site 0.0.0".to_string(),
                location: None,
                reference: "sha256:old".to_string(),
            },
        );
        lock.save(&descriptor.lock_path()).unwrap();

        Resolver::new(&descriptor).update().unwrap();
        let environment = Resolver::new(&descriptor).resolve().unwrap();

        assert_eq!(environment.get(GENERATOR_ROLE).unwrap().reference, builtin_reference());
    }

    #[test]
    fn unknown_executable_fails() {
        let temp = tempdir().unwrap();
        let descriptor = Descriptor::parse(
            "[package]\nname = \"blog\"\n[toolchain]\ngenerator = \"./bin/missing-generator\"\n[build]\ncommand = \"true\"\n",
            temp.path(),
        )
        .unwrap();

        let result = Resolver::new(&descriptor).resolve();

        assert!(matches!(result, Err(ResolveError::NotFound { .. })));
        assert!(!descriptor.lock_path().exists());
    }

    #[cfg(unix)]
    #[test]
    fn lock_survives_moving_the_package() {
        let temp = tempdir().unwrap();
        let before = temp.path().join("checkout-a");
        fs::create_dir_all(before.join("bin")).unwrap();
        script(&before.join("bin/gen"), "#!/bin/sh\nmkdir -p \"$out\"\n");
        let text = "[package]\nname = \"blog\"\n[toolchain]\ngenerator = \"bin/gen\"\nshell = \"/bin/sh\"\n[build]\ncommand = '\"$generator\"'\n";

        let descriptor = Descriptor::parse(text, &before).unwrap();
        let pinned = Resolver::new(&descriptor).resolve().unwrap();
        let lock = LockFile::load(&descriptor.lock_path()).unwrap().unwrap();
        assert_eq!(lock.get(GENERATOR_ROLE).unwrap().location.as_deref(), Some("bin/gen"));

        let after = temp.path().join("checkout-b");
        fs::rename(&before, &after).unwrap();
        let descriptor = Descriptor::parse(text, &after).unwrap();
        let moved = Resolver::new(&descriptor).resolve().unwrap();

        assert_eq!(moved.fingerprint(), pinned.fingerprint());
        let generator = moved.get(GENERATOR_ROLE).unwrap();
        assert_eq!(
            generator.location.as_deref(),
            Some(after.join("bin/gen").canonicalize().unwrap().as_path())
        );
    }

    #[cfg(unix)]
    #[test]
    fn executable_is_pinned_by_content() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("bin")).unwrap();
        let generator = temp.path().join("bin/gen");
        script(&generator, "#!/bin/sh\nmkdir -p \"$out\"\n");

        let descriptor = Descriptor::parse(
            "[package]\nname = \"blog\"\n[toolchain]\ngenerator = \"bin/gen\"\nshell = \"/bin/sh\"\n[build]\ncommand = '\"$generator\"'\n",
            temp.path(),
        )
        .unwrap();

        let environment = Resolver::new(&descriptor).resolve().unwrap();
        let tool = environment.get(GENERATOR_ROLE).unwrap();
        assert_eq!(tool.kind, ToolKind::Executable);
        assert_eq!(tool.location.as_deref(), Some(generator.canonicalize().unwrap().as_path()));
        assert!(environment.get(SHELL_ROLE).is_some());

        // Changing the binary breaks the pin
        script(&generator, "#!/bin/sh\necho changed\n");
        let result = Resolver::new(&descriptor).resolve();
        assert!(matches!(result, Err(ResolveError::Mismatch { .. })));

        // Removing it makes the pin unreachable
        fs::remove_file(&generator).unwrap();
        let result = Resolver::new(&descriptor).resolve();
        assert!(matches!(result, Err(ResolveError::Unreachable { .. })));
    }
}
