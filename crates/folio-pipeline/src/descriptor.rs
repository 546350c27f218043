//! Package derivation descriptor (`folio.toml`).
//!
//! The descriptor names the package, its source tree, the toolchain that
//! builds it, where the build writes and where the result is installed.
//! Relative paths are resolved against the directory holding the descriptor.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Descriptor file name.
pub const DESCRIPTOR_FILENAME: &str = "folio.toml";

/// Generator name selecting the in-process generator.
pub const BUILTIN_GENERATOR: &str = "builtin";

/// A parsed package derivation descriptor.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Descriptor {
    pub package: PackageSection,

    #[serde(default)]
    pub toolchain: ToolchainSection,

    #[serde(default)]
    pub build: BuildSection,

    #[serde(default)]
    pub install: InstallSection,

    #[serde(default)]
    pub site: SiteSection,

    /// Directory the descriptor was loaded from
    #[serde(skip)]
    root: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PackageSection {
    /// Package name
    pub name: String,

    /// Root of the content source tree
    #[serde(default = "default_source")]
    pub source: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ToolchainSection {
    /// `builtin`, a program name looked up on PATH, or a path
    #[serde(default = "default_generator")]
    pub generator: String,

    /// Shell running external build commands
    #[serde(default = "default_shell")]
    pub shell: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    /// Shell command running an external generator
    #[serde(default)]
    pub command: Option<String>,

    /// Build-local output directory
    #[serde(default = "default_build_dir")]
    pub dir: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InstallSection {
    /// Final location of the built site
    #[serde(default = "default_dest")]
    pub dest: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SiteSection {
    /// Site title, defaults to the package name
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Relative to the source root
    #[serde(default = "default_content_dir")]
    pub content_dir: String,

    /// Relative to the source root
    #[serde(default = "default_static_dir")]
    pub static_dir: String,

    /// Relative to the source root
    #[serde(default = "default_layouts_dir")]
    pub layouts_dir: String,

    /// Render drafts too (preview builds)
    #[serde(default)]
    pub include_drafts: bool,

    #[serde(default = "default_minify")]
    pub minify: bool,
}

fn default_source() -> String {
    ".".to_string()
}
fn default_generator() -> String {
    BUILTIN_GENERATOR.to_string()
}
fn default_shell() -> String {
    "sh".to_string()
}
fn default_build_dir() -> String {
    ".folio/out".to_string()
}
fn default_dest() -> String {
    "result".to_string()
}
fn default_base_url() -> String {
    "/".to_string()
}
fn default_content_dir() -> String {
    "content".to_string()
}
fn default_static_dir() -> String {
    "static".to_string()
}
fn default_layouts_dir() -> String {
    "layouts".to_string()
}
fn default_minify() -> bool {
    true
}

impl Default for ToolchainSection {
    fn default() -> Self {
        Self {
            generator: default_generator(),
            shell: default_shell(),
        }
    }
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            command: None,
            dir: default_build_dir(),
        }
    }
}

impl Default for InstallSection {
    fn default() -> Self {
        Self {
            dest: default_dest(),
        }
    }
}

impl Default for SiteSection {
    fn default() -> Self {
        Self {
            title: None,
            description: String::new(),
            base_url: default_base_url(),
            content_dir: default_content_dir(),
            static_dir: default_static_dir(),
            layouts_dir: default_layouts_dir(),
            include_drafts: false,
            minify: default_minify(),
        }
    }
}

/// Which generator builds the site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratorSpec {
    /// The generator compiled into this binary
    Builtin,
    /// An external executable, by name or path
    Executable(String),
}

/// Errors that can occur when loading a descriptor.
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    #[error("descriptor not found: {0}")]
    NotFound(String),

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("invalid descriptor: {0}")]
    Invalid(String),
}

impl Descriptor {
    /// Load and validate a descriptor file.
    pub fn load(path: &Path) -> Result<Self, DescriptorError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(DescriptorError::NotFound(path.display().to_string()));
            }
            Err(source) => {
                return Err(DescriptorError::Read {
                    path: path.display().to_string(),
                    source,
                });
            }
        };

        let root = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        Self::parse(&content, root).map_err(|e| match e {
            DescriptorError::Parse { message, .. } => DescriptorError::Parse {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    /// Parse and validate descriptor text with paths relative to `root`.
    pub fn parse(content: &str, root: impl Into<PathBuf>) -> Result<Self, DescriptorError> {
        let mut descriptor: Descriptor =
            toml::from_str(content).map_err(|e| DescriptorError::Parse {
                path: DESCRIPTOR_FILENAME.to_string(),
                message: e.to_string(),
            })?;
        descriptor.root = root.into();
        descriptor.validate()?;
        Ok(descriptor)
    }

    fn validate(&self) -> Result<(), DescriptorError> {
        if self.package.name.trim().is_empty() {
            return Err(DescriptorError::Invalid(
                "package.name must not be empty".to_string(),
            ));
        }

        if self.toolchain.generator.trim().is_empty() {
            return Err(DescriptorError::Invalid(
                "toolchain.generator must not be empty".to_string(),
            ));
        }

        if let GeneratorSpec::Executable(_) = self.generator() {
            let has_command = self
                .build
                .command
                .as_deref()
                .is_some_and(|c| !c.trim().is_empty());
            if !has_command {
                return Err(DescriptorError::Invalid(
                    "build.command is required for an external generator".to_string(),
                ));
            }
            if self.toolchain.shell.trim().is_empty() {
                return Err(DescriptorError::Invalid(
                    "toolchain.shell must not be empty".to_string(),
                ));
            }
        }

        let source = normalize(&self.source_dir());
        let output = normalize(&self.output_dir());
        let dest = normalize(&self.install_dir());

        if output.starts_with(&dest) || dest.starts_with(&output) {
            return Err(DescriptorError::Invalid(format!(
                "install.dest ({}) and build.dir ({}) must not contain each other",
                self.install.dest, self.build.dir
            )));
        }

        if source.starts_with(&dest) {
            return Err(DescriptorError::Invalid(format!(
                "install.dest ({}) must not contain the source tree",
                self.install.dest
            )));
        }

        Ok(())
    }

    /// Directory holding the descriptor.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn name(&self) -> &str {
        &self.package.name
    }

    /// Root of the content source tree.
    pub fn source_dir(&self) -> PathBuf {
        self.root.join(&self.package.source)
    }

    /// Build-local output directory.
    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.build.dir)
    }

    /// Install destination.
    pub fn install_dir(&self) -> PathBuf {
        self.root.join(&self.install.dest)
    }

    /// Lock file next to the descriptor.
    pub fn lock_path(&self) -> PathBuf {
        self.root.join(crate::lock::LOCK_FILENAME)
    }

    pub fn generator(&self) -> GeneratorSpec {
        let generator = self.toolchain.generator.trim();
        if generator == BUILTIN_GENERATOR {
            GeneratorSpec::Builtin
        } else {
            GeneratorSpec::Executable(generator.to_string())
        }
    }

    /// Configuration for the built-in generator writing to `output_dir`.
    pub fn site_config(&self, output_dir: &Path) -> folio_site::BuildConfig {
        let source = self.source_dir();
        folio_site::BuildConfig {
            content_dir: source.join(&self.site.content_dir),
            static_dir: Some(source.join(&self.site.static_dir)),
            layouts_dir: Some(source.join(&self.site.layouts_dir)),
            output_dir: output_dir.to_path_buf(),
            minify: self.site.minify,
            base_url: self.site.base_url.clone(),
            title: self
                .site
                .title
                .clone()
                .unwrap_or_else(|| self.package.name.clone()),
            description: self.site.description.clone(),
            include_drafts: self.site.include_drafts,
        }
    }
}

/// Resolve `.` and `..` lexically; the paths may not exist yet.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
