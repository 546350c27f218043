//! Build invocation.
//!
//! Runs the resolved site generator against the content source tree and
//! leaves a fresh output directory at the descriptor's build location.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::descriptor::{Descriptor, GeneratorSpec};
use crate::resolve::{Environment, GENERATOR_ROLE, SHELL_ROLE};

/// 1980-01-01T00:00:00Z, the ZIP epoch.
const SOURCE_DATE_EPOCH: &str = "315532800";

/// What a generator run reported.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateReport {
    /// Pages rendered, when the generator reports it
    pub pages: Option<usize>,
    /// Drafts skipped, when the generator reports it
    pub drafts: Option<usize>,
}

/// A site generator that renders the content tree into a directory.
pub trait Generator {
    /// Name for logs.
    fn name(&self) -> &str;

    /// Render the site into `output_dir`, which does not exist yet.
    fn generate(&self, output_dir: &Path) -> Result<GenerateReport, InvokeError>;
}

/// The generator compiled into this binary.
pub struct BuiltinGenerator {
    config: folio_site::BuildConfig,
}

impl BuiltinGenerator {
    pub fn new(config: folio_site::BuildConfig) -> Self {
        Self { config }
    }
}

impl Generator for BuiltinGenerator {
    fn name(&self) -> &str {
        folio_site::GENERATOR
    }

    fn generate(&self, output_dir: &Path) -> Result<GenerateReport, InvokeError> {
        let config = folio_site::BuildConfig {
            output_dir: output_dir.to_path_buf(),
            ..self.config.clone()
        };
        let result = folio_site::StaticBuilder::new(config).build()?;
        Ok(GenerateReport {
            pages: Some(result.pages),
            drafts: Some(result.drafts),
        })
    }
}

/// An external generator driven through a shell command.
///
/// The command runs in the source tree with a cleared environment. It sees
/// `$out` (where to write), `$src` (the source tree), `$generator` (the
/// pinned generator executable) and `$FOLIO_INCLUDE_DRAFTS` (`0` or `1`).
pub struct CommandGenerator {
    pub shell: PathBuf,
    pub generator: PathBuf,
    pub command: String,
    pub source_dir: PathBuf,
    pub include_drafts: bool,
}

impl Generator for CommandGenerator {
    fn name(&self) -> &str {
        &self.command
    }

    fn generate(&self, output_dir: &Path) -> Result<GenerateReport, InvokeError> {
        let output_dir = absolute(output_dir)?;
        let source_dir = absolute(&self.source_dir)?;

        let tmp_dir = scratch_dir(&output_dir);
        fs::create_dir_all(&tmp_dir).map_err(|source| InvokeError::Prepare {
            path: tmp_dir.display().to_string(),
            source,
        })?;

        let search_path = env::join_paths(
            [self.generator.parent(), self.shell.parent()]
                .into_iter()
                .flatten(),
        )
        .map_err(|e| InvokeError::Prepare {
            path: "PATH".to_string(),
            source: io::Error::new(io::ErrorKind::InvalidInput, e),
        })?;

        let mut command = Command::new(&self.shell);
        command
            .arg("-c")
            .arg(&self.command)
            .current_dir(&source_dir)
            .env_clear()
            .env("PATH", search_path)
            .env("HOME", "/homeless-shelter")
            .env("TMPDIR", &tmp_dir)
            .env("LANG", "C")
            .env("LC_ALL", "C")
            .env("TZ", "UTC")
            .env("SOURCE_DATE_EPOCH", SOURCE_DATE_EPOCH)
            .env("out", &output_dir)
            .env("src", &source_dir)
            .env("generator", &self.generator)
            .env(
                "FOLIO_INCLUDE_DRAFTS",
                if self.include_drafts { "1" } else { "0" },
            );

        debug!(shell = %self.shell.display(), cwd = %source_dir.display(), "spawning generator");

        let output = command.output().map_err(|source| InvokeError::Spawn {
            command: self.command.clone(),
            source,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!(stdout = %stdout.trim(), "generator output");
        }

        if !output.status.success() {
            return Err(InvokeError::GeneratorFailed {
                command: self.command.clone(),
                code: output.status.code(),
                diagnostics: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(GenerateReport::default())
    }
}

/// A finished build.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    /// Generated output directory
    pub dir: PathBuf,
    pub report: GenerateReport,
}

/// Errors that can occur while building.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("source tree not found: {0}")]
    MissingSource(String),

    #[error("{0} missing from the resolved environment")]
    MissingTool(String),

    #[error("failed to prepare {path}: {source}")]
    Prepare {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Site(#[from] folio_site::BuildError),

    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` failed with {}:\n{diagnostics}", exit_status(.code))]
    GeneratorFailed {
        command: String,
        code: Option<i32>,
        diagnostics: String,
    },

    #[error("generator finished without producing {0}")]
    NoOutput(String),
}

fn exit_status(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "a signal".to_string(),
    }
}

/// Runs the build phase of a package.
pub struct Invoker<'a> {
    descriptor: &'a Descriptor,
    environment: &'a Environment,
}

impl<'a> Invoker<'a> {
    pub fn new(descriptor: &'a Descriptor, environment: &'a Environment) -> Self {
        Self {
            descriptor,
            environment,
        }
    }

    /// The generator selected by the descriptor, bound to its pinned tools.
    pub fn generator(&self) -> Result<Box<dyn Generator>, InvokeError> {
        match self.descriptor.generator() {
            GeneratorSpec::Builtin => Ok(Box::new(BuiltinGenerator::new(
                self.descriptor.site_config(&self.descriptor.output_dir()),
            ))),
            GeneratorSpec::Executable(_) => {
                let generator = self.tool_location(GENERATOR_ROLE)?;
                let shell = self.tool_location(SHELL_ROLE)?;
                Ok(Box::new(CommandGenerator {
                    shell,
                    generator,
                    command: self.descriptor.build.command.clone().unwrap_or_default(),
                    source_dir: self.descriptor.source_dir(),
                    include_drafts: self.descriptor.site.include_drafts,
                }))
            }
        }
    }

    fn tool_location(&self, role: &str) -> Result<PathBuf, InvokeError> {
        self.environment
            .get(role)
            .and_then(|tool| tool.location.clone())
            .ok_or_else(|| InvokeError::MissingTool(role.to_string()))
    }

    /// Wipe the build-local output directory and regenerate it.
    pub fn run(&self) -> Result<BuildOutput, InvokeError> {
        let source_dir = self.descriptor.source_dir();
        if !source_dir.is_dir() {
            return Err(InvokeError::MissingSource(source_dir.display().to_string()));
        }

        let output_dir = self.descriptor.output_dir();
        let tmp_dir = scratch_dir(&output_dir);
        clean(&output_dir)?;
        clean(&tmp_dir)?;

        let generator = self.generator()?;
        info!("Generating {} with {}", self.descriptor.name(), generator.name());
        let result = generator.generate(&output_dir);
        clean(&tmp_dir)?;
        let report = result?;

        if !output_dir.is_dir() {
            return Err(InvokeError::NoOutput(output_dir.display().to_string()));
        }

        Ok(BuildOutput {
            dir: output_dir,
            report,
        })
    }
}

/// Scratch directory handed to external generators as `TMPDIR`:
/// `<build dir>.tmp`, next to the output directory.
pub(crate) fn scratch_dir(output_dir: &Path) -> PathBuf {
    let mut name = output_dir
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "out".into());
    name.push(".tmp");
    output_dir.with_file_name(name)
}

/// Remove a previous directory and make sure its parent exists.
fn clean(dir: &Path) -> Result<(), InvokeError> {
    let prepare_error = |source| InvokeError::Prepare {
        path: dir.display().to_string(),
        source,
    };

    match fs::remove_dir_all(dir) {
        Ok(()) => debug!("removed previous {}", dir.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(prepare_error(e)),
    }

    if let Some(parent) = dir.parent() {
        fs::create_dir_all(parent).map_err(prepare_error)?;
    }

    Ok(())
}

fn absolute(path: &Path) -> Result<PathBuf, InvokeError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    env::current_dir()
        .map(|cwd| cwd.join(path))
        .map_err(|source| InvokeError::Prepare {
            path: path.display().to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::Resolver;
    use tempfile::tempdir;

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn builtin_build_replaces_previous_output() {
        let temp = tempdir().unwrap();
        let descriptor = Descriptor::parse("[package]\nname = \"blog\"\n", temp.path()).unwrap();
        write(temp.path(), "content/hello.md", "---\ntitle: Hello\n---\nHi\n");
        write(temp.path(), ".folio/out/stale.html", "old");

        let environment = Resolver::new(&descriptor).resolve().unwrap();
        let output = Invoker::new(&descriptor, &environment).run().unwrap();

        assert_eq!(output.report.pages, Some(1));
        assert!(output.dir.join("hello/index.html").exists());
        assert!(!output.dir.join("stale.html").exists());
    }

    #[test]
    fn parse_failure_is_a_build_error() {
        let temp = tempdir().unwrap();
        let descriptor = Descriptor::parse("[package]\nname = \"blog\"\n", temp.path()).unwrap();
        write(temp.path(), "content/bad.md", "---\ntitle: [\n---\n");

        let environment = Resolver::new(&descriptor).resolve().unwrap();
        let result = Invoker::new(&descriptor, &environment).run();

        assert!(matches!(
            result,
            Err(InvokeError::Site(folio_site::BuildError::ParseError { .. }))
        ));
    }

    #[test]
    fn scratch_dir_sits_next_to_output() {
        assert_eq!(
            scratch_dir(Path::new("/srv/blog/.folio/out")),
            PathBuf::from("/srv/blog/.folio/out.tmp")
        );
        assert_eq!(scratch_dir(Path::new("build")), PathBuf::from("build.tmp"));
    }

    #[test]
    fn missing_source_fails() {
        let temp = tempdir().unwrap();
        let descriptor = Descriptor::parse(
            "[package]\nname = \"blog\"\nsource = \"nowhere\"\n",
            temp.path(),
        )
        .unwrap();

        let environment = Resolver::new(&descriptor).resolve().unwrap();
        let result = Invoker::new(&descriptor, &environment).run();

        assert!(matches!(result, Err(InvokeError::MissingSource(_))));
    }

    #[cfg(unix)]
    mod external {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        fn descriptor(root: &Path, generator: &str, command: &str) -> Descriptor {
            let path = root.join("bin/gen");
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, generator).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            fs::create_dir_all(root.join("content")).unwrap();

            Descriptor::parse(
                &format!(
                    "[package]\nname = \"blog\"\n[toolchain]\ngenerator = \"bin/gen\"\nshell = \"/bin/sh\"\n[build]\ncommand = '{}'\n",
                    command
                ),
                root,
            )
            .unwrap()
        }

        fn run(descriptor: &Descriptor) -> Result<BuildOutput, InvokeError> {
            let environment = Resolver::new(descriptor).resolve().unwrap();
            Invoker::new(descriptor, &environment).run()
        }

        #[test]
        fn runs_in_isolated_environment() {
            let temp = tempdir().unwrap();
            let descriptor = descriptor(
                temp.path(),
                "#!/bin/sh\nmkdir -p \"$1\"\necho \"$HOME $SOURCE_DATE_EPOCH $FOLIO_INCLUDE_DRAFTS\" > \"$1/env.txt\"\n",
                r#""$generator" "$out""#,
            );

            let output = run(&descriptor).unwrap();

            let env = fs::read_to_string(output.dir.join("env.txt")).unwrap();
            assert_eq!(env.trim(), "/homeless-shelter 315532800 0");
        }

        #[test]
        fn scratch_dir_starts_empty_every_build() {
            let temp = tempdir().unwrap();
            let root = temp.path();
            let path = root.join("bin/gen");
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(
                &path,
                "#!/bin/sh\nmkdir -p \"$1\"\nif [ -e \"$TMPDIR/state\" ]; then echo stale > \"$1/run\"; else echo fresh > \"$1/run\"; fi\ntouch \"$TMPDIR/state\"\n",
            )
            .unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            let descriptor = Descriptor::parse(
                "[package]\nname = \"blog\"\n[toolchain]\ngenerator = \"bin/gen\"\nshell = \"/bin/sh\"\n[build]\ncommand = '\"$generator\" \"$out\"'\ndir = \"build\"\n",
                root,
            )
            .unwrap();

            for _ in 0..2 {
                let output = run(&descriptor).unwrap();
                let marker = fs::read_to_string(output.dir.join("run")).unwrap();
                assert_eq!(marker.trim(), "fresh");
            }

            assert!(!root.join("tmp").exists());
            assert!(!root.join("build.tmp").exists());
        }

        #[test]
        fn unusable_search_path_is_an_error() {
            let temp = tempdir().unwrap();
            let generator = CommandGenerator {
                shell: PathBuf::from("/bin/sh"),
                generator: temp.path().join("odd:dir/gen"),
                command: "true".to_string(),
                source_dir: temp.path().to_path_buf(),
                include_drafts: false,
            };

            let err = generator.generate(&temp.path().join("out")).unwrap_err();

            assert!(matches!(err, InvokeError::Prepare { ref path, .. } if path == "PATH"));
        }

        #[test]
        fn failure_carries_diagnostics() {
            let temp = tempdir().unwrap();
            let descriptor = descriptor(
                temp.path(),
                "#!/bin/sh\necho 'content/post.md: bad front matter' >&2\nexit 3\n",
                r#""$generator""#,
            );

            let err = run(&descriptor).unwrap_err();

            match err {
                InvokeError::GeneratorFailed {
                    code, diagnostics, ..
                } => {
                    assert_eq!(code, Some(3));
                    assert_eq!(diagnostics, "content/post.md: bad front matter");
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        #[test]
        fn success_without_output_is_an_error() {
            let temp = tempdir().unwrap();
            let descriptor = descriptor(temp.path(), "#!/bin/sh\nexit 0\n", r#""$generator""#);

            let err = run(&descriptor).unwrap_err();

            assert!(matches!(err, InvokeError::NoOutput(_)));
        }
    }
}
