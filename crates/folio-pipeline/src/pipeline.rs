//! The resolve, build, install pipeline.

use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

use tracing::{error, info};

use crate::descriptor::{Descriptor, DescriptorError};
use crate::hash::ContentHash;
use crate::install::{InstallError, Installer};
use crate::invoke::{InvokeError, Invoker};
use crate::resolve::{ResolveError, Resolver};

/// Where a pipeline run is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    Resolving,
    Building,
    Installing,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::Resolving => "resolving",
            Stage::Building => "building",
            Stage::Installing => "installing",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Errors from any stage of the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error("environment resolution failed: {0}")]
    Resolve(#[from] ResolveError),

    #[error("build failed: {0}")]
    Invoke(#[from] InvokeError),

    #[error("install failed: {0}")]
    Install(#[from] InstallError),

    #[error("pipeline already ran (stage: {0})")]
    AlreadyRan(Stage),
}

/// Summary of a successful run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub package: String,
    /// Combined reference of the resolved toolchain
    pub environment: String,
    /// Pages rendered, when the generator reports it
    pub pages: Option<usize>,
    pub drafts: Option<usize>,
    pub dest: PathBuf,
    pub files: usize,
    /// Hash of the installed tree
    pub hash: ContentHash,
    pub duration_ms: u64,
}

/// One build of one package.
pub struct Pipeline {
    descriptor: Descriptor,
    stage: Stage,
}

impl Pipeline {
    pub fn new(descriptor: Descriptor) -> Self {
        Self {
            descriptor,
            stage: Stage::Start,
        }
    }

    /// Load the descriptor at `path` and create a pipeline for it.
    pub fn load(path: &std::path::Path) -> Result<Self, PipelineError> {
        Ok(Self::new(Descriptor::load(path)?))
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Run every stage in order. A pipeline runs at most once.
    pub fn run(&mut self) -> Result<PipelineReport, PipelineError> {
        if self.stage != Stage::Start {
            return Err(PipelineError::AlreadyRan(self.stage));
        }

        let start = Instant::now();
        let result = self.run_stages();

        match &result {
            Ok(_) => self.transition(Stage::Done),
            Err(e) => {
                error!(stage = %self.stage, "{}", e);
                self.transition(Stage::Failed);
            }
        }

        result.map(|mut report| {
            report.duration_ms = start.elapsed().as_millis() as u64;
            report
        })
    }

    fn run_stages(&mut self) -> Result<PipelineReport, PipelineError> {
        self.transition(Stage::Resolving);
        let environment = Resolver::new(&self.descriptor).resolve()?;

        self.transition(Stage::Building);
        let output = Invoker::new(&self.descriptor, &environment).run()?;

        self.transition(Stage::Installing);
        let install = Installer::new(self.descriptor.install_dir()).install(&output.dir)?;

        Ok(PipelineReport {
            package: self.descriptor.name().to_string(),
            environment: environment.fingerprint(),
            pages: output.report.pages,
            drafts: output.report.drafts,
            dest: install.dest,
            files: install.files,
            hash: install.hash,
            duration_ms: 0,
        })
    }

    fn transition(&mut self, next: Stage) {
        info!(package = %self.descriptor.name(), "{} -> {}", self.stage, next);
        self.stage = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_directory;
    use std::collections::BTreeSet;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;
    use walkdir::WalkDir;

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn package(root: &Path) -> Pipeline {
        write(root, "folio.toml", "[package]\nname = \"blog\"\n");
        Pipeline::load(&root.join("folio.toml")).unwrap()
    }

    fn files(root: &Path) -> BTreeSet<String> {
        WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                e.path()
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    #[test]
    fn builds_and_installs() {
        let temp = tempdir().unwrap();
        write(
            temp.path(),
            "content/first-post.md",
            "---\ntitle: First Post\ndate: 2024-03-01\ntags: [rust]\n---\n\nHello.\n",
        );
        let mut pipeline = package(temp.path());

        let report = pipeline.run().unwrap();

        assert_eq!(pipeline.stage(), Stage::Done);
        assert_eq!(report.package, "blog");
        assert_eq!(report.pages, Some(1));
        assert!(report.environment.starts_with("sha256:"));
        assert!(temp.path().join("result/first-post/index.html").is_file());
        assert!(temp.path().join("result/tags/rust/index.html").is_file());
        assert!(temp.path().join("folio.lock").is_file());
    }

    #[test]
    fn drafts_are_not_installed() {
        let temp = tempdir().unwrap();
        write(temp.path(), "content/public.md", "---\ntitle: Public\n---\nYes\n");
        write(
            temp.path(),
            "content/secret.md",
            "---\ntitle: Secret\ndraft: true\n---\nNo\n",
        );
        let mut pipeline = package(temp.path());

        let report = pipeline.run().unwrap();

        assert_eq!(report.drafts, Some(1));
        assert!(temp.path().join("result/public/index.html").exists());
        assert!(!temp.path().join("result/secret").exists());
        let index = fs::read_to_string(temp.path().join("result/index.html")).unwrap();
        assert!(!index.contains("Secret"));
    }

    #[test]
    fn malformed_header_fails_before_install() {
        let temp = tempdir().unwrap();
        write(temp.path(), "content/good.md", "---\ntitle: Good\n---\nFine\n");
        write(temp.path(), "content/broken.md", "---\ntitle: Broken\n");
        let mut pipeline = package(temp.path());

        let err = pipeline.run().unwrap_err();

        assert!(matches!(err, PipelineError::Invoke(_)));
        assert_eq!(pipeline.stage(), Stage::Failed);
        assert!(!temp.path().join("result").exists());
    }

    #[test]
    fn failed_build_keeps_previous_install() {
        let temp = tempdir().unwrap();
        write(temp.path(), "content/good.md", "---\ntitle: Good\n---\nFine\n");
        package(temp.path()).run().unwrap();

        write(temp.path(), "content/broken.md", "+++\ntitle = \n+++\n");
        let result = package(temp.path()).run();

        assert!(result.is_err());
        assert!(temp.path().join("result/good/index.html").exists());
    }

    #[test]
    fn runs_are_deterministic() {
        let temp = tempdir().unwrap();
        write(temp.path(), "content/a.md", "---\ntitle: A\ndate: 2024-01-02\n---\nA\n");
        write(temp.path(), "content/b.md", "---\ntitle: B\ndate: 2024-01-01\n---\nB\n");
        write(temp.path(), "static/robots-extra.txt", "hi");

        let first = package(temp.path()).run().unwrap();
        let second = package(temp.path()).run().unwrap();

        assert_eq!(first.hash, second.hash);
        assert_eq!(first.environment, second.environment);
        assert_eq!(first.hash, hash_directory(&temp.path().join("result")).unwrap());
    }

    #[test]
    fn identical_sources_build_identically() {
        let a = tempdir().unwrap();
        let b = tempdir().unwrap();
        for root in [a.path(), b.path()] {
            write(root, "content/post.md", "---\ntitle: Post\ntags: [x, y]\n---\nBody\n");
        }

        let first = package(a.path()).run().unwrap();
        let second = package(b.path()).run().unwrap();

        assert_eq!(first.hash, second.hash);
    }

    #[test]
    fn empty_tree_produces_scaffold_only() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("content")).unwrap();
        let mut pipeline = package(temp.path());

        let report = pipeline.run().unwrap();

        let expected: BTreeSet<String> = [
            "404.html",
            "assets/main.css",
            "index.html",
            "index.xml",
            "robots.txt",
            "search-index.json",
            "sitemap.xml",
            "tags/index.html",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        assert_eq!(files(&temp.path().join("result")), expected);
        assert_eq!(report.pages, Some(0));
        assert_eq!(report.files, expected.len());
    }

    #[test]
    fn reinstall_is_idempotent() {
        let temp = tempdir().unwrap();
        write(temp.path(), "content/post.md", "---\ntitle: Post\n---\nBody\n");
        package(temp.path()).run().unwrap();
        let before = files(&temp.path().join("result"));

        package(temp.path()).run().unwrap();

        assert_eq!(files(&temp.path().join("result")), before);
    }

    #[test]
    fn removed_post_leaves_no_stale_page() {
        let temp = tempdir().unwrap();
        write(temp.path(), "content/keep.md", "---\ntitle: Keep\n---\nA\n");
        write(temp.path(), "content/gone.md", "---\ntitle: Gone\n---\nB\n");
        package(temp.path()).run().unwrap();

        fs::remove_file(temp.path().join("content/gone.md")).unwrap();
        package(temp.path()).run().unwrap();

        assert!(temp.path().join("result/keep/index.html").exists());
        assert!(!temp.path().join("result/gone").exists());
    }

    #[test]
    fn resolution_failure_stops_before_build() {
        let temp = tempdir().unwrap();
        write(temp.path(), "content/post.md", "---\ntitle: Post\n---\nBody\n");
        write(temp.path(), "folio.lock", "not json");
        let mut pipeline = package(temp.path());

        let err = pipeline.run().unwrap_err();

        assert!(matches!(err, PipelineError::Resolve(_)));
        assert_eq!(pipeline.stage(), Stage::Failed);
        assert!(!temp.path().join(".folio/out").exists());
        assert!(!temp.path().join("result").exists());
    }

    #[test]
    fn pipeline_runs_once() {
        let temp = tempdir().unwrap();
        let mut pipeline = package(temp.path());
        pipeline.run().unwrap();

        let err = pipeline.run().unwrap_err();

        assert!(matches!(err, PipelineError::AlreadyRan(Stage::Done)));
    }

    #[test]
    fn missing_descriptor_is_an_error() {
        let temp = tempdir().unwrap();

        let result = Pipeline::load(&temp.path().join("folio.toml"));

        assert!(matches!(
            result,
            Err(PipelineError::Descriptor(DescriptorError::NotFound(_)))
        ));
    }
}
