//! Static site generator for folio packages.
//!
//! Builds a blog-style static site from markdown documents with metadata
//! headers. Output depends only on the content tree and this crate's version.

pub mod assets;
pub mod builder;
pub mod templates;

use sha2::{Digest, Sha256};

pub use builder::{BuildConfig, BuildError, BuildResult, StaticBuilder};

/// Name and version of the built-in generator.
pub const GENERATOR: &str = concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"));

/// Content hash identifying this exact generator build.
///
/// Covers the generator version, the built-in templates and the default
/// stylesheet, so any change to what the generator emits changes the hash.
pub fn fingerprint() -> String {
    let mut hasher = Sha256::new();
    hasher.update(GENERATOR.as_bytes());
    for (name, source) in templates::BUILTIN_TEMPLATES {
        hasher.update(b"\0");
        hasher.update(name.as_bytes());
        hasher.update(b"\0");
        hasher.update(source.as_bytes());
    }
    hasher.update(b"\0");
    hasher.update(assets::DEFAULT_CSS.as_bytes());
    hex::encode(hasher.finalize())
}
