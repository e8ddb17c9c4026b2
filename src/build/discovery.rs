//! Source file discovery for the build system.
//!
//! Resolves the glob selectors from the path table into concrete files.
//! A selector is a list of patterns; patterns starting with `!` exclude
//! matches. Each file remembers the directory its including pattern was
//! rooted at (the portion before the first wildcard) so outputs keep the
//! path relative to that base.

use glob::{MatchOptions, Pattern};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Error during source discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Invalid glob pattern
    #[error("Invalid glob pattern '{0}': {1}")]
    InvalidPattern(String, #[source] glob::PatternError),
    /// IO error during file enumeration
    #[error("IO error during discovery: {0}")]
    Io(#[from] std::io::Error),
}

const MATCH_OPTIONS: MatchOptions =
    MatchOptions { case_sensitive: true, require_literal_separator: true, require_literal_leading_dot: false };

/// A file selected by a [`SourceSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute path of the file
    pub path: PathBuf,
    /// Path relative to the glob base of the pattern that selected it
    pub relative: PathBuf,
}

#[derive(Debug, Clone)]
struct Include {
    raw: String,
    pattern: Pattern,
    base: PathBuf,
}

/// Compiled set of include/exclude glob patterns rooted at a project directory.
#[derive(Debug, Clone)]
pub struct SourceSet {
    root: PathBuf,
    includes: Vec<Include>,
    excludes: Vec<Pattern>,
}

impl SourceSet {
    /// Compile `patterns` relative to `root`.
    pub fn new(root: &Path, patterns: &[String]) -> Result<Self, DiscoveryError> {
        let mut includes = Vec::new();
        let mut excludes = Vec::new();

        for raw in patterns {
            let (negated, body) = match raw.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, raw.as_str()),
            };
            let body = body.trim_start_matches("./");
            let pattern =
                Pattern::new(body).map_err(|e| DiscoveryError::InvalidPattern(raw.clone(), e))?;
            if negated {
                excludes.push(pattern);
            } else {
                includes.push(Include { raw: body.to_string(), pattern, base: glob_base(body) });
            }
        }

        Ok(Self { root: root.to_path_buf(), includes, excludes })
    }

    /// The directory patterns are resolved against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Base directories of the include patterns, resolved against the root.
    pub fn bases(&self) -> Vec<PathBuf> {
        let mut bases: Vec<PathBuf> = self.includes.iter().map(|i| self.root.join(&i.base)).collect();
        bases.sort();
        bases.dedup();
        bases
    }

    /// Enumerate matching files, sorted and deduplicated.
    ///
    /// A pattern that matches nothing is not an error.
    pub fn files(&self) -> Result<Vec<SourceFile>, DiscoveryError> {
        let mut seen = HashSet::new();
        let mut files = Vec::new();
        let escaped_root = Pattern::escape(&self.root.to_string_lossy());

        for include in &self.includes {
            let full = format!("{}/{}", escaped_root.trim_end_matches('/'), include.raw);
            let paths = glob::glob_with(&full, MATCH_OPTIONS)
                .map_err(|e| DiscoveryError::InvalidPattern(include.raw.clone(), e))?;
            let base_dir = self.root.join(&include.base);

            for entry in paths {
                let path = match entry {
                    Ok(path) => path,
                    Err(e) => {
                        tracing::warn!("error reading path: {}", e);
                        continue;
                    }
                };
                if !path.is_file() || self.is_excluded(&path) || !seen.insert(path.clone()) {
                    continue;
                }
                let relative = path
                    .strip_prefix(&base_dir)
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|_| path.file_name().map(PathBuf::from).unwrap_or_default());
                files.push(SourceFile { path, relative });
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    /// Whether `path` (absolute, or relative to the root) is selected by this set.
    ///
    /// Used by the watcher; does not touch the filesystem.
    pub fn matches(&self, path: &Path) -> bool {
        let Some(relative) = self.relative_to_root(path) else {
            return false;
        };
        self.includes.iter().any(|i| i.pattern.matches_path_with(&relative, MATCH_OPTIONS))
            && !self.excludes.iter().any(|p| p.matches_path_with(&relative, MATCH_OPTIONS))
    }

    fn is_excluded(&self, path: &Path) -> bool {
        match self.relative_to_root(path) {
            Some(relative) => self.excludes.iter().any(|p| p.matches_path_with(&relative, MATCH_OPTIONS)),
            None => false,
        }
    }

    fn relative_to_root(&self, path: &Path) -> Option<PathBuf> {
        if path.is_absolute() {
            path.strip_prefix(&self.root).ok().map(Path::to_path_buf)
        } else {
            Some(path.to_path_buf())
        }
    }
}

/// Directory portion of a pattern before its first wildcard segment.
///
/// For a literal file pattern the base is its parent directory.
pub fn glob_base(pattern: &str) -> PathBuf {
    let path = Path::new(pattern);
    let mut base = PathBuf::new();
    let mut components = path.components().peekable();

    while let Some(component) = components.next() {
        let text = component.as_os_str().to_string_lossy();
        if has_wildcard(&text) {
            return base;
        }
        // the last literal component is the file itself
        if components.peek().is_none() {
            return base;
        }
        if !matches!(component, Component::CurDir) {
            base.push(component);
        }
    }
    base
}

fn has_wildcard(segment: &str) -> bool {
    segment.contains(['*', '?', '[', '{'])
}
