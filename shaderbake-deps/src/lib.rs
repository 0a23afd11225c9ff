//! Include-aware modification times for shader sources.
//!
//! A shader is stale when any file in its transitive `#include` closure is
//! newer than the compiled output, so rebuild decisions key off a
//! "hierarchical" mtime: the maximum of a file's own mtime and those of
//! everything it pulls in. Includes are discovered syntactically with a
//! regex, without evaluating `#if` blocks in the shader source.

mod error;

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use regex::Regex;
use shaderbake_common::FastHashMap;

pub use error::DependencyError;

const INCLUDE_PATTERN: &str = r#"^\s*#include\s+["<]([^>"]+)[>"].*"#;

/// Lazily-populated cache of hierarchical modification times.
///
/// Populated single-threaded during planning; never invalidated within one
/// run. Results are memoized by resolved path.
pub struct DependencyTimes {
    include_dirs: Vec<PathBuf>,
    relaxed_includes: Vec<PathBuf>,
    include_pattern: Regex,
    cache: FastHashMap<PathBuf, SystemTime>,
}

impl DependencyTimes {
    /// `include_dirs` are searched in order after the including file's own
    /// directory. `relaxed_includes` name files whose modification never
    /// triggers a rebuild; they are skipped without being opened.
    pub fn new(include_dirs: &[PathBuf], relaxed_includes: &[String]) -> Self {
        DependencyTimes {
            include_dirs: include_dirs.to_vec(),
            relaxed_includes: relaxed_includes.iter().map(PathBuf::from).collect(),
            include_pattern: Regex::new(INCLUDE_PATTERN).expect("include pattern is valid"),
            cache: FastHashMap::default(),
        }
    }

    /// The maximum of `file`'s mtime and the hierarchical mtimes of every
    /// non-relaxed file it transitively includes.
    pub fn hierarchical_mtime(&mut self, file: &Path) -> Result<SystemTime, DependencyError> {
        let mut call_stack = Vec::new();
        self.resolve(file, &mut call_stack)
    }

    fn resolve(
        &mut self,
        file: &Path,
        call_stack: &mut Vec<PathBuf>,
    ) -> Result<SystemTime, DependencyError> {
        if let Some(&cached) = self.cache.get(file) {
            return Ok(cached);
        }

        // A file currently under expansion contributes only its own mtime;
        // the caller is already accumulating the rest of the cycle.
        if call_stack.iter().any(|visiting| visiting == file) {
            return self.mtime(file, call_stack);
        }

        let stream = File::open(file).map_err(|source| DependencyError::Unreadable {
            path: file.to_path_buf(),
            stack: call_stack.clone(),
            source,
        })?;

        call_stack.push(file.to_path_buf());

        let mut update_time = self.mtime(file, call_stack)?;
        let parent = file.parent().map(Path::to_path_buf).unwrap_or_default();

        for line in BufReader::new(stream).lines() {
            let line = line.map_err(|source| DependencyError::Unreadable {
                path: file.to_path_buf(),
                stack: call_stack.clone(),
                source,
            })?;

            let Some(captures) = self.include_pattern.captures(&line) else {
                continue;
            };

            let include_name = PathBuf::from(&captures[1]);
            if self.relaxed_includes.contains(&include_name) {
                continue;
            }

            let include_file = self.resolve_include(&parent, &include_name).ok_or_else(|| {
                DependencyError::IncludeNotFound {
                    name: include_name.clone(),
                    stack: call_stack.clone(),
                }
            })?;

            let dependency_time = self.resolve(&include_file, call_stack)?;
            update_time = update_time.max(dependency_time);
        }

        call_stack.pop();

        self.cache.insert(file.to_path_buf(), update_time);
        Ok(update_time)
    }

    /// Try the including file's directory first, then the configured include
    /// directories in order.
    fn resolve_include(&self, parent: &Path, name: &Path) -> Option<PathBuf> {
        let candidate = parent.join(name);
        if candidate.exists() {
            return Some(candidate);
        }

        self.include_dirs
            .iter()
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.exists())
    }

    fn mtime(&self, file: &Path, call_stack: &[PathBuf]) -> Result<SystemTime, DependencyError> {
        fs::metadata(file)
            .and_then(|meta| meta.modified())
            .map_err(|source| DependencyError::Unreadable {
                path: file.to_path_buf(),
                stack: call_stack.to_vec(),
                source,
            })
    }
}
