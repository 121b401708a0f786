// src/pipeline/source.rs

//! Source expansion and reading.
//!
//! Patterns are expanded in declared order; matches of a single pattern are
//! sorted, and a file matched by several patterns is only read once. A file's
//! output path is taken relative to its pattern's glob base, so
//! `node_modules/katex/dist/fonts/*.woff` lands directly in `dest`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use tracing::debug;

use crate::fs::FileSystem;
use crate::pipeline::{FileError, FileRecord, StageOutput};

/// Stage name used for read failures.
pub const SOURCE_STAGE: &str = "src";

const GLOB_CHARS: &[char] = &['*', '?', '[', '{'];

/// A file matched by a source pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SourceMatch {
    abs: PathBuf,
    /// Path relative to the project root.
    from_root: PathBuf,
    /// Path relative to the pattern's glob base.
    relative: PathBuf,
}

/// Expand `patterns` under `root` and read every matched file.
///
/// Never fails as a whole: a bad pattern, a missing literal file or an
/// unreadable file becomes a [`FileError`] and the remaining files are read.
pub fn read_sources(fs: &dyn FileSystem, root: &Path, patterns: &[String]) -> StageOutput {
    let mut out = StageOutput::default();

    let (excludes, includes): (Vec<&String>, Vec<&String>) =
        patterns.iter().partition(|p| p.starts_with('!'));

    let exclude_set = match build_exclude_set(&excludes) {
        Ok(set) => set,
        Err(e) => {
            out.errors.push(source_error(PathBuf::from(excludes_label(&excludes)), &e));
            None
        }
    };

    let mut seen: HashSet<PathBuf> = HashSet::new();

    for pattern in includes {
        let matches = match expand(fs, root, pattern) {
            Ok(m) => m,
            Err(e) => {
                out.errors.push(source_error(PathBuf::from(pattern), &e));
                continue;
            }
        };

        for m in matches {
            if exclude_set
                .as_ref()
                .is_some_and(|set| set.is_match(to_slash(&m.from_root)))
            {
                continue;
            }
            if !seen.insert(m.abs.clone()) {
                continue;
            }
            match fs.read(&m.abs) {
                Ok(contents) => out.files.push(FileRecord {
                    source: m.from_root,
                    relative: m.relative,
                    contents,
                }),
                Err(e) => out.errors.push(source_error(m.from_root, &e)),
            }
        }
    }

    debug!(
        files = out.files.len(),
        errors = out.errors.len(),
        "read pipeline sources"
    );
    out
}

/// Leading directory of a pattern that contains no glob characters.
pub fn glob_base(pattern: &str) -> PathBuf {
    let pattern = pattern.trim_start_matches("./");
    let mut base = PathBuf::new();
    let parts: Vec<&str> = pattern.split('/').collect();
    let literal = !pattern.contains(GLOB_CHARS);

    for (i, part) in parts.iter().enumerate() {
        if part.contains(GLOB_CHARS) || (literal && i == parts.len() - 1) {
            break;
        }
        base.push(part);
    }
    base
}

fn expand(fs: &dyn FileSystem, root: &Path, pattern: &str) -> Result<Vec<SourceMatch>> {
    let pattern = pattern.trim_start_matches("./");
    let base = glob_base(pattern);

    if !pattern.contains(GLOB_CHARS) {
        let abs = root.join(pattern);
        if !fs.is_file(&abs) {
            bail!("file not found with singular glob: {pattern}");
        }
        let relative = abs
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(pattern));
        return Ok(vec![SourceMatch {
            abs,
            from_root: PathBuf::from(pattern),
            relative,
        }]);
    }

    let matcher = compile(pattern)?;
    let base_abs = if base.as_os_str().is_empty() {
        root.to_path_buf()
    } else {
        root.join(&base)
    };
    if !fs.is_dir(&base_abs) {
        return Ok(Vec::new());
    }

    // Directory levels below the base the pattern can reach.
    let max_depth = if pattern.contains("**") {
        usize::MAX
    } else {
        pattern.split('/').count() - base.components().count()
    };

    let mut matches = Vec::new();
    let mut stack = vec![(base_abs.clone(), 1usize)];
    while let Some((dir, depth)) = stack.pop() {
        for path in fs.read_dir(&dir)? {
            if fs.is_dir(&path) {
                // Symlinked directories are not descended into; a link back
                // up the tree would never end.
                if depth < max_depth && !fs.is_symlink(&path) {
                    stack.push((path, depth + 1));
                }
                continue;
            }
            let (Ok(from_root), Ok(relative)) =
                (path.strip_prefix(root), path.strip_prefix(&base_abs))
            else {
                continue;
            };
            if matcher.is_match(to_slash(from_root)) {
                matches.push(SourceMatch {
                    from_root: from_root.to_path_buf(),
                    relative: relative.to_path_buf(),
                    abs: path.clone(),
                });
            }
        }
    }

    matches.sort_by(|a, b| a.from_root.cmp(&b.from_root));
    Ok(matches)
}

fn compile(pattern: &str) -> Result<GlobMatcher> {
    Ok(GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .with_context(|| format!("invalid glob pattern: {pattern}"))?
        .compile_matcher())
}

fn build_exclude_set(excludes: &[&String]) -> Result<Option<GlobSet>> {
    if excludes.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pat in excludes {
        let pat = pat.trim_start_matches('!').trim_start_matches("./");
        let glob = GlobBuilder::new(pat)
            .literal_separator(true)
            .build()
            .with_context(|| format!("invalid exclude pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(Some(builder.build()?))
}

fn excludes_label(excludes: &[&String]) -> String {
    excludes
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn source_error(path: PathBuf, err: &anyhow::Error) -> FileError {
    FileError {
        stage: SOURCE_STAGE.to_string(),
        path,
        message: format!("{err:#}"),
    }
}

fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
