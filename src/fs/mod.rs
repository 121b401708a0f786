// src/fs/mod.rs

//! Filesystem access for pipelines and `clean` actions.

use std::fmt::Debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub mod mock;

pub trait FileSystem: Send + Sync + Debug {
    fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Replace `path` with `contents`, creating parent directories. Readers
    /// never observe a half-written file.
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;

    fn is_file(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;

    /// Whether `path` itself is a symbolic link.
    fn is_symlink(&self, _path: &Path) -> bool {
        false
    }

    /// Full paths of the entries of `path`, sorted.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Recursively remove a directory. A missing path is not an error.
    fn remove_dir_all(&self, path: &Path) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).with_context(|| format!("reading {}", path.display()))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output dir {}", parent.display()))?;

        let staging = staging_path(path);
        fs::write(&staging, contents)
            .with_context(|| format!("writing {}", staging.display()))?;
        fs::rename(&staging, path).map_err(|e| {
            let _ = fs::remove_file(&staging);
            anyhow::Error::new(e).context(format!("replacing {}", path.display()))
        })
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_symlink(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink())
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = fs::read_dir(path)
            .with_context(|| format!("listing {}", path.display()))?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<io::Result<Vec<_>>>()
            .with_context(|| format!("listing {}", path.display()))?;
        entries.sort();
        Ok(entries)
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        match fs::remove_dir_all(path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => {
                Err(e).with_context(|| format!("removing {}", path.display()))
            }
            _ => Ok(()),
        }
    }
}

/// Hidden sibling of `path` used while writing.
fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.devpipe-tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_replaces_without_leaving_staging_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("dist/app.js");
        let fs = RealFileSystem;

        fs.write(&out, b"one").unwrap();
        fs.write(&out, b"two").unwrap();

        assert_eq!(fs.read(&out).unwrap(), b"two");
        let names: Vec<_> = fs
            .read_dir(&dir.path().join("dist"))
            .unwrap()
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["app.js".to_string()]);
    }
}
