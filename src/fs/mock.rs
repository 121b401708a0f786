// src/fs/mock.rs

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Result, bail};

use super::FileSystem;

#[derive(Debug, Default)]
struct Tree {
    files: BTreeMap<PathBuf, Vec<u8>>,
    /// Every directory that holds something, plus `.`.
    dirs: BTreeSet<PathBuf>,
}

/// In-memory filesystem for tests.
///
/// Paths are keys, compared verbatim: keep to one style per test
/// (`./src/a.css` or `/proj/src/a.css`). Directories exist implicitly as
/// ancestors of files. Clones share the same tree.
#[derive(Debug, Clone)]
pub struct MockFileSystem {
    tree: Arc<Mutex<Tree>>,
}

impl Default for MockFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFileSystem {
    pub fn new() -> Self {
        let mut tree = Tree::default();
        tree.dirs.insert(PathBuf::from("."));
        Self {
            tree: Arc::new(Mutex::new(tree)),
        }
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = path.as_ref();
        let mut tree = self.lock();
        let mut dir = parent_of(path);
        while let Some(d) = dir {
            if !tree.dirs.insert(d.to_path_buf()) {
                break;
            }
            dir = parent_of(d);
        }
        tree.files.insert(path.to_path_buf(), content.into());
    }

    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.lock().files.get(path.as_ref()).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Tree> {
        self.tree.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Parent directory, with `.` standing in for the empty parent of a bare
/// relative name.
fn parent_of(path: &Path) -> Option<&Path> {
    match path.parent() {
        Some(p) if p.as_os_str().is_empty() => (path != Path::new(".")).then(|| Path::new(".")),
        other => other,
    }
}

impl FileSystem for MockFileSystem {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let tree = self.lock();
        match tree.files.get(path) {
            Some(bytes) => Ok(bytes.clone()),
            None if tree.dirs.contains(path) => bail!("{} is a directory", path.display()),
            None => bail!("{} not found", path.display()),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.add_file(path, contents);
        Ok(())
    }

    fn is_file(&self, path: &Path) -> bool {
        self.lock().files.contains_key(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.lock().dirs.contains(path)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let tree = self.lock();
        if !tree.dirs.contains(path) {
            bail!("{} is not a directory", path.display());
        }
        let mut entries: Vec<PathBuf> = tree
            .files
            .keys()
            .chain(tree.dirs.iter())
            .filter(|p| parent_of(p) == Some(path))
            .cloned()
            .collect();
        entries.sort();
        Ok(entries)
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        let mut tree = self.lock();
        tree.files.retain(|p, _| !p.starts_with(path));
        tree.dirs.retain(|p| p == Path::new(".") || !p.starts_with(path));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directories_follow_their_files() {
        let fs = MockFileSystem::new();
        fs.add_file("./dist/app.js", b"js".to_vec());
        fs.add_file("./dist/fonts/a.woff", b"font".to_vec());
        fs.add_file("./src/app.js", b"src".to_vec());

        assert_eq!(
            fs.read_dir(Path::new("./dist")).unwrap(),
            vec![PathBuf::from("./dist/app.js"), PathBuf::from("./dist/fonts")]
        );

        fs.remove_dir_all(Path::new("./dist")).unwrap();

        assert!(!fs.is_file(Path::new("./dist/fonts/a.woff")));
        assert!(!fs.is_dir(Path::new("./dist")));
        assert!(fs.is_file(Path::new("./src/app.js")));
        assert_eq!(fs.read_dir(Path::new(".")).unwrap(), vec![PathBuf::from("./src")]);
    }

    #[test]
    fn removing_missing_dir_is_ok() {
        let fs = MockFileSystem::new();
        assert!(fs.remove_dir_all(Path::new("./nope")).is_ok());
        assert!(fs.read(Path::new(".")).is_err());
    }
}
