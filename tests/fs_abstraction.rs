// tests/fs_abstraction.rs

use std::path::Path;

use devpipe::fs::mock::MockFileSystem;
use devpipe::fs::{FileSystem, RealFileSystem};
use devpipe::pipeline::source::read_sources;

fn patterns() -> Vec<String> {
    vec![
        "static/src/*.js".to_string(),
        "!static/src/*.test.js".to_string(),
        "node_modules/katex/dist/fonts/*.woff*".to_string(),
    ]
}

fn summary(fs: &dyn FileSystem, root: &Path) -> Vec<(String, String)> {
    let out = read_sources(fs, root, &patterns());
    assert!(out.errors.is_empty(), "{:?}", out.errors);
    out.files
        .into_iter()
        .map(|f| {
            (
                f.relative.to_string_lossy().replace('\\', "/"),
                String::from_utf8(f.contents).unwrap(),
            )
        })
        .collect()
}

#[test]
fn real_and_mock_filesystems_expand_sources_alike() {
    let files = [
        ("static/src/app.js", "app"),
        ("static/src/app.test.js", "test"),
        ("static/src/editor.js", "editor"),
        ("node_modules/katex/dist/fonts/KaTeX_Main.woff", "w1"),
        ("node_modules/katex/dist/fonts/KaTeX_Main.woff2", "w2"),
        ("node_modules/katex/dist/fonts/KaTeX_Main.ttf", "ttf"),
    ];

    let dir = tempfile::tempdir().unwrap();
    let real = RealFileSystem;
    let mock = MockFileSystem::new();
    for (path, contents) in files {
        real.write(&dir.path().join(path), contents.as_bytes()).unwrap();
        mock.add_file(Path::new(".").join(path), contents.as_bytes().to_vec());
    }

    let from_real = summary(&real, dir.path());
    let from_mock = summary(&mock, Path::new("."));
    assert_eq!(from_real, from_mock);
    assert_eq!(
        from_real,
        vec![
            ("app.js".to_string(), "app".to_string()),
            ("editor.js".to_string(), "editor".to_string()),
            ("KaTeX_Main.woff".to_string(), "w1".to_string()),
            ("KaTeX_Main.woff2".to_string(), "w2".to_string()),
        ]
    );
}

#[test]
fn remove_dir_all_is_idempotent_on_real_fs() {
    let dir = tempfile::tempdir().unwrap();
    let dist = dir.path().join("static/dist");
    RealFileSystem.write(&dist.join("fonts/a.woff"), b"w").unwrap();

    RealFileSystem.remove_dir_all(&dist).unwrap();
    assert!(!dist.exists());
    RealFileSystem.remove_dir_all(&dist).unwrap();
}

#[cfg(unix)]
#[test]
fn globstar_walk_survives_a_symlink_loop() {
    let dir = tempfile::tempdir().unwrap();
    let real = RealFileSystem;
    real.write(&dir.path().join("static/src/a.css"), b"a").unwrap();
    real.write(&dir.path().join("static/src/nested/b.css"), b"b").unwrap();
    std::os::unix::fs::symlink("..", dir.path().join("static/src/nested/loop")).unwrap();

    let out = read_sources(&real, dir.path(), &["static/**/*.css".to_string()]);
    assert!(out.errors.is_empty(), "{:?}", out.errors);
    let mut relative: Vec<_> = out
        .files
        .iter()
        .map(|f| f.relative.to_string_lossy().replace('\\', "/"))
        .collect();
    relative.sort();
    assert_eq!(relative, vec!["src/a.css".to_string(), "src/nested/b.css".to_string()]);

    let shallow = read_sources(&real, dir.path(), &["static/src/*.css".to_string()]);
    assert_eq!(shallow.files.len(), 1);
}
