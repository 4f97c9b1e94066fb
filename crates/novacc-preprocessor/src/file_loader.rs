//! Filesystem abstraction for `#include` resolution.
//!
//! Directory *discovery* (populating the include-path list from project
//! configuration) is out of scope per spec §1 ("Filesystem discovery of
//! include directories" is an external collaborator); this trait is the
//! narrow interface the preprocessor actually needs — read a file's text
//! given a resolved path — and is injectable so tests never touch the real
//! filesystem.

use std::path::{Path, PathBuf};

pub trait FileLoader {
    fn read_to_string(&self, path: &Path) -> std::io::Result<String>;
    fn exists(&self, path: &Path) -> bool;
}

/// Reads straight from the OS filesystem.
pub struct OsFileLoader;

impl FileLoader for OsFileLoader {
    fn read_to_string(&self, path: &Path) -> std::io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// In-memory loader used by tests and by embedding tools that already hold
/// source text (e.g. an IDE buffer) without touching disk.
#[derive(Default)]
pub struct MemoryFileLoader {
    files: std::collections::HashMap<PathBuf, String>,
}

impl MemoryFileLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: impl Into<PathBuf>, contents: impl Into<String>) -> &mut Self {
        self.files.insert(path.into(), contents.into());
        self
    }
}

impl FileLoader for MemoryFileLoader {
    fn read_to_string(&self, path: &Path) -> std::io::Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"))
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }
}

/// Resolves an `#include` against the current file's directory (for `"x"`)
/// then each configured include directory in order (spec §4.1).
pub fn resolve_include(
    loader: &dyn FileLoader,
    name: &str,
    is_quoted: bool,
    current_dir: Option<&Path>,
    include_dirs: &[PathBuf],
    start_after_dir: Option<usize>,
) -> Option<(PathBuf, usize)> {
    let candidates: Vec<(PathBuf, usize)> = if is_quoted {
        let mut v = Vec::new();
        if let Some(dir) = current_dir {
            v.push((dir.join(name), usize::MAX));
        }
        v.extend(
            include_dirs
                .iter()
                .enumerate()
                .map(|(i, d)| (d.join(name), i)),
        );
        v
    } else {
        include_dirs
            .iter()
            .enumerate()
            .map(|(i, d)| (d.join(name), i))
            .collect()
    };
    let start = start_after_dir.map(|i| i + 1).unwrap_or(0);
    for (path, idx) in candidates {
        if idx != usize::MAX && idx < start {
            continue;
        }
        if loader.exists(&path) {
            return Some((path, idx));
        }
    }
    None
}
