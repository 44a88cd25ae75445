use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

/// Cheap change-detection stamp for a file (mtime + size).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    pub mtime: SystemTime,
    pub size: u64,
}

/// Abstract interface for file system operations.
///
/// The wiki owns persistence, so this covers writes as well as reads.
pub trait FileSystem: Send + Sync {
    /// Read the entire contents of a file into a string.
    fn read_to_string(&self, path: &Path) -> std::io::Result<String>;

    /// Write a string to a file, replacing any previous contents.
    fn write(&self, path: &Path, contents: &str) -> std::io::Result<()>;

    /// Rename a file. Both paths must be on the same filesystem.
    fn rename(&self, from: &Path, to: &Path) -> std::io::Result<()>;

    /// Remove a single file.
    fn remove_file(&self, path: &Path) -> std::io::Result<()>;

    /// Create a directory and all missing parents. Idempotent.
    fn create_dir_all(&self, path: &Path) -> std::io::Result<()>;

    /// Whether a file exists at the path.
    fn exists(&self, path: &Path) -> bool;

    /// Change-detection stamp for a file.
    fn stamp(&self, path: &Path) -> std::io::Result<FileStamp>;

    /// List all files with the given extension under the root directory.
    /// This should be a recursive search.
    fn list_files(&self, root: &Path, extension: &str) -> Vec<PathBuf>;
}

/// Standard implementation of FileSystem using std::fs and walkdir.
#[derive(Default)]
pub struct PhysicalFileSystem;

impl FileSystem for PhysicalFileSystem {
    fn read_to_string(&self, path: &Path) -> std::io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write(&self, path: &Path, contents: &str) -> std::io::Result<()> {
        std::fs::write(path, contents)
    }

    fn rename(&self, from: &Path, to: &Path) -> std::io::Result<()> {
        std::fs::rename(from, to)
    }

    fn remove_file(&self, path: &Path) -> std::io::Result<()> {
        std::fs::remove_file(path)
    }

    fn create_dir_all(&self, path: &Path) -> std::io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn stamp(&self, path: &Path) -> std::io::Result<FileStamp> {
        let meta = std::fs::metadata(path)?;
        Ok(FileStamp {
            mtime: meta.modified()?,
            size: meta.len(),
        })
    }

    fn list_files(&self, root: &Path, extension: &str) -> Vec<PathBuf> {
        let mut files = Vec::new();

        for entry in WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();

            if path.is_file() {
                if let Some(ext) = path.extension() {
                    if ext == extension {
                        files.push(path.to_path_buf());
                    }
                }
            }
        }

        files
    }
}
