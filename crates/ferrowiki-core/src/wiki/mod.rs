use crate::error::WikiError;
use crate::page::Page;
use crate::vfs::{FileStamp, FileSystem, PhysicalFileSystem};
use log::debug;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

mod search;

#[cfg(test)]
mod tests;

pub use search::{SearchField, DEFAULT_SEARCH_FIELDS};

/// Reserved extension for page files.
pub const PAGE_EXTENSION: &str = "md";

struct CacheEntry {
    stamp: FileStamp,
    page: Page,
}

/// The filesystem-backed collection of all pages under one content root.
///
/// The filesystem is the source of truth. `index()` re-walks the tree on
/// every call so pages added or removed out-of-band are always seen; a
/// per-file (mtime, size) cache skips re-parsing files that have not changed,
/// mirroring a metadata-tier check. Writes that go through the repository
/// update the cache directly.
pub struct Wiki {
    root: PathBuf,
    fs: Arc<dyn FileSystem>,
    cache: Mutex<HashMap<PathBuf, CacheEntry>>,
}

impl Wiki {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_fs(root, Arc::new(PhysicalFileSystem))
    }

    pub fn with_fs(root: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            root: root.into(),
            fs,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic identifier-to-file mapping: `<root>/<id>.md`.
    pub fn path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}.{}", id, PAGE_EXTENSION))
    }

    pub fn exists(&self, id: &str) -> bool {
        self.fs.exists(&self.path(id))
    }

    /// Load and parse the page, or `Ok(None)` if it does not exist.
    /// Read failures (bad encoding, I/O) propagate.
    pub fn get(&self, id: &str) -> Result<Option<Page>, WikiError> {
        let path = self.path(id);
        if !self.fs.exists(&path) {
            return Ok(None);
        }
        self.load_cached(&path, id).map(Some)
    }

    /// As [`get`](Self::get), but a missing page is an error the boundary
    /// maps to 404.
    pub fn get_or_fail(&self, id: &str) -> Result<Page, WikiError> {
        self.get(id)?
            .ok_or_else(|| WikiError::NotFound(id.to_string()))
    }

    /// A fresh unsaved page for `id`, or `Conflict` if the id is taken.
    /// Callers must not overwrite an existing page through this path.
    pub fn get_new(&self, id: &str) -> Result<Page, WikiError> {
        if self.exists(id) {
            return Err(WikiError::Conflict(id.to_string()));
        }
        Ok(Page::new_bare(self.path(id), id.to_string()))
    }

    /// Persist a page and keep the index cache coherent.
    pub fn save(&self, page: &mut Page) -> Result<(), WikiError> {
        page.save(self.fs.as_ref())?;
        let stamp = self.fs.stamp(page.path())?;
        self.lock_cache().insert(
            page.path().to_path_buf(),
            CacheEntry {
                stamp,
                page: page.clone(),
            },
        );
        Ok(())
    }

    /// Rename the underlying file. Fails with `NotFound` if the source is
    /// missing and with `Conflict` if the destination already exists; a move
    /// never clobbers another page.
    pub fn move_page(&self, from: &str, to: &str) -> Result<(), WikiError> {
        let src = self.path(from);
        let dst = self.path(to);

        if !self.fs.exists(&src) {
            return Err(WikiError::NotFound(from.to_string()));
        }
        if self.fs.exists(&dst) {
            return Err(WikiError::Conflict(to.to_string()));
        }

        if let Some(parent) = dst.parent() {
            self.fs.create_dir_all(parent)?;
        }
        self.fs.rename(&src, &dst)?;
        debug!("moved page {} -> {}", from, to);

        let mut cache = self.lock_cache();
        if let Some(mut entry) = cache.remove(&src) {
            entry.page.relocate(dst.clone(), to.to_string());
            if let Ok(stamp) = self.fs.stamp(&dst) {
                entry.stamp = stamp;
                cache.insert(dst, entry);
            }
        }
        Ok(())
    }

    /// Remove the page file. Returns `false` (no-op) when absent.
    pub fn delete(&self, id: &str) -> Result<bool, WikiError> {
        let path = self.path(id);
        if !self.fs.exists(&path) {
            return Ok(false);
        }
        self.fs.remove_file(&path)?;
        self.lock_cache().remove(&path);
        debug!("deleted page {}", id);
        Ok(true)
    }

    /// Walk the content root and return every page, sorted by
    /// case-insensitive title.
    pub fn index(&self) -> Result<Vec<Page>, WikiError> {
        let files = self.fs.list_files(&self.root, PAGE_EXTENSION);

        let mut pages = Vec::with_capacity(files.len());
        for path in &files {
            let url = self.url_from_path(path);
            pages.push(self.load_cached(path, &url)?);
        }

        // Entries for files that vanished out-of-band would otherwise stick
        // around forever.
        let live: HashSet<&Path> = files.iter().map(PathBuf::as_path).collect();
        self.lock_cache()
            .retain(|path, _| live.contains(path.as_path()));

        pages.sort_by_key(|page| page.title().to_lowercase());
        debug!("indexed {} pages under {:?}", pages.len(), self.root);
        Ok(pages)
    }

    /// Derive a page identifier from a file path: relative to the root,
    /// separators normalized to `/`, extension stripped. Exactly one
    /// extension comes off, so `a.md.md` maps to `a.md` and stays reachable
    /// through [`path`](Self::path).
    fn url_from_path(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        let mut s = rel.to_string_lossy().to_string();
        if std::path::MAIN_SEPARATOR == '\\' {
            s = s.replace('\\', "/");
        }
        let suffix = format!(".{}", PAGE_EXTENSION);
        s.strip_suffix(&suffix).map(str::to_string).unwrap_or(s)
    }

    /// Cache-aware page load. An entry is reused only while the file still
    /// has the same (mtime, size) stamp.
    fn load_cached(&self, path: &Path, url: &str) -> Result<Page, WikiError> {
        let stamp = self.fs.stamp(path)?;

        {
            let cache = self.lock_cache();
            if let Some(entry) = cache.get(path) {
                if entry.stamp == stamp && entry.page.url() == url {
                    return Ok(entry.page.clone());
                }
            }
        }

        let page = Page::load(path.to_path_buf(), url.to_string(), self.fs.as_ref())?;
        self.lock_cache().insert(
            path.to_path_buf(),
            CacheEntry {
                stamp,
                page: page.clone(),
            },
        );
        Ok(page)
    }

    fn lock_cache(&self) -> MutexGuard<'_, HashMap<PathBuf, CacheEntry>> {
        // A poisoned lock only means another request panicked mid-insert;
        // the map itself is still usable.
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}
