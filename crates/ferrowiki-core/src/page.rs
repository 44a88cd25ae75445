use crate::error::WikiError;
use crate::processor;
use crate::vfs::FileSystem;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Ordered multimap of front-matter fields.
///
/// Field order is the order of first appearance in the file and is preserved
/// across a save/load round trip. Repeated keys accumulate values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    fields: Vec<(String, Vec<String>)>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// All values of a field, in file order.
    pub fn get(&self, key: &str) -> Result<&[String], WikiError> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, values)| values.as_slice())
            .ok_or_else(|| WikiError::KeyNotFound(key.to_string()))
    }

    /// First value of a field, if the field exists.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, values)| values.first())
            .map(String::as_str)
    }

    /// Replace a field with a single value, keeping its position if present.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some((_, values)) = self.fields.iter_mut().find(|(k, _)| k == key) {
            values.clear();
            values.push(value);
        } else {
            self.fields.push((key.to_string(), vec![value]));
        }
    }

    /// Add a value to a field, creating the field at the end if absent.
    pub fn append(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some((_, values)) = self.fields.iter_mut().find(|(k, _)| k == key) {
            values.push(value);
        } else {
            self.fields.push((key.to_string(), vec![value]));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields
            .iter()
            .map(|(k, values)| (k.as_str(), values.as_slice()))
    }
}

/// One wiki page: a file under the content root.
///
/// `metadata` and `body` are always reconstructible from the persisted file;
/// `html` is derived on parse and never written back.
#[derive(Debug, Clone)]
pub struct Page {
    url: String,
    path: PathBuf,
    pub metadata: Metadata,
    pub body: String,
    html: String,
}

impl Page {
    /// Read and parse the file at `path`.
    pub fn load(path: PathBuf, url: String, fs: &dyn FileSystem) -> Result<Self, WikiError> {
        let mut page = Self::new_bare(path, url);
        page.reload(fs)?;
        Ok(page)
    }

    /// A fresh, unsaved page with empty metadata and body.
    pub fn new_bare(path: PathBuf, url: String) -> Self {
        Self {
            url,
            path,
            metadata: Metadata::new(),
            body: String::new(),
            html: String::new(),
        }
    }

    fn reload(&mut self, fs: &dyn FileSystem) -> Result<(), WikiError> {
        let raw = fs.read_to_string(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => WikiError::NotFound(self.url.clone()),
            ErrorKind::InvalidData => WikiError::Decode(self.path.display().to_string()),
            _ => WikiError::Io(e),
        })?;
        self.parse(&raw);
        Ok(())
    }

    /// Populate html/body/metadata from raw file text.
    fn parse(&mut self, raw: &str) {
        let rendered = processor::render(raw);
        self.html = rendered.html;
        self.body = rendered.body;
        self.metadata = rendered.metadata;
    }

    /// Persist the page, then reload and reparse so in-memory state matches
    /// the file exactly.
    ///
    /// Multi-value fields are written as repeated `key: value` lines; the
    /// loader accumulates them back, so the round trip preserves field
    /// identity. Body line endings are normalized to `\n`.
    pub fn save(&mut self, fs: &dyn FileSystem) -> Result<(), WikiError> {
        if let Some(parent) = self.path.parent() {
            fs.create_dir_all(parent)?;
        }

        let mut out = String::with_capacity(self.body.len() + 64);
        for (key, values) in self.metadata.iter() {
            for value in values {
                out.push_str(key);
                out.push_str(": ");
                out.push_str(value);
                out.push('\n');
            }
        }
        // The blank-line separator only makes sense after front-matter; a
        // metadata-less page is just its body.
        if !self.metadata.is_empty() {
            out.push('\n');
        }
        out.push_str(&self.body.replace("\r\n", "\n"));

        fs.write(&self.path, &out)?;
        self.reload(fs)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    /// The `title` field, falling back to the page's url.
    pub fn title(&self) -> &str {
        self.metadata.value("title").unwrap_or(&self.url)
    }

    /// The raw comma-separated `tags` field, falling back to "".
    pub fn tags(&self) -> &str {
        self.metadata.value("tags").unwrap_or("")
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.metadata.set("title", title);
    }

    pub fn set_tags(&mut self, tags: impl Into<String>) {
        self.metadata.set("tags", tags);
    }

    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = body.into();
    }

    /// Rebind the page to a new location. Used by the repository when a file
    /// is moved; does not touch the filesystem.
    pub(crate) fn relocate(&mut self, path: PathBuf, url: String) {
        self.path = path;
        self.url = url;
    }
}
