//! Filesystem abstraction over local disks and object stores.
//!
//! Paths are `/`-separated strings so the same dataset layout works for both
//! [`LocalFileSystem`] and [`ObjectStoreFileSystem`](crate::io::cloud::ObjectStoreFileSystem).
//!
//! Output streams are scoped: [`with_output_stream`] acquires a stream right
//! before the write and closes it on every exit path.

use crate::error::{LakeError, Result};
use crate::io::glob::expand_glob;
use bytes::Bytes;
use std::fmt;
use std::fs::{File, create_dir_all};
use std::io::{BufWriter, Write};
use std::path::Path;

/// A writable byte stream that must be closed explicitly.
pub trait OutputStream: Write + Send {
    /// Flush and release the stream. Remote implementations upload here.
    ///
    /// # Errors
    /// Returns the storage error that prevented the data from being persisted.
    fn close(self: Box<Self>) -> Result<()>;
}

/// Minimum filesystem surface lakeshard needs.
pub trait FileSystem: Send + Sync + fmt::Debug {
    /// `true` for object stores, which have no real directories.
    fn is_remote(&self) -> bool;

    /// Whether `path` names a file or a non-empty directory.
    ///
    /// # Errors
    /// Returns an error if the backing store cannot be queried.
    fn exists(&self, path: &str) -> Result<bool>;

    /// # Errors
    /// Returns an error if the backing store cannot be queried.
    fn is_file(&self, path: &str) -> Result<bool>;

    /// Read a whole file. The input stream is opened and released inside the call.
    ///
    /// # Errors
    /// [`LakeError::SourceNotFound`] if the file is absent, [`LakeError::Storage`] otherwise.
    fn read(&self, path: &str) -> Result<Bytes>;

    /// Open `path` for writing, replacing any existing file.
    ///
    /// # Errors
    /// [`LakeError::Storage`] if the stream cannot be created.
    fn open_write(&self, path: &str) -> Result<Box<dyn OutputStream>>;

    /// Create `path` and its parents. Succeeds if they already exist.
    ///
    /// # Errors
    /// [`LakeError::Storage`] if a directory cannot be created.
    fn create_dir_all(&self, path: &str) -> Result<()>;

    /// Every file below `path`, recursively, in sorted order.
    ///
    /// # Errors
    /// [`LakeError::Storage`] if the listing fails.
    fn list_files(&self, path: &str) -> Result<Vec<String>>;
}

/// Run `write` against a freshly opened stream for `path`, then close it.
///
/// The stream is closed whether or not `write` succeeds. The first error wins.
///
/// # Errors
/// Errors from opening, from `write`, or from closing the stream.
pub fn with_output_stream<T>(
    fs: &dyn FileSystem,
    path: &str,
    write: impl FnOnce(&mut Box<dyn OutputStream>) -> Result<T>,
) -> Result<T> {
    let mut stream = fs.open_write(path)?;
    let written = write(&mut stream);
    let closed = stream.close();
    let value = written?;
    closed?;
    Ok(value)
}

/// Join path segments with `/`, skipping empty segments and duplicate separators.
#[must_use]
pub fn join_path<S: AsRef<str>>(segments: &[S]) -> String {
    let mut out = String::new();
    for (i, seg) in segments.iter().enumerate() {
        let seg = seg.as_ref();
        let seg = match (i, seg.trim_end_matches('/')) {
            (0, "") if seg.starts_with('/') => "/",
            (0, trimmed) => trimmed,
            _ => seg.trim_matches('/'),
        };
        if seg.is_empty() && i > 0 {
            continue;
        }
        if !out.is_empty() && !out.ends_with('/') {
            out.push('/');
        }
        out.push_str(seg);
    }
    out
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

struct LocalOutputStream {
    path: String,
    inner: BufWriter<File>,
}

impl Write for LocalOutputStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl OutputStream for LocalOutputStream {
    fn close(mut self: Box<Self>) -> Result<()> {
        self.inner
            .flush()
            .map_err(|e| LakeError::storage("close", self.path.clone(), e))
    }
}

impl FileSystem for LocalFileSystem {
    fn is_remote(&self) -> bool {
        false
    }

    fn exists(&self, path: &str) -> Result<bool> {
        Ok(Path::new(path).exists())
    }

    fn is_file(&self, path: &str) -> Result<bool> {
        Ok(Path::new(path).is_file())
    }

    fn read(&self, path: &str) -> Result<Bytes> {
        match std::fs::read(path) {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(LakeError::SourceNotFound {
                op: "read",
                path: path.to_string(),
            }),
            Err(e) => Err(LakeError::storage("read", path, e)),
        }
    }

    fn open_write(&self, path: &str) -> Result<Box<dyn OutputStream>> {
        let file = File::create(path).map_err(|e| LakeError::storage("open for write", path, e))?;
        Ok(Box::new(LocalOutputStream {
            path: path.to_string(),
            inner: BufWriter::new(file),
        }))
    }

    fn create_dir_all(&self, path: &str) -> Result<()> {
        if path.is_empty() {
            return Ok(());
        }
        create_dir_all(path).map_err(|e| LakeError::storage("mkdir -p", path, e))
    }

    fn list_files(&self, path: &str) -> Result<Vec<String>> {
        if Path::new(path).is_file() {
            return Ok(vec![path.to_string()]);
        }
        let pattern = join_path(&[glob::Pattern::escape(path).as_str(), "**", "*"]);
        Ok(expand_glob(&pattern)?
            .into_iter()
            .filter_map(|p| p.to_str().map(str::to_string))
            .collect())
    }
}
