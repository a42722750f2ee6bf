//! [`FileSystem`] over an [`ObjectIO`] bucket.

use crate::error::{LakeError, Result};
use crate::io::cloud::traits::{CloudCredentials, CloudIOError, ErrorKind, ObjectIO};
use crate::io::fs::{FileSystem, OutputStream, join_path};
use bytes::Bytes;
use std::fmt;
use std::io::Write;
use std::sync::Arc;
use tracing::debug;

/// Files stored as objects in one bucket.
///
/// Paths may be `s3://bucket/key`, `bucket/key` or a bare `key`; the scheme and
/// bucket are stripped to form the object key. Directories do not exist as
/// such: a directory "exists" when some object key starts with `dir/`.
#[derive(Clone)]
pub struct ObjectStoreFileSystem {
    store: Arc<dyn ObjectIO>,
    bucket: String,
}

impl fmt::Debug for ObjectStoreFileSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStoreFileSystem")
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl ObjectStoreFileSystem {
    /// Build a filesystem for `bucket`, validating `credentials` first.
    ///
    /// # Errors
    /// [`LakeError::Config`] if the credentials do not validate.
    pub fn new(
        store: Arc<dyn ObjectIO>,
        bucket: impl Into<String>,
        credentials: &dyn CloudCredentials,
    ) -> Result<Self> {
        credentials.validate().map_err(|e| LakeError::Config {
            op: "connect object store",
            message: format!(
                "{} credentials `{}`: {e}",
                credentials.credential_type(),
                credentials.identifier()
            ),
        })?;
        Ok(Self {
            store,
            bucket: bucket.into(),
        })
    }

    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Object key for `path`.
    #[must_use]
    pub fn key_for<'a>(&self, path: &'a str) -> &'a str {
        let path = path.split_once("://").map_or(path, |(_, rest)| rest);
        let path = path.trim_start_matches('/');
        let path = match path.strip_prefix(self.bucket.as_str()) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
            _ => path,
        };
        path.trim_start_matches('/')
    }

    fn dir_prefix(&self, path: &str) -> String {
        let key = self.key_for(path).trim_end_matches('/');
        if key.is_empty() { String::new() } else { format!("{key}/") }
    }

    fn storage_error(op: &'static str, path: &str, e: CloudIOError) -> LakeError {
        if e.kind == ErrorKind::NotFound {
            return LakeError::SourceNotFound {
                op,
                path: path.to_string(),
            };
        }
        LakeError::storage(op, path, e.into())
    }
}

struct ObjectOutputStream {
    store: Arc<dyn ObjectIO>,
    bucket: String,
    key: String,
    buffer: Vec<u8>,
}

impl Write for ObjectOutputStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl OutputStream for ObjectOutputStream {
    fn close(self: Box<Self>) -> Result<()> {
        debug!(
            bucket = %self.bucket,
            key = %self.key,
            bytes = self.buffer.len(),
            "uploading object"
        );
        self.store
            .put_object(&self.bucket, &self.key, &self.buffer)
            .map_err(|e| ObjectStoreFileSystem::storage_error("upload", &self.key, e))
    }
}

impl FileSystem for ObjectStoreFileSystem {
    fn is_remote(&self) -> bool {
        true
    }

    fn exists(&self, path: &str) -> Result<bool> {
        if self.is_file(path)? {
            return Ok(true);
        }
        let prefix = self.dir_prefix(path);
        let listed = self
            .store
            .list_objects(&self.bucket, Some(&prefix))
            .map_err(|e| Self::storage_error("exists", path, e))?;
        Ok(!listed.is_empty())
    }

    fn is_file(&self, path: &str) -> Result<bool> {
        let key = self.key_for(path);
        if key.is_empty() {
            return Ok(false);
        }
        self.store
            .object_exists(&self.bucket, key)
            .map_err(|e| Self::storage_error("is file", path, e))
    }

    fn read(&self, path: &str) -> Result<Bytes> {
        self.store
            .get_object(&self.bucket, self.key_for(path))
            .map(Bytes::from)
            .map_err(|e| Self::storage_error("read", path, e))
    }

    fn open_write(&self, path: &str) -> Result<Box<dyn OutputStream>> {
        Ok(Box::new(ObjectOutputStream {
            store: Arc::clone(&self.store),
            bucket: self.bucket.clone(),
            key: self.key_for(path).to_string(),
            buffer: Vec::new(),
        }))
    }

    fn create_dir_all(&self, _path: &str) -> Result<()> {
        Ok(())
    }

    fn list_files(&self, path: &str) -> Result<Vec<String>> {
        if self.is_file(path)? {
            return Ok(vec![path.to_string()]);
        }
        let prefix = self.dir_prefix(path);
        let listed = self
            .store
            .list_objects(&self.bucket, (!prefix.is_empty()).then_some(prefix.as_str()))
            .map_err(|e| Self::storage_error("list", path, e))?;
        // Report paths in the caller's form so they can be related back to `path`.
        let mut paths: Vec<String> = listed
            .into_iter()
            .filter_map(|key| {
                key.strip_prefix(prefix.as_str())
                    .map(|rest| join_path(&[path, rest]))
            })
            .collect();
        paths.sort();
        Ok(paths)
    }
}
