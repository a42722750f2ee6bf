//! Object-storage traits.
//!
//! Everything here is synchronous; clients built on async SDKs block inside
//! their implementation.

use std::error::Error;
use std::fmt;

// ============================================================================
// Errors
// ============================================================================

/// Failure reported by an [`ObjectIO`] implementation.
#[derive(Debug, Clone)]
pub struct CloudIOError {
    pub kind: ErrorKind,
    pub message: String,
}

/// Provider-neutral failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authentication,
    Authorization,
    NotFound,
    AlreadyExists,
    InvalidInput,
    Network,
    Timeout,
    ServiceUnavailable,
    RateLimited,
    Other,
}

impl CloudIOError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for CloudIOError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl Error for CloudIOError {}

impl From<CloudIOError> for std::io::Error {
    fn from(e: CloudIOError) -> Self {
        let kind = match e.kind {
            ErrorKind::NotFound => std::io::ErrorKind::NotFound,
            ErrorKind::AlreadyExists => std::io::ErrorKind::AlreadyExists,
            ErrorKind::Authentication | ErrorKind::Authorization => {
                std::io::ErrorKind::PermissionDenied
            }
            ErrorKind::InvalidInput => std::io::ErrorKind::InvalidInput,
            ErrorKind::Timeout => std::io::ErrorKind::TimedOut,
            ErrorKind::Network
            | ErrorKind::ServiceUnavailable
            | ErrorKind::RateLimited
            | ErrorKind::Other => std::io::ErrorKind::Other,
        };
        Self::new(kind, e)
    }
}

pub type CloudResult<T> = Result<T, CloudIOError>;

// ============================================================================
// Credentials
// ============================================================================

/// Authentication material handed to a storage client when it is built.
pub trait CloudCredentials: Send + Sync {
    /// Access key id, profile name or similar; safe to log.
    fn identifier(&self) -> &str;

    /// e.g. `"access_key"` or `"profile"`.
    fn credential_type(&self) -> &str;

    /// # Errors
    /// [`ErrorKind::Authentication`] if the key id or secret is missing.
    fn validate(&self) -> CloudResult<()>;
}

// ============================================================================
// ObjectIO
// ============================================================================

/// Flat key/value object storage, one namespace per bucket.
pub trait ObjectIO: Send + Sync {
    /// Store `data` under `key`, replacing any existing object.
    ///
    /// # Errors
    /// Provider failures, e.g. [`ErrorKind::ServiceUnavailable`].
    fn put_object(&self, bucket: &str, key: &str, data: &[u8]) -> CloudResult<()>;

    /// # Errors
    /// [`ErrorKind::NotFound`] for a missing object, provider failures otherwise.
    fn get_object(&self, bucket: &str, key: &str) -> CloudResult<Vec<u8>>;

    /// Keys starting with `prefix`, sorted.
    ///
    /// # Errors
    /// Provider failures.
    fn list_objects(&self, bucket: &str, prefix: Option<&str>) -> CloudResult<Vec<String>>;

    /// # Errors
    /// Provider failures.
    fn object_exists(&self, bucket: &str, key: &str) -> CloudResult<bool>;
}
