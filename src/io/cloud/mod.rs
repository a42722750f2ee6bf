//! Object-storage backends.
//!
//! - [`ObjectIO`] - provider-agnostic, synchronous object storage (S3, GCS, Azure Blob)
//! - [`ObjectStoreFileSystem`] - presents one bucket as a [`FileSystem`](crate::io::fs::FileSystem)
//! - [`CloudCredentials`] - credentials passed explicitly when a store is built
//! - [`FakeObjectIO`] - in-memory store for tests
//!
//! ```
//! use lakeshard::io::cloud::*;
//! use lakeshard::io::fs::FileSystem;
//! use std::sync::Arc;
//!
//! let store = FakeObjectIO::new();
//! let creds = StaticCredentials::new("AKIAEXAMPLE", "secret");
//! let fs = ObjectStoreFileSystem::new(Arc::new(store.clone()), "lake", &creds)?;
//!
//! store.put_object("lake", "events/a.parquet", b"...")?;
//! assert!(fs.is_file("s3://lake/events/a.parquet")?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Implementing for Real Providers
//! ```ignore
//! use lakeshard::io::cloud::*;
//! use aws_sdk_s3::Client;
//!
//! struct S3ObjectIO {
//!     client: Client,
//!     rt: tokio::runtime::Runtime,
//! }
//!
//! impl ObjectIO for S3ObjectIO {
//!     fn put_object(&self, bucket: &str, key: &str, data: &[u8]) -> CloudResult<()> {
//!         self.rt.block_on(async {
//!             self.client.put_object()
//!                 .bucket(bucket)
//!                 .key(key)
//!                 .body(data.to_vec().into())
//!                 .send()
//!                 .await
//!         })
//!         .map_err(|e| CloudIOError::new(ErrorKind::Network, e.to_string()))?;
//!         Ok(())
//!     }
//!     // ... implement other methods
//! }
//! ```

pub mod credentials;
pub mod fake;
pub mod store;
pub mod traits;

pub use credentials::*;
pub use fake::*;
pub use store::*;
pub use traits::*;
