//! File globbing used for local dataset discovery.
//!
//! ```no_run
//! use lakeshard::io::glob::expand_glob;
//!
//! // Every parquet file of a hive-partitioned dataset
//! let files = expand_glob("lake/events/region=*/day=*/*.parquet")?;
//! # Ok::<(), lakeshard::LakeError>(())
//! ```

use crate::error::{LakeError, Result};
use glob::glob;
use std::path::PathBuf;

/// Expand a glob pattern into a sorted vector of matching file paths.
///
/// Directories matched by the pattern are skipped. Zero matches is an empty
/// vector, not an error.
///
/// # Errors
///
/// Returns [`LakeError::InvalidArgument`] if the pattern is invalid and
/// [`LakeError::Storage`] if a matched entry cannot be read.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths = glob(pattern)
        .map_err(|e| LakeError::invalid("glob", format!("invalid glob pattern {pattern}: {e}")))?;

    let mut result = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| {
            let path = e.path().display().to_string();
            LakeError::storage("glob", path, std::io::Error::from(e))
        })?;
        if path.is_file() {
            result.push(path);
        }
    }

    // Sort for deterministic order
    result.sort();

    Ok(result)
}
