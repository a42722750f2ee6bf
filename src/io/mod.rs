//! Storage and codec plumbing: filesystems, object stores, file codecs.

pub mod cloud;
pub mod codec;
pub mod fs;
pub mod glob;
