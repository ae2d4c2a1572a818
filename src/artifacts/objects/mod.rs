//! Digest-addressed objects
//!
//! Sod persists two kinds of objects: trees and commits. Unlike a
//! content-storing VCS there are no blob objects; a tree entry carries the
//! content digest of the working-tree file directly.

pub(crate) mod commit;
pub(crate) mod digest;
pub(crate) mod entry_mode;
pub(crate) mod object;
pub(crate) mod object_type;
pub(crate) mod tree;

/// Length of a digest in lowercase hex characters
pub const DIGEST_HEX_LENGTH: usize = 40;

/// Length of a digest in raw bytes
pub const DIGEST_RAW_LENGTH: usize = 20;

/// Minimum display width of an abbreviated digest
pub const DIGEST_ABBREV_MIN: usize = 10;

/// Block size used when streaming file contents into the hasher
pub const HASH_BLOCK_SIZE: usize = 65536;
