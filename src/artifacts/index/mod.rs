//! Staging index file format
//!
//! The index persists the STAGED tree as a delta against HEAD: a sorted list
//! of put/delete operations keyed by repo-relative path. The same checksummed
//! binary framing is reused by the digest cache and the auxiliary snapshot
//! caches.
//!
//! ## File Format (version 1)
//!
//! ```text
//! Header (12 bytes):
//!   - Signature: "SODI" (4 bytes)
//!   - Version: 1 (4 bytes)
//!   - Entry count (4 bytes)
//!
//! Entries (variable length):
//!   - Tag byte: 1 = put, 2 = delete
//!   - Path length (4 bytes) + raw path bytes
//!   - For puts: mode (4 bytes) + digest (20 bytes)
//!
//! Checksum (20 bytes):
//!   - SHA-1 hash of all preceding bytes
//! ```

pub(crate) mod checksum;
pub(crate) mod index_entry;

/// Size of the SHA-1 trailer in bytes
pub const CHECKSUM_SIZE: usize = 20;

/// Magic signature identifying staging index files
pub const SIGNATURE: &[u8; 4] = b"SODI";

/// Staging index format version
pub const VERSION: u32 = 1;
