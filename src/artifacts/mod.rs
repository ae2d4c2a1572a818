//! Value types and algorithms
//!
//! - `objects`: digests, trees, commits and their canonical serialization
//! - `index`: staging-operation and stat-signature records, checksummed
//!   binary framing
//! - `pathspec`: glob patterns over repo-relative byte paths
//! - `diff`: change sets, rename/copy pairing, filters and output
//! - `log`: commit-chain traversal
//! - `aux`: auxiliary data store model (URL templates, snapshot sources,
//!   reverse digest indexes)

pub(crate) mod aux;
pub(crate) mod diff;
pub(crate) mod index;
pub(crate) mod log;
pub(crate) mod objects;
pub(crate) mod pathspec;
