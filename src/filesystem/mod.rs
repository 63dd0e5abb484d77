//! Filesystem snapshot model used by the polling reconciler.
//!
//! A [`Tree`] is a flat, scan-ordered map from [`RelativePath`] to [`Entry`].
//! Trees are rebuilt from scratch on every pass and compared with each other
//! by relative path only.

mod entry;
mod fingerprint;
mod scanner;
mod tree;

pub use entry::{Entry, EntryKind, MirrorPath, RelativePath, SyncRoots};
pub use fingerprint::{CHUNK_SIZE, ContentHash, FingerprintError};
pub use scanner::{ScanError, Scanner};
pub use tree::Tree;
