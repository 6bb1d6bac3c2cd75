//! Two-dimensional point indexes for concurrent spatial generation.
//!
//! Two layers:
//! - [`KdTree`]: an append-only 2-D KD-tree over `(point, payload)` pairs
//!   with square range queries and a balancing rebuild.
//! - [`Forest`]: a regular grid of KD-trees, one per tile, each behind a
//!   reader/writer lock. Readers search tiles independently; writers insert
//!   into single tiles; an [`AreaLock`] write-locks every tile touching a
//!   query square so that a read-then-insert sequence is atomic.
//!
//! Payloads are opaque and copied out of queries; points never move or
//! disappear once inserted.

mod forest;
mod kdtree;

pub use forest::{AreaLock, Forest};
pub use kdtree::KdTree;
