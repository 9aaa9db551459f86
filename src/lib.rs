//! dirtally - Parallel Filesystem Accounting
//!
//! Walks one or more directory trees and reports per-directory file
//! counts and byte totals, optionally partitioned by owning user.
//! Built for very large trees on networked storage, where the wall
//! clock is dominated by metadata latency rather than bandwidth.
//!
//! # How it stays fast
//!
//! - **d_type enumeration**: directories are read through the raw
//!   dirent stream, so subdirectories are recognized from the entry
//!   type byte without a stat each.
//!
//! - **Parallel workers**: directory jobs fan out across a worker pool;
//!   each worker feeds newly discovered subdirectories back into the
//!   shared queue, so slow-server latency hides behind concurrency.
//!
//! - **Helper-thread stat fan-out**: a single huge directory splits its
//!   stat work across an extra thread instead of serializing.
//!
//! # Accounting rules
//!
//! Counts and sizes are charged to the owning uid. Hard-linked files
//! (nlink > 1) are charged for size at most once per run, via a
//! concurrent inode set shared by all workers. Subdirectories charge
//! their own entry size and a count of one to their parent. After the
//! walk, a depth-first pass rolls each subtree up into its parent and
//! applies the depth, count/size, and pattern filters.
//!
//! # Example
//!
//! ```bash
//! # Per-directory totals, two levels deep, human sizes
//! dirtally -h -d 2 /data
//!
//! # Per-user hot spots: more than a million files or a terabyte
//! dirtally -u -n 1000000 -k 1T /scratch
//! ```

pub mod config;
pub mod error;
pub mod fs;
pub mod progress;
pub mod tree;
pub mod units;
pub mod users;
pub mod walker;

pub use config::{CliArgs, WalkConfig};
pub use error::{Result, TallyError};
pub use tree::{assemble, Row, TreeIndex};
pub use walker::{Traversal, WalkCoordinator, WalkStats};
