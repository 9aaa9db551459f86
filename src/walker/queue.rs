//! Messages that flow on the walker's queues
//!
//! Three channels connect the pieces: directory jobs (coordinator and
//! workers -> workers), results (workers -> collector), and state
//! updates (workers -> coordinator). Completion updates and progress
//! updates share the state channel; only completion updates touch the
//! submitted/done ledger.

use std::collections::BTreeMap;

/// A unit of work: descend into `cwd/name`.
#[derive(Debug, Clone)]
pub struct DirJob {
    /// Path of the parent directory; empty for root jobs
    pub cwd: String,

    /// Directory name (for root jobs, the root path as supplied)
    pub name: String,

    /// Inode of the parent's DirResult; 0 for roots
    pub parent_inode: u64,

    /// This directory's own inode
    pub inode: u64,
}

impl DirJob {
    /// Full path of the directory this job targets.
    pub fn path(&self) -> String {
        if self.cwd.is_empty() {
            self.name.clone()
        } else {
            crate::fs::join_path(&self.cwd, &self.name)
        }
    }
}

/// Job queue item: a descent or the shutdown sentinel.
#[derive(Debug, Clone)]
pub enum Job {
    Descend(DirJob),
    Shutdown,
}

/// The outcome of counting one directory.
///
/// Sizes are own-size only (this directory's immediate entries); the
/// collector rolls subtrees up afterwards. Ordered maps keep report
/// iteration deterministic.
#[derive(Debug, Clone, Default)]
pub struct DirResult {
    /// Path component (root results carry the root path as supplied)
    pub name: String,

    /// Inode of the parent directory's result; 0 for roots
    pub parent_inode: u64,

    /// This directory's inode, the tree key
    pub inode: u64,

    /// uid -> number of entries charged here
    pub count: BTreeMap<u32, u64>,

    /// uid -> bytes charged here
    pub size: BTreeMap<u32, u64>,
}

impl DirResult {
    pub fn new(name: String, parent_inode: u64, inode: u64) -> Self {
        Self {
            name,
            parent_inode,
            inode,
            count: BTreeMap::new(),
            size: BTreeMap::new(),
        }
    }

    /// Charge one entry to a uid bucket, optionally with its bytes.
    pub fn charge(&mut self, uid: u32, bytes: Option<u64>) {
        *self.count.entry(uid).or_insert(0) += 1;
        if let Some(b) = bytes {
            *self.size.entry(uid).or_insert(0) += b;
        }
    }

    /// Total entries charged in this directory.
    pub fn total_count(&self) -> u64 {
        self.count.values().sum()
    }

    /// Total bytes charged in this directory.
    pub fn total_size(&self) -> u64 {
        self.size.values().sum()
    }
}

/// Updates multiplexed on the state channel.
#[derive(Debug, Clone)]
pub enum StateMsg {
    /// One job finished; `submitted` new jobs were enqueued for it.
    Completed { worker: usize, submitted: u64 },

    /// Counting progress within a directory, for the status reporter.
    Progress {
        path: String,
        files: u64,
        bytes: u64,
    },

    /// A directory was dropped after a recoverable error; the
    /// coordinator keeps the tally for the run summary.
    Skipped,
}
