//! Shared hard-link deduplication set
//!
//! One set for the whole run, shared by every worker, so a file
//! hard-linked across two workers' subtrees is still charged once.
//! Sharded by `inode % SHARDS` to keep lock contention off the hot
//! path. Only inodes with `nlink > 1` ever enter the set; singly-linked
//! files cannot collide and skip it entirely.

use std::collections::HashSet;
use std::sync::Mutex;

const SHARDS: usize = 64;

/// Concurrent set of inode numbers already charged for size.
#[derive(Debug)]
pub struct InodeSet {
    shards: Vec<Mutex<HashSet<u64>>>,
}

impl InodeSet {
    pub fn new() -> Self {
        Self {
            shards: (0..SHARDS).map(|_| Mutex::new(HashSet::new())).collect(),
        }
    }

    /// Insert an inode; returns `true` if it was not present before
    /// (first-writer-wins).
    pub fn insert(&self, inode: u64) -> bool {
        self.shards[(inode % SHARDS as u64) as usize]
            .lock()
            .expect("inode shard lock poisoned")
            .insert(inode)
    }

    /// Number of inodes recorded (test/diagnostic use).
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.lock().expect("inode shard lock poisoned").len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InodeSet {
    fn default() -> Self {
        Self::new()
    }
}
