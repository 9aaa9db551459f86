//! Walk coordinator - seeds the queues, runs the completion barrier,
//! and collects results
//!
//! Completion is a ledger, not a guess: every job's completion update
//! carries the number of jobs it enqueued, the seed update carries the
//! number of roots (plus one for itself), and the walk is over exactly
//! when total submitted equals total done across all workers. Only then
//! are the shutdown sentinels pushed, so no worker can exit while work
//! remains.

use crate::config::{dedup_roots, WalkConfig};
use crate::error::{Result, TallyError};
use crate::fs;
use crate::progress::StatusReporter;
use crate::walker::inodes::InodeSet;
use crate::walker::queue::{DirJob, DirResult, Job, StateMsg};
use crate::walker::worker::Worker;
use crossbeam_channel::unbounded;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// A root that survived deduplication and the seeding lstat.
#[derive(Debug, Clone)]
pub struct RootEntry {
    /// The path as the user supplied it; report paths grow from this
    pub display: String,

    /// The root directory's inode, its key in the assembled tree
    pub inode: u64,
}

/// Aggregate statistics for a completed walk
#[derive(Debug, Clone, Default)]
pub struct WalkStats {
    pub dirs: u64,
    pub files: u64,
    pub bytes: u64,
    pub errors: u64,
    pub skipped: u64,
    pub duration: Duration,
}

/// Everything the collector needs from a finished traversal.
#[derive(Debug)]
pub struct Traversal {
    /// One DirResult per successfully counted directory
    pub results: Vec<DirResult>,

    /// Surviving roots in the order the user supplied them
    pub roots: Vec<RootEntry>,

    /// Run statistics
    pub stats: WalkStats,

    /// Unrecoverable errors that killed individual workers; the walk
    /// still produced results for everything counted before each abort
    pub worker_errors: Vec<TallyError>,
}

/// Coordinates the parallel walk
pub struct WalkCoordinator {
    config: Arc<WalkConfig>,
}

impl WalkCoordinator {
    pub fn new(config: WalkConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Run the walk to completion and return the raw results.
    pub fn run(self) -> Result<Traversal> {
        let start = Instant::now();

        let roots = self.seed_roots();

        let (jobs_tx, jobs_rx) = unbounded::<Job>();
        let (results_tx, results_rx) = unbounded::<Option<DirResult>>();
        let (state_tx, state_rx) = unbounded::<StateMsg>();

        // Seed the ledger first: the update counts itself plus the root
        // jobs pushed right after it.
        state_tx
            .send(StateMsg::Completed {
                worker: 0,
                submitted: 1 + roots.len() as u64,
            })
            .map_err(|_| TallyError::ChannelClosed)?;

        for root in &roots {
            jobs_tx
                .send(Job::Descend(DirJob {
                    cwd: String::new(),
                    name: root.display.clone(),
                    parent_inode: 0,
                    inode: root.inode,
                }))
                .map_err(|_| TallyError::ChannelClosed)?;
        }

        let inodes = Arc::new(InodeSet::new());
        let worker_count = self.config.worker_count;
        let mut workers = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            workers.push(Worker::spawn(
                id,
                Arc::clone(&self.config),
                Arc::clone(&inodes),
                jobs_rx.clone(),
                jobs_tx.clone(),
                results_tx.clone(),
                state_tx.clone(),
            )?);
        }
        debug!(count = workers.len(), "workers spawned");

        // Barrier: consume state updates until submitted and done
        // balance across all workers.
        let mut reporter = StatusReporter::new(self.config.status_interval);
        let mut submitted = vec![0u64; worker_count];
        let mut done = vec![0u64; worker_count];
        let mut skipped = 0u64;

        loop {
            match state_rx.recv() {
                Ok(StateMsg::Completed {
                    worker,
                    submitted: s,
                }) => {
                    submitted[worker] += s;
                    done[worker] += 1;
                    if submitted.iter().sum::<u64>() == done.iter().sum::<u64>() {
                        break;
                    }
                }
                Ok(StateMsg::Progress { path, files, bytes }) => {
                    reporter.observe(&path, files, bytes);
                }
                Ok(StateMsg::Skipped) => skipped += 1,
                Err(_) => return Err(TallyError::ChannelClosed),
            }
        }
        drop(reporter);

        // Release the workers and the result drain.
        for _ in 0..worker_count {
            jobs_tx
                .send(Job::Shutdown)
                .map_err(|_| TallyError::ChannelClosed)?;
        }
        results_tx
            .send(None)
            .map_err(|_| TallyError::ChannelClosed)?;

        let mut results = Vec::new();
        loop {
            match results_rx.recv() {
                Ok(Some(result)) => results.push(result),
                Ok(None) => break,
                Err(_) => return Err(TallyError::ChannelClosed),
            }
        }

        let mut worker_errors = Vec::new();
        for worker in workers {
            let id = worker.id();
            if let Err(e) = worker.join() {
                warn!(worker = id, error = %e, "worker terminated with error");
                worker_errors.push(e);
            }
        }

        // The results themselves are the accounting; the summary just
        // re-reads them.
        let stats = WalkStats {
            dirs: results.len() as u64,
            files: results.iter().map(DirResult::total_count).sum(),
            bytes: results.iter().map(DirResult::total_size).sum(),
            errors: worker_errors.len() as u64,
            skipped,
            duration: start.elapsed(),
        };

        info!(
            dirs = stats.dirs,
            files = stats.files,
            bytes = stats.bytes,
            errors = stats.errors,
            skipped = stats.skipped,
            duration_ms = stats.duration.as_millis() as u64,
            "walk completed"
        );

        Ok(Traversal {
            results,
            roots,
            stats,
            worker_errors,
        })
    }

    /// Deduplicate, lstat, and keep the roots worth walking.
    fn seed_roots(&self) -> Vec<RootEntry> {
        let mut out = Vec::new();
        for root_path in dedup_roots(&self.config.roots) {
            match fs::lstat_meta(&root_path) {
                Ok(meta) if meta.is_dir => out.push(RootEntry {
                    inode: meta.inode,
                    display: root_path,
                }),
                Ok(_) => {
                    eprintln!("# could not access dir,file or file in dir {root_path}");
                    warn!(root = %root_path, "root is not a directory, skipping");
                }
                Err(errno) if errno == nix::errno::Errno::EACCES => {
                    eprintln!("# access denied to directory {root_path}");
                }
                Err(_) => {
                    eprintln!("# could not access dir,file or file in dir {root_path}");
                }
            }
        }
        out
    }
}
