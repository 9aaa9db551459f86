//! Worker threads
//!
//! Each worker loops on the job queue: dequeue, count the directory,
//! repeat until the shutdown sentinel. Workers keep no counters of
//! their own - everything the run summary needs already flows out on
//! the result and state channels - and share no mutable state beyond
//! those channels and the inode set, so one worker aborting on an
//! unrecoverable error leaves the rest draining the queue.

use crate::config::WalkConfig;
use crate::error::{Result, WorkerError};
use crate::walker::counter::count_directory;
use crate::walker::inodes::InodeSet;
use crate::walker::queue::{DirResult, Job, StateMsg};
use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

/// A worker thread processing directory jobs
pub struct Worker {
    id: usize,
    handle: Option<JoinHandle<Result<()>>>,
}

impl Worker {
    /// Spawn a new worker thread
    pub fn spawn(
        id: usize,
        config: Arc<WalkConfig>,
        inodes: Arc<InodeSet>,
        jobs_rx: Receiver<Job>,
        jobs_tx: Sender<Job>,
        results_tx: Sender<Option<DirResult>>,
        state_tx: Sender<StateMsg>,
    ) -> std::result::Result<Self, WorkerError> {
        let handle = thread::Builder::new()
            .name(format!("tally-{id}"))
            .spawn(move || {
                worker_loop(id, config, inodes, jobs_rx, jobs_tx, results_tx, state_tx)
            })
            .map_err(|e| WorkerError::InitFailed {
                id,
                reason: e.to_string(),
            })?;

        Ok(Self {
            id,
            handle: Some(handle),
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Wait for the worker to finish
    pub fn join(mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => match handle.join() {
                Ok(result) => result,
                Err(_) => Err(WorkerError::Panicked { id: self.id }.into()),
            },
            None => Ok(()),
        }
    }
}

fn worker_loop(
    id: usize,
    config: Arc<WalkConfig>,
    inodes: Arc<InodeSet>,
    jobs_rx: Receiver<Job>,
    jobs_tx: Sender<Job>,
    results_tx: Sender<Option<DirResult>>,
    state_tx: Sender<StateMsg>,
) -> Result<()> {
    debug!(worker = id, "worker starting");

    loop {
        let job = match jobs_rx.recv() {
            Ok(Job::Descend(job)) => job,
            Ok(Job::Shutdown) | Err(_) => break,
        };

        if let Err(e) = count_directory(
            &job, id, &config, &inodes, &jobs_tx, &results_tx, &state_tx,
        ) {
            error!(worker = id, path = %job.path(), error = %e, "worker aborting");
            return Err(e);
        }
    }

    debug!(worker = id, "worker shutting down");
    Ok(())
}
