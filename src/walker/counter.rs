//! Per-directory counting
//!
//! One invocation handles exactly one directory: enumerate, partition
//! into files and subdirectories, stat the files (fanning out to a
//! helper thread above a threshold), charge per-uid count/size buckets
//! under the hard-link rule, then stat and enqueue the subdirectories.
//! Every job ends with exactly one completion update on the state
//! channel, whatever happened, so the coordinator's ledger always
//! balances. Skips ride the same channel; nothing is tallied outside
//! the DirResults and state messages this function emits.

use crate::config::WalkConfig;
use crate::error::{Result, TallyError, WorkerError};
use crate::fs::{self, DirEntry, DirStream, EntryKind, FileMeta};
use crate::walker::inodes::InodeSet;
use crate::walker::queue::{DirJob, DirResult, Job, StateMsg};
use crossbeam_channel::Sender;
use nix::errno::Errno;
use std::thread;
use tracing::trace;

/// Directories with more entries to stat than this use the helper-thread
/// fan-out path.
pub const LARGE_DIR_THRESHOLD: usize = 1000;

/// Number of contiguous slices the stat work splits into.
pub const STAT_SPLIT: usize = 2;

/// Counted entries between progress updates within one directory.
const PROGRESS_EVERY: u64 = 10_000;

/// Count one directory, emitting its DirResult and completion update.
///
/// Recoverable failures (`EACCES`, `ENOENT`) are logged as `# `-prefixed
/// stderr notices and skipped; anything else is fatal for the calling
/// worker, but the completion update is sent first so the barrier still
/// fires.
pub fn count_directory(
    job: &DirJob,
    worker_id: usize,
    config: &WalkConfig,
    inodes: &InodeSet,
    jobs_tx: &Sender<Job>,
    results_tx: &Sender<Option<DirResult>>,
    state_tx: &Sender<StateMsg>,
) -> Result<()> {
    let path = job.path();

    let mut stream = match DirStream::open(&path) {
        Ok(stream) => stream,
        Err(errno) => {
            notice(errno, &path, true);
            if fs::recoverable(errno) {
                skip(state_tx);
                return complete(state_tx, worker_id, 0);
            }
            complete(state_tx, worker_id, 0)?;
            return Err(TallyError::Syscall {
                path,
                source: errno,
            });
        }
    };

    // Partition. The exclude pattern prunes here, before any stat, so an
    // excluded subtree costs nothing.
    let mut dirs: Vec<String> = Vec::new();
    let mut files: Vec<DirEntry> = Vec::new();
    for entry in stream.entries() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(errno) => {
                notice(errno, &path, true);
                if fs::recoverable(errno) {
                    skip(state_tx);
                    return complete(state_tx, worker_id, 0);
                }
                complete(state_tx, worker_id, 0)?;
                return Err(TallyError::Syscall {
                    path,
                    source: errno,
                });
            }
        };

        let child = fs::join_path(&path, &entry.name);
        if config.excluded(&child) {
            continue;
        }
        match entry.kind {
            EntryKind::Dir => dirs.push(entry.name),
            _ => files.push(entry),
        }
    }
    drop(stream);

    // Stat the non-directories, fanning out for large directories.
    let metas = match stat_files(&path, &files) {
        Ok(metas) => metas,
        Err(e) => {
            complete(state_tx, worker_id, 0)?;
            return Err(e);
        }
    };

    let mut result = DirResult::new(job.name.clone(), job.parent_inode, job.inode);
    let mut ticker = Progress::default();

    // Files first; subdirectories only after every file is charged.
    let mut promoted: Vec<(String, FileMeta)> = Vec::new();
    for (entry, meta) in metas {
        if entry.kind == EntryKind::Unknown && meta.is_dir {
            // The filesystem carried no d_type; the stat says directory.
            promoted.push((entry.name, meta));
            continue;
        }

        let child = fs::join_path(&path, &entry.name);
        if !config.included(&child) {
            continue;
        }

        let charged = meta.nlink == 1 || inodes.insert(meta.inode);
        result.charge(meta.uid, charged.then_some(meta.size));
        ticker.tick(state_tx, &path, if charged { meta.size } else { 0 });
    }

    // Single-shot stat over the subdirectories seen via d_type.
    let mut subdirs: Vec<(String, FileMeta)> = promoted;
    for name in dirs {
        let child = fs::join_path(&path, &name);
        match fs::lstat_meta(&child) {
            Ok(meta) if meta.is_dir => subdirs.push((name, meta)),
            Ok(_) => trace!(worker = worker_id, path = %child, "entry changed type mid-walk"),
            Err(errno) if fs::recoverable(errno) => {
                notice(errno, &child, false);
                skip(state_tx);
            }
            Err(errno) => {
                complete(state_tx, worker_id, 0)?;
                return Err(TallyError::Syscall {
                    path: child,
                    source: errno,
                });
            }
        }
    }

    let mut submitted = 0u64;
    for (name, meta) in subdirs {
        let child = fs::join_path(&path, &name);

        // An include-filtered subdirectory is still descended so its
        // matching descendants are found; only the local charge is
        // withheld.
        if config.included(&child) {
            result.charge(meta.uid, Some(meta.size));
            ticker.tick(state_tx, &path, meta.size);
        }

        let descend = Job::Descend(DirJob {
            cwd: path.clone(),
            name,
            parent_inode: job.inode,
            inode: meta.inode,
        });
        if jobs_tx.send(descend).is_err() {
            complete(state_tx, worker_id, submitted)?;
            return Err(WorkerError::QueueSendFailed.into());
        }
        submitted += 1;
    }

    ticker.flush(state_tx, &path);

    results_tx
        .send(Some(result))
        .map_err(|_| TallyError::ChannelClosed)?;
    complete(state_tx, worker_id, submitted)
}

/// Stat a directory's non-dir entries, splitting across a helper thread
/// when the directory is large.
fn stat_files(path: &str, files: &[DirEntry]) -> Result<Vec<(DirEntry, FileMeta)>> {
    if files.len() <= LARGE_DIR_THRESHOLD {
        return stat_slice(path, files);
    }

    let mid = files.len() / STAT_SPLIT;
    let (head, tail) = files.split_at(mid);
    thread::scope(|scope| {
        let helper = scope.spawn(move || stat_slice(path, tail));
        let mut out = stat_slice(path, head)?;
        let mut rest = helper
            .join()
            .map_err(|_| WorkerError::HelperPanicked {
                path: path.to_string(),
            })??;
        out.append(&mut rest);
        Ok(out)
    })
}

/// Stat one contiguous slice, logging and dropping unreachable entries.
fn stat_slice(dir: &str, entries: &[DirEntry]) -> Result<Vec<(DirEntry, FileMeta)>> {
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        let child = fs::join_path(dir, &entry.name);
        match fs::lstat_meta(&child) {
            Ok(meta) => out.push((entry.clone(), meta)),
            Err(errno) if fs::recoverable(errno) => notice(errno, &child, false),
            Err(errno) => {
                return Err(TallyError::Syscall {
                    path: child,
                    source: errno,
                })
            }
        }
    }
    Ok(out)
}

/// Send the completion update for one job.
fn complete(state_tx: &Sender<StateMsg>, worker: usize, submitted: u64) -> Result<()> {
    state_tx
        .send(StateMsg::Completed { worker, submitted })
        .map_err(|_| TallyError::ChannelClosed)
}

/// Record a recoverable skip for the run summary.
fn skip(state_tx: &Sender<StateMsg>) {
    let _ = state_tx.send(StateMsg::Skipped);
}

/// Progress accumulator: one update every `PROGRESS_EVERY` counted
/// entries and one at the end of the directory.
#[derive(Default)]
struct Progress {
    files: u64,
    bytes: u64,
}

impl Progress {
    fn tick(&mut self, state_tx: &Sender<StateMsg>, path: &str, bytes: u64) {
        self.files += 1;
        self.bytes += bytes;
        if self.files == PROGRESS_EVERY {
            self.emit(state_tx, path);
        }
    }

    fn flush(&mut self, state_tx: &Sender<StateMsg>, path: &str) {
        self.emit(state_tx, path);
    }

    fn emit(&mut self, state_tx: &Sender<StateMsg>, path: &str) {
        let _ = state_tx.send(StateMsg::Progress {
            path: path.to_string(),
            files: self.files,
            bytes: self.bytes,
        });
        self.files = 0;
        self.bytes = 0;
    }
}

/// Normative stderr notice for a path the walk skips.
fn notice(errno: Errno, path: &str, directory: bool) {
    if directory && errno == Errno::EACCES {
        eprintln!("# access denied to directory {path}");
    } else if fs::recoverable(errno) {
        eprintln!("# could not access dir,file or file in dir {path}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::fs::File;
    use std::io::Write;
    use std::os::unix::fs::MetadataExt;

    fn run_one(dir: &std::path::Path, config: &WalkConfig) -> (DirResult, u64) {
        let (jobs_tx, _jobs_rx) = unbounded();
        let (results_tx, results_rx) = unbounded();
        let (state_tx, state_rx) = unbounded();
        let inodes = InodeSet::new();

        let meta = fs::lstat_meta(dir.to_str().unwrap()).unwrap();
        let job = DirJob {
            cwd: String::new(),
            name: dir.to_str().unwrap().to_string(),
            parent_inode: 0,
            inode: meta.inode,
        };

        count_directory(&job, 0, config, &inodes, &jobs_tx, &results_tx, &state_tx).unwrap();

        let result = results_rx.try_recv().unwrap().unwrap();
        let submitted = state_rx
            .try_iter()
            .find_map(|m| match m {
                StateMsg::Completed { submitted, .. } => Some(submitted),
                _ => None,
            })
            .unwrap();
        (result, submitted)
    }

    #[test]
    fn counts_files_and_enqueues_subdirs() {
        let tmp = tempfile::tempdir().unwrap();
        File::create(tmp.path().join("f1"))
            .unwrap()
            .write_all(&[0u8; 10])
            .unwrap();
        File::create(tmp.path().join("f2"))
            .unwrap()
            .write_all(&[0u8; 20])
            .unwrap();
        std::fs::create_dir(tmp.path().join("d")).unwrap();
        let d_size = std::fs::symlink_metadata(tmp.path().join("d")).unwrap().len();

        let config = WalkConfig::default();
        let (result, submitted) = run_one(tmp.path(), &config);

        assert_eq!(submitted, 1);
        assert_eq!(result.total_count(), 3);
        assert_eq!(result.total_size(), 30 + d_size);
    }

    #[test]
    fn hard_links_are_charged_once() {
        let tmp = tempfile::tempdir().unwrap();
        let f1 = tmp.path().join("f1");
        File::create(&f1).unwrap().write_all(&[0u8; 100]).unwrap();
        std::fs::hard_link(&f1, tmp.path().join("f2")).unwrap();

        let config = WalkConfig::default();
        let (result, _) = run_one(tmp.path(), &config);

        assert_eq!(result.total_count(), 2);
        assert_eq!(result.total_size(), 100);
    }

    #[test]
    fn include_skips_files_but_still_descends() {
        let tmp = tempfile::tempdir().unwrap();
        File::create(tmp.path().join("f1"))
            .unwrap()
            .write_all(&[0u8; 10])
            .unwrap();
        std::fs::create_dir(tmp.path().join("d")).unwrap();

        let mut config = WalkConfig::default();
        config.include = Some(regex::Regex::new("^(?:.*/d/.*)$").unwrap());

        let (result, submitted) = run_one(tmp.path(), &config);
        // Nothing matched locally, but the subdir was still enqueued.
        assert_eq!(result.total_count(), 0);
        assert_eq!(submitted, 1);
    }

    #[test]
    fn excluded_entries_are_pruned() {
        let tmp = tempfile::tempdir().unwrap();
        File::create(tmp.path().join("keep")).unwrap();
        std::fs::create_dir(tmp.path().join("skipdir")).unwrap();

        let mut config = WalkConfig::default();
        config.exclude = Some(regex::Regex::new("^(?:.*/skipdir)$").unwrap());

        let (result, submitted) = run_one(tmp.path(), &config);
        assert_eq!(submitted, 0);
        assert_eq!(result.total_count(), 1);
    }

    #[test]
    fn fanned_out_stat_matches_sequential_totals() {
        let tmp = tempfile::tempdir().unwrap();
        let n = LARGE_DIR_THRESHOLD + 500;
        for i in 0..n {
            File::create(tmp.path().join(format!("f{i}")))
                .unwrap()
                .write_all(&[0u8; 3])
                .unwrap();
        }

        let config = WalkConfig::default();
        let (result, _) = run_one(tmp.path(), &config);
        assert_eq!(result.total_count(), n as u64);
        assert_eq!(result.total_size(), 3 * n as u64);

        let uid = std::fs::symlink_metadata(tmp.path()).unwrap().uid();
        assert_eq!(result.count[&uid], n as u64);
    }

    #[test]
    fn missing_directory_completes_without_result() {
        let (jobs_tx, _jobs_rx) = unbounded();
        let (results_tx, results_rx) = unbounded();
        let (state_tx, state_rx) = unbounded();
        let inodes = InodeSet::new();
        let config = WalkConfig::default();

        let job = DirJob {
            cwd: String::new(),
            name: "/nonexistent/definitely/missing".into(),
            parent_inode: 0,
            inode: 7,
        };
        count_directory(&job, 0, &config, &inodes, &jobs_tx, &results_tx, &state_tx).unwrap();

        assert!(results_rx.try_recv().is_err());
        let msgs: Vec<StateMsg> = state_rx.try_iter().collect();
        assert!(msgs.iter().any(|m| matches!(m, StateMsg::Skipped)));
        assert!(msgs
            .iter()
            .any(|m| matches!(m, StateMsg::Completed { submitted: 0, .. })));
    }
}
