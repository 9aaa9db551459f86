//! Error types for dirtally
//!
//! Structured errors live here; the binary wraps them with `anyhow`
//! context at the top level. Recoverable per-directory failures
//! (`EACCES`, `ENOENT`) never become errors - the walker logs a notice
//! and moves on - so everything in this module is fatal for at least
//! one worker.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the dirtally library
#[derive(Error, Debug)]
pub enum TallyError {
    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Worker/concurrency errors
    #[error("worker error: {0}")]
    Worker(#[from] WorkerError),

    /// A syscall failed with an errno the walker does not recover from
    #[error("{path}: {source}")]
    Syscall {
        path: String,
        source: nix::errno::Errno,
    },

    /// I/O errors (root canonicalization, report writing)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel closed unexpectedly
    #[error("channel closed unexpectedly")]
    ChannelClosed,
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid worker count
    #[error("invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Invalid include/exclude pattern
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A root is missing, unreadable, or not a directory
    #[error("invalid root '{path}': {reason}")]
    InvalidRoot { path: PathBuf, reason: String },
}

/// Worker thread errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Worker panicked
    #[error("worker {id} panicked")]
    Panicked { id: usize },

    /// Worker thread could not be spawned
    #[error("failed to start worker {id}: {reason}")]
    InitFailed { id: usize, reason: String },

    /// Stat helper thread panicked
    #[error("stat helper panicked in {path}")]
    HelperPanicked { path: String },

    /// Job queue send failed (receivers gone)
    #[error("failed to enqueue directory job: queue closed")]
    QueueSendFailed,
}

/// Result type alias for TallyError
pub type Result<T> = std::result::Result<T, TallyError>;
