//! Configuration for dirtally
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation
//! - Root-list deduplication

use crate::error::ConfigError;
use crate::units::parse_size;
use clap::Parser;
use regex::Regex;
use std::path::PathBuf;

/// Maximum reasonable worker count
pub const MAX_WORKERS: usize = 512;

/// Default worker pool size
pub const DEFAULT_WORKERS: usize = 8;

/// Limit substituted for whichever of file-limit/size-limit was left
/// unset when the other one was given, so the single threshold governs.
const COUPLED_LIMIT: u64 = 1_000_000_000_000_000_000;

/// Parallel per-directory file count and disk usage accounting
#[derive(Parser, Debug, Clone)]
#[command(
    name = "dirtally",
    version,
    about = "Parallel per-directory file count and disk usage accounting",
    long_about = "Walks one or more directory trees with a pool of parallel workers and \
                  reports per-directory file counts and byte totals, optionally split by \
                  owning user. Hard-linked files are charged once per run.",
    after_help = "EXAMPLES:\n    \
        dirtally /data\n    \
        dirtally -u -h /scratch /home\n    \
        dirtally -n 100000 -d 2 /data\n    \
        dirtally --exclude '.*/\\.snapshot/.*' -s 5 /mnt/nfs",
    disable_help_flag = true
)]
pub struct CliArgs {
    /// Directories to walk (default: current directory)
    #[arg(value_name = "DIR")]
    pub roots: Vec<String>,

    /// Emit rows only at depth <= N (roots are depth 0)
    #[arg(short = 'd', long, value_name = "NUM")]
    pub max_depth: Option<usize>,

    /// Minimum file count for a row to be emitted
    #[arg(short = 'n', long, value_name = "NUM")]
    pub file_limit: Option<u64>,

    /// Minimum byte total for a row to be emitted (accepts K/M/G/T suffix)
    #[arg(short = 'k', long, value_name = "BYTES", value_parser = parse_size)]
    pub size_limit: Option<u64>,

    /// Drop paths whose full path matches this pattern
    #[arg(long, value_name = "REGEX")]
    pub exclude: Option<String>,

    /// Keep only paths whose full path matches this pattern
    #[arg(long, value_name = "REGEX")]
    pub include: Option<String>,

    /// Report each directory's own files only; no subtree roll-up
    #[arg(long)]
    pub exclude_subdirs: bool,

    /// Suppress the header row
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// One row per owning user instead of one per directory
    #[arg(short = 'u', long)]
    pub user: bool,

    /// Sizes as %.1f with a binary unit suffix
    #[arg(short = 'h', long)]
    pub human_readable: bool,

    /// Progress line to stderr every S seconds; <= 0 disables
    #[arg(
        short = 's',
        long,
        value_name = "SECS",
        default_value_t = 0.0,
        allow_negative_numbers = true
    )]
    pub status: f64,

    /// Worker pool size
    #[arg(short = 'w', long, default_value_t = DEFAULT_WORKERS, value_name = "NUM")]
    pub workers: usize,

    /// Verbose logging (show per-worker diagnostics)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Print help
    #[arg(long, action = clap::ArgAction::HelpLong)]
    help: Option<bool>,
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct WalkConfig {
    /// Roots to walk, as supplied
    pub roots: Vec<String>,

    /// Number of worker threads
    pub worker_count: usize,

    /// Emit rows only at depth <= max_depth
    pub max_depth: Option<usize>,

    /// Emission threshold on file count
    pub file_limit: u64,

    /// Emission threshold on byte total
    pub size_limit: u64,

    /// Compiled whole-path include pattern
    pub include: Option<Regex>,

    /// Compiled whole-path exclude pattern
    pub exclude: Option<Regex>,

    /// Suppress subtree roll-up
    pub exclude_subdirs: bool,

    /// One row per uid
    pub per_user: bool,

    /// Human-readable sizes in the report
    pub human_readable: bool,

    /// Suppress the header
    pub quiet: bool,

    /// Status interval in seconds; <= 0 disables
    pub status_interval: f64,

    /// Verbose logging
    pub verbose: bool,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            roots: vec![".".to_string()],
            worker_count: DEFAULT_WORKERS,
            max_depth: None,
            file_limit: 0,
            size_limit: 0,
            include: None,
            exclude: None,
            exclude_subdirs: false,
            per_user: false,
            human_readable: false,
            quiet: false,
            status_interval: 0.0,
            verbose: false,
        }
    }
}

impl WalkConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        if args.workers == 0 || args.workers > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: args.workers,
                max: MAX_WORKERS,
            });
        }

        let include = args.include.as_deref().map(compile_anchored).transpose()?;
        let exclude = args.exclude.as_deref().map(compile_anchored).transpose()?;

        // A single threshold governs emission when only one was given.
        let (file_limit, size_limit) = match (args.file_limit, args.size_limit) {
            (Some(n), Some(k)) => (n, k),
            (Some(n), None) => (n, COUPLED_LIMIT),
            (None, Some(k)) => (COUPLED_LIMIT, k),
            (None, None) => (0, 0),
        };

        let roots = if args.roots.is_empty() {
            vec![".".to_string()]
        } else {
            args.roots
        };

        Ok(Self {
            roots,
            worker_count: args.workers,
            max_depth: args.max_depth,
            file_limit,
            size_limit,
            include,
            exclude,
            exclude_subdirs: args.exclude_subdirs,
            per_user: args.user,
            human_readable: args.human_readable,
            quiet: args.quiet,
            status_interval: args.status,
            verbose: args.verbose,
        })
    }

    /// Check if a path matches the exclude pattern
    pub fn excluded(&self, path: &str) -> bool {
        self.exclude.as_ref().is_some_and(|re| re.is_match(path))
    }

    /// Check if a path passes the include pattern (vacuously true when
    /// no pattern is configured)
    pub fn included(&self, path: &str) -> bool {
        self.include.as_ref().map_or(true, |re| re.is_match(path))
    }
}

/// Compile a user pattern so it must match the whole path.
fn compile_anchored(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(&format!("^(?:{pattern})$")).map_err(|e| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Remove roots that lie inside (or duplicate) another supplied root, so
/// no subtree is walked twice. Survivors keep their original order.
pub fn dedup_roots(roots: &[String]) -> Vec<String> {
    let canonical: Vec<Option<PathBuf>> = roots
        .iter()
        .map(|r| std::fs::canonicalize(r).ok())
        .collect();

    let mut order: Vec<usize> = (0..roots.len()).collect();
    order.sort_by(|&a, &b| canonical[a].cmp(&canonical[b]));

    let mut kept_canonical: Vec<&PathBuf> = Vec::new();
    let mut keep = vec![true; roots.len()];
    for &i in &order {
        match &canonical[i] {
            Some(c) => {
                if kept_canonical.iter().any(|k| c.starts_with(k)) {
                    keep[i] = false;
                } else {
                    kept_canonical.push(c);
                }
            }
            // Roots that cannot be resolved fail at seeding instead.
            None => {}
        }
    }

    roots
        .iter()
        .enumerate()
        .filter(|(i, _)| keep[*i])
        .map(|(_, r)| r.clone())
        .collect()
}
