//! Parallel directory walker
//!
//! # Architecture
//!
//! ```text
//!                  ┌──────────────────────────┐
//!                  │      WalkCoordinator     │
//!                  │  seed roots, run barrier │
//!                  └────────────┬─────────────┘
//!                               │ job queue
//!        ┌──────────────────────┼──────────────────────┐
//!        │                      │                      │
//!  ┌─────▼─────┐          ┌─────▼─────┐          ┌─────▼─────┐
//!  │ Worker 0  │          │ Worker 1  │   ...    │ Worker N  │
//!  │  counter  │          │  counter  │          │  counter  │
//!  └─────┬─────┘          └─────┬─────┘          └─────┬─────┘
//!        │  results + state     │                      │
//!        └──────────────────────┴──────────────────────┘
//!                               │
//!                  ┌────────────▼─────────────┐
//!                  │  barrier, then collector │
//!                  └──────────────────────────┘
//! ```
//!
//! Workers push subdirectory jobs back onto the same queue they consume,
//! so the walk fans out by itself; the coordinator's submitted/done
//! ledger is what detects that the fan-out has drained.

pub mod coordinator;
pub mod counter;
pub mod inodes;
pub mod queue;
pub mod worker;

pub use coordinator::{RootEntry, Traversal, WalkCoordinator, WalkStats};
pub use inodes::InodeSet;
pub use queue::{DirJob, DirResult, Job, StateMsg};
pub use worker::Worker;
