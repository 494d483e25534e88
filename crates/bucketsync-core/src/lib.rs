//! Reconciliation engine for bucketsync.
//!
//! Compares a bucket with its declarative description and the local
//! directories mirrored into it, plans a conflict-free set of per-key
//! actions, and executes them with bounded concurrency.
//!
//! # Flow
//!
//! ```text
//! BucketConfig --Connector--> Bucket
//!   Bucket::sync
//!     create -> bucket attributes -> list keys
//!     RsyncPlanner (walk + diff per directive, merged) -> ActionPlan
//!     Executor: uploads / syncs -> bulk delete -> redirects
//! ```
//!
//! # Modules
//!
//! - [`bucket`] - Orchestrator and bucket attribute requests
//! - [`config`] - YAML configuration and bucket construction
//! - [`diff`] - Snapshot comparison
//! - [`error`] - Error taxonomy
//! - [`executor`] - Bounded, re-entrant worker pool
//! - [`key`] - Upload, sync, redirect and delete of single keys
//! - [`keyconfig`] - Ordered per-key attribute rules
//! - [`matcher`] - Glob/regex include-exclude predicate
//! - [`plan`] - Per-key action plan with conflict detection
//! - [`rsync`] - Directory to key prefix mirroring

pub mod bucket;
pub mod config;
pub mod diff;
pub mod error;
pub mod executor;
pub mod key;
pub mod keyconfig;
pub mod matcher;
pub mod plan;
pub mod rsync;

#[cfg(test)]
mod test_support;

pub use bucket::{Bucket, BucketAttributes, SyncOptions, SyncReport, SyncState};
pub use config::{BucketConfig, Connector, load_config, parse_config};
pub use diff::{DiffResult, diff};
pub use error::{ConfigError, ConflictError, CoreError, ExecutorError, Result};
pub use executor::{DEFAULT_CONCURRENCY, Executor};
pub use key::KeyOperations;
pub use keyconfig::{KeyAttributes, KeyConfigurator, KeyFactory, KeyOverrides};
pub use matcher::Matcher;
pub use plan::{Action, ActionKind, ActionPlan};
pub use rsync::{RsyncConfig, RsyncPlanner};
