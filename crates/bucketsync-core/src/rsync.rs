//! Local directory to key prefix mirroring.
//!
//! An [`RsyncConfig`] maps every file under `src` (relative path `p`) to the
//! key `dest/p` and plans the uploads and deletes that make the remote prefix
//! match the directory. Only names the directive's [`Matcher`] accepts are
//! considered on either side.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use bucketsync_client::checksums::file_etag_like;
use bucketsync_model::KeyRecord;
use chrono::{DateTime, Utc};
use tracing::debug;
use walkdir::WalkDir;

use crate::diff::diff;
use crate::error::{CoreError, ExecutorError, Result};
use crate::matcher::Matcher;
use crate::plan::ActionPlan;

/// A regular file found under an rsync source directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    /// `/`-separated path relative to the source directory.
    pub relative: String,
    /// Full path on disk.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// Modification time, or the epoch when unavailable.
    pub modified: DateTime<Utc>,
}

/// One directory-to-prefix directive.
#[derive(Debug, Clone)]
pub struct RsyncConfig {
    src: PathBuf,
    dest: String,
    delete: bool,
    matcher: Matcher,
}

impl RsyncConfig {
    /// Create a directive. `dest` defaults to the bucket root.
    #[must_use]
    pub fn new(src: impl Into<PathBuf>, dest: Option<&str>, delete: bool, matcher: Matcher) -> Self {
        Self {
            src: src.into(),
            dest: normalize_dest(dest.unwrap_or_default()),
            delete,
            matcher,
        }
    }

    /// Source directory.
    #[must_use]
    pub fn src(&self) -> &Path {
        &self.src
    }

    /// Normalised key prefix, without surrounding slashes.
    #[must_use]
    pub fn dest(&self) -> &str {
        &self.dest
    }

    /// Whether remote keys missing locally are deleted.
    #[must_use]
    pub fn delete(&self) -> bool {
        self.delete
    }

    /// Key name for a source-relative path.
    #[must_use]
    pub fn key_for(&self, relative: &str) -> String {
        if self.dest.is_empty() {
            relative.to_owned()
        } else {
            format!("{}/{relative}", self.dest)
        }
    }

    /// Source-relative path of `key`, if the key lies under `dest`.
    #[must_use]
    pub fn relative_for<'a>(&self, key: &'a str) -> Option<&'a str> {
        if self.dest.is_empty() {
            Some(key)
        } else {
            key.strip_prefix(self.dest.as_str())?.strip_prefix('/')
        }
    }

    /// Local file backing `key`.
    #[must_use]
    pub fn local_path_for(&self, key: &str) -> Option<PathBuf> {
        let relative = self.relative_for(key)?;
        Some(relative.split('/').fold(self.src.clone(), |path, part| path.join(part)))
    }

    /// Whether this directive is responsible for `key`.
    #[must_use]
    pub fn governs(&self, key: &str) -> bool {
        self.relative_for(key)
            .is_some_and(|relative| self.matcher.matches(relative))
    }

    /// Every accepted regular file under `src`, sorted by relative path.
    ///
    /// Symbolic links are followed.
    pub async fn local_files(&self) -> Result<Vec<LocalFile>> {
        let src = self.src.clone();
        let matcher = self.matcher.clone();
        tokio::task::spawn_blocking(move || walk(&src, &matcher))
            .await
            .map_err(|e| ExecutorError::TaskFailed(e.to_string()))?
    }

    /// Plan the actions that mirror `src` onto `dest`.
    ///
    /// `remote` is the full bucket snapshot; keys outside `dest` or rejected
    /// by the matcher are ignored. New and modified files are uploaded;
    /// keys missing locally are deleted only when `delete` is set and are
    /// otherwise left out of the plan.
    pub async fn plan(&self, remote: &[KeyRecord]) -> Result<ActionPlan> {
        let governed: Vec<KeyRecord> = remote
            .iter()
            .filter(|k| self.governs(&k.name))
            .cloned()
            .collect();

        let by_name: HashMap<&str, &KeyRecord> =
            governed.iter().map(|k| (k.name.as_str(), k)).collect();

        let files = self.local_files().await?;
        let mut local = Vec::with_capacity(files.len());
        for file in &files {
            let name = self.key_for(&file.relative);
            let etag = match by_name.get(name.as_str()) {
                // Hashing only matters when sizes agree.
                Some(existing) if existing.size == file.size => {
                    file_etag_like(&file.path, &existing.etag)
                        .await
                        .map_err(|e| CoreError::io(&file.path, e))?
                }
                _ => String::new(),
            };
            local.push(KeyRecord::new(name, etag, file.size, file.modified));
        }

        let result = diff(&governed, &local);
        debug!(
            src = %self.src.display(),
            dest = %self.dest,
            new = result.new.len(),
            modified = result.modified.len(),
            removed = result.removed.len(),
            unmodified = result.unmodified.len(),
            "rsync diff"
        );

        let mut plan = ActionPlan::new();
        for name in result.new.iter().chain(&result.modified) {
            if let Some(path) = self.local_path_for(name) {
                plan.add_upload(name.as_str(), path)?;
            }
        }
        if self.delete {
            for name in &result.removed {
                plan.add_delete(name.as_str())?;
            }
        }
        Ok(plan)
    }
}

fn walk(src: &Path, matcher: &Matcher) -> Result<Vec<LocalFile>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(src).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            CoreError::io(path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if !matcher.matches(&relative) {
            continue;
        }
        let metadata = entry
            .metadata()
            .map_err(|e| CoreError::io(entry.path(), e.into()))?;
        let modified = metadata
            .modified()
            .map_or(DateTime::<Utc>::UNIX_EPOCH, DateTime::<Utc>::from);
        files.push(LocalFile {
            relative,
            path: entry.path().to_path_buf(),
            size: metadata.len(),
            modified,
        });
    }
    Ok(files)
}

fn normalize_dest(dest: &str) -> String {
    let mut dest = dest.trim();
    while let Some(rest) = dest.strip_prefix("./") {
        dest = rest;
    }
    if dest == "." {
        return String::new();
    }
    dest.trim_matches('/').to_owned()
}

/// Runs several directives against one remote snapshot and merges their plans.
#[derive(Debug, Clone, Default)]
pub struct RsyncPlanner {
    configs: Vec<RsyncConfig>,
}

impl RsyncPlanner {
    /// Create a planner over `configs`.
    #[must_use]
    pub fn new(configs: Vec<RsyncConfig>) -> Self {
        Self { configs }
    }

    /// The directives.
    #[must_use]
    pub fn configs(&self) -> &[RsyncConfig] {
        &self.configs
    }

    /// Whether there is no directive.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Whether any directive governs `key`.
    #[must_use]
    pub fn governs(&self, key: &str) -> bool {
        self.configs.iter().any(|c| c.governs(key))
    }

    /// Plan every directive and merge the results in order.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Conflict`] as soon as two directives disagree on
    /// a key; no request is made by planning.
    pub async fn plan(&self, remote: &[KeyRecord]) -> Result<ActionPlan> {
        let mut merged = ActionPlan::new();
        for config in &self.configs {
            let plan = config.plan(remote).await?;
            merged = merged.merge(plan)?;
        }
        Ok(merged)
    }
}
