//! Per-key action plan with conflict detection.
//!
//! A plan maps each key to at most one [`Action`]. Adding an action for a
//! key that already has one follows a fixed rule:
//!
//! | existing | incoming | result |
//! |----------|----------|--------|
//! | none     | any      | incoming |
//! | `a`      | `a`      | unchanged |
//! | Delete   | any      | incoming |
//! | any      | Delete   | unchanged |
//! | `a`      | `b`      | [`ConflictError`] |

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::ConflictError;

/// What to do with one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Upload the local file at `path`.
    Upload {
        /// Local source file.
        path: PathBuf,
    },
    /// Re-apply configured headers to the existing object in place.
    Sync,
    /// Write a zero-byte object redirecting to `url`.
    Redirect {
        /// Redirect target.
        url: String,
    },
    /// Remove the key.
    Delete,
}

impl Action {
    /// The action's tag.
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Upload { .. } => ActionKind::Upload,
            Self::Sync => ActionKind::Sync,
            Self::Redirect { .. } => ActionKind::Redirect,
            Self::Delete => ActionKind::Delete,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upload { path } => write!(f, "upload -> {}", path.display()),
            Self::Sync => f.write_str("sync"),
            Self::Redirect { url } => write!(f, "redirect -> {url}"),
            Self::Delete => f.write_str("delete"),
        }
    }
}

/// Tag of an [`Action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionKind {
    /// [`Action::Upload`].
    Upload,
    /// [`Action::Sync`].
    Sync,
    /// [`Action::Redirect`].
    Redirect,
    /// [`Action::Delete`].
    Delete,
}

impl ActionKind {
    /// Lower-case name used in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Sync => "sync",
            Self::Redirect => "redirect",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mapping from key name to its single planned action.
///
/// Iteration is in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionPlan {
    actions: BTreeMap<String, Action>,
}

impl ActionPlan {
    /// An empty plan.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `action` for `key` following the conflict rule.
    ///
    /// # Errors
    ///
    /// Returns [`ConflictError`] when `key` already has a different,
    /// non-delete action and `action` is not a delete.
    pub fn add(&mut self, key: impl Into<String>, action: Action) -> Result<(), ConflictError> {
        let key = key.into();
        match self.actions.get(&key) {
            None | Some(Action::Delete) => {
                self.actions.insert(key, action);
                Ok(())
            }
            Some(existing) if *existing == action || action == Action::Delete => Ok(()),
            Some(existing) => Err(ConflictError {
                existing: existing.clone(),
                incoming: action,
                key,
            }),
        }
    }

    /// Plan an upload of `path` to `key`.
    pub fn add_upload(
        &mut self,
        key: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Result<(), ConflictError> {
        self.add(key, Action::Upload { path: path.into() })
    }

    /// Plan an in-place header sync of `key`.
    pub fn add_sync(&mut self, key: impl Into<String>) -> Result<(), ConflictError> {
        self.add(key, Action::Sync)
    }

    /// Plan a redirect of `key` to `url`.
    pub fn add_redirect(
        &mut self,
        key: impl Into<String>,
        url: impl Into<String>,
    ) -> Result<(), ConflictError> {
        self.add(key, Action::Redirect { url: url.into() })
    }

    /// Plan the deletion of `key`.
    pub fn add_delete(&mut self, key: impl Into<String>) -> Result<(), ConflictError> {
        self.add(key, Action::Delete)
    }

    /// Drop every entry whose action kind is in `kinds`.
    pub fn remove_actions(&mut self, kinds: &[ActionKind]) {
        self.actions.retain(|_, action| !kinds.contains(&action.kind()));
    }

    /// Combine two plans: `other`'s entries are added first, then `self`'s.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConflictError`] encountered.
    pub fn merge(self, other: Self) -> Result<Self, ConflictError> {
        let mut merged = Self::new();
        for (key, action) in other.actions.into_iter().chain(self.actions) {
            merged.add(key, action)?;
        }
        Ok(merged)
    }

    /// Action planned for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Action> {
        self.actions.get(key)
    }

    /// Whether `key` has any action.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.actions.contains_key(key)
    }

    /// Keys with any action.
    pub fn affected_keys(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    /// Uploads as `(key, local path)`.
    pub fn to_upload(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.actions.iter().filter_map(|(k, a)| match a {
            Action::Upload { path } => Some((k.as_str(), path.as_path())),
            _ => None,
        })
    }

    /// Keys to sync.
    pub fn to_sync(&self) -> impl Iterator<Item = &str> {
        self.keys_of(ActionKind::Sync)
    }

    /// Redirects as `(key, url)`.
    pub fn to_redirect(&self) -> impl Iterator<Item = (&str, &str)> {
        self.actions.iter().filter_map(|(k, a)| match a {
            Action::Redirect { url } => Some((k.as_str(), url.as_str())),
            _ => None,
        })
    }

    /// Keys to delete.
    pub fn to_delete(&self) -> impl Iterator<Item = &str> {
        self.keys_of(ActionKind::Delete)
    }

    /// Number of entries of `kind`.
    #[must_use]
    pub fn count(&self, kind: ActionKind) -> usize {
        self.keys_of(kind).count()
    }

    /// Every `(key, action)` entry.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Action)> {
        self.actions.iter().map(|(k, a)| (k.as_str(), a))
    }

    /// Number of keys with an action.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the plan is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    fn keys_of(&self, kind: ActionKind) -> impl Iterator<Item = &str> {
        self.actions
            .iter()
            .filter(move |(_, a)| a.kind() == kind)
            .map(|(k, _)| k.as_str())
    }
}
