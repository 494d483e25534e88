//! Include/exclude predicate over key names and relative paths.
//!
//! A name is included when no include rule is configured, or when it matches
//! any include glob or include regex. An included name is then rejected if it
//! matches any exclude glob or exclude regex.
//!
//! Globs are shell-style and case-sensitive; `*` also matches `/`. Regexes
//! match anywhere in the name.

use std::fmt;

use globset::{Glob, GlobMatcher};
use regex::Regex;

use crate::error::ConfigError;

#[derive(Clone)]
struct GlobRule {
    source: String,
    matcher: GlobMatcher,
}

impl GlobRule {
    fn new(pattern: &str) -> Result<Self, ConfigError> {
        let glob = Glob::new(pattern).map_err(|source| ConfigError::Glob {
            pattern: pattern.to_owned(),
            source,
        })?;
        Ok(Self {
            source: pattern.to_owned(),
            matcher: glob.compile_matcher(),
        })
    }
}

#[derive(Clone)]
struct RegexRule {
    source: String,
    regex: Regex,
}

impl RegexRule {
    fn new(pattern: &str) -> Result<Self, ConfigError> {
        let regex = Regex::new(pattern).map_err(|source| ConfigError::Regex {
            pattern: pattern.to_owned(),
            source,
        })?;
        Ok(Self {
            source: pattern.to_owned(),
            regex,
        })
    }
}

/// Glob/regex inclusion-exclusion predicate.
///
/// # Examples
///
/// ```
/// use bucketsync_core::matcher::Matcher;
///
/// let matcher = Matcher::builder()
///     .patterns(["*.html"])
///     .ignore_patterns(["drafts/*"])
///     .build()
///     .unwrap();
/// assert!(matcher.matches("index.html"));
/// assert!(!matcher.matches("drafts/post.html"));
/// assert!(!matcher.matches("style.css"));
/// ```
#[derive(Clone, Default)]
pub struct Matcher {
    patterns: Vec<GlobRule>,
    ignore_patterns: Vec<GlobRule>,
    regexes: Vec<RegexRule>,
    ignore_regexes: Vec<RegexRule>,
}

impl Matcher {
    /// A matcher that accepts every name.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start building a matcher from pattern lists.
    #[must_use]
    pub fn builder() -> MatcherBuilder {
        MatcherBuilder::default()
    }

    /// Whether `name` is accepted.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        let included = (self.patterns.is_empty() && self.regexes.is_empty())
            || self.patterns.iter().any(|g| g.matcher.is_match(name))
            || self.regexes.iter().any(|r| r.regex.is_match(name));
        if !included {
            return false;
        }
        !(self.ignore_patterns.iter().any(|g| g.matcher.is_match(name))
            || self.ignore_regexes.iter().any(|r| r.regex.is_match(name)))
    }

    /// Union of the four rule sets of `self` and `other`.
    ///
    /// Combining two allow-lists widens what is accepted. Duplicate rules
    /// are kept once.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            patterns: union_rules(&self.patterns, &other.patterns, |r| &r.source),
            ignore_patterns: union_rules(&self.ignore_patterns, &other.ignore_patterns, |r| {
                &r.source
            }),
            regexes: union_rules(&self.regexes, &other.regexes, |r| &r.source),
            ignore_regexes: union_rules(&self.ignore_regexes, &other.ignore_regexes, |r| {
                &r.source
            }),
        }
    }

    /// Whether no rule of any kind is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
            && self.ignore_patterns.is_empty()
            && self.regexes.is_empty()
            && self.ignore_regexes.is_empty()
    }
}

fn union_rules<T: Clone>(a: &[T], b: &[T], source: impl Fn(&T) -> &String) -> Vec<T> {
    let mut out = a.to_vec();
    for rule in b {
        if !out.iter().any(|r| source(r) == source(rule)) {
            out.push(rule.clone());
        }
    }
    out
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sources = |rules: &[GlobRule]| rules.iter().map(|r| r.source.clone()).collect::<Vec<_>>();
        let regex_sources =
            |rules: &[RegexRule]| rules.iter().map(|r| r.source.clone()).collect::<Vec<_>>();
        f.debug_struct("Matcher")
            .field("patterns", &sources(&self.patterns))
            .field("ignore_patterns", &sources(&self.ignore_patterns))
            .field("regexes", &regex_sources(&self.regexes))
            .field("ignore_regexes", &regex_sources(&self.ignore_regexes))
            .finish()
    }
}

/// Collects pattern lists and compiles them into a [`Matcher`].
#[derive(Debug, Clone, Default)]
pub struct MatcherBuilder {
    patterns: Vec<String>,
    ignore_patterns: Vec<String>,
    regexes: Vec<String>,
    ignore_regexes: Vec<String>,
}

impl MatcherBuilder {
    /// Include globs.
    #[must_use]
    pub fn patterns<I: IntoIterator<Item = S>, S: Into<String>>(mut self, items: I) -> Self {
        self.patterns.extend(items.into_iter().map(Into::into));
        self
    }

    /// Exclude globs.
    #[must_use]
    pub fn ignore_patterns<I: IntoIterator<Item = S>, S: Into<String>>(mut self, items: I) -> Self {
        self.ignore_patterns.extend(items.into_iter().map(Into::into));
        self
    }

    /// Include regexes.
    #[must_use]
    pub fn regexes<I: IntoIterator<Item = S>, S: Into<String>>(mut self, items: I) -> Self {
        self.regexes.extend(items.into_iter().map(Into::into));
        self
    }

    /// Exclude regexes.
    #[must_use]
    pub fn ignore_regexes<I: IntoIterator<Item = S>, S: Into<String>>(mut self, items: I) -> Self {
        self.ignore_regexes.extend(items.into_iter().map(Into::into));
        self
    }

    /// Compile every rule.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Glob`] or [`ConfigError::Regex`] for the first
    /// rule that does not compile.
    pub fn build(self) -> Result<Matcher, ConfigError> {
        let globs = |items: Vec<String>| {
            items
                .iter()
                .map(|p| GlobRule::new(p))
                .collect::<Result<Vec<_>, _>>()
        };
        let regexes = |items: Vec<String>| {
            items
                .iter()
                .map(|p| RegexRule::new(p))
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(Matcher {
            patterns: globs(self.patterns)?,
            ignore_patterns: globs(self.ignore_patterns)?,
            regexes: regexes(self.regexes)?,
            ignore_regexes: regexes(self.ignore_regexes)?,
        })
    }
}
