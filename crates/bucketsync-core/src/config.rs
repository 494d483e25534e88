//! Declarative bucket configuration.
//!
//! A configuration document is YAML holding either one bucket mapping or a
//! list of them:
//!
//! ```yaml
//! - bucket: www.example.com
//!   region: eu-west-1
//!   cors: null            # revert to no CORS configuration
//!   versioning: true
//!   key_config:
//!     - patterns: ["*.html"]
//!       cache_control: no-cache
//!   rsync:
//!     src: site/
//!     dest: /
//!     delete: true
//!   redirects:
//!     - [old.html, /new.html]
//! ```
//!
//! Unknown fields are rejected. Fields that can be reverted distinguish
//! "absent" (leave alone) from `null` (revert to default).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bucketsync_auth::Credentials;
use bucketsync_client::{ClientConfig, HttpTransport, MetricsSink, NoopMetrics, ReqwestTransport, S3Client};
use serde::de::{Error as _, Unexpected};
use serde::{Deserialize, Deserializer};

use crate::bucket::{Bucket, BucketAttributes};
use crate::error::{ConfigError, Result};
use crate::keyconfig::{KeyConfigurator, KeyFactory, KeyOverrides};
use crate::matcher::Matcher;
use crate::rsync::{RsyncConfig, RsyncPlanner};

/// Keeps an explicit `null` as `Some(None)` instead of collapsing it.
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// One bucket as written in the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BucketConfig {
    /// Bucket name.
    pub bucket: String,
    /// Access key id; falls back to the command line, then the environment.
    #[serde(default)]
    pub access_key_id: Option<String>,
    /// Secret access key; same fallbacks as `access_key_id`.
    #[serde(default)]
    pub secret_access_key: Option<String>,
    /// Endpoint host name.
    #[serde(default)]
    pub hostname: Option<String>,
    /// Use `https` (default) or `http`.
    #[serde(default)]
    pub secure: Option<bool>,
    /// Address the bucket in the path instead of the host name.
    #[serde(default)]
    pub path_style: Option<bool>,
    /// Location constraint used at creation.
    #[serde(default)]
    pub region: Option<String>,
    /// Canned ACL used at creation.
    #[serde(default)]
    pub canned_acl: Option<String>,
    /// Access control policy document.
    #[serde(default, deserialize_with = "deserialize_some")]
    pub acl: Option<Option<String>>,
    /// CORS configuration document.
    #[serde(default, deserialize_with = "deserialize_some")]
    pub cors: Option<Option<String>>,
    /// Lifecycle configuration document.
    #[serde(default, deserialize_with = "deserialize_some")]
    pub lifecycle: Option<Option<String>>,
    /// Logging status document.
    #[serde(default, deserialize_with = "deserialize_some")]
    pub logging: Option<Option<String>>,
    /// Notification configuration document.
    #[serde(default, deserialize_with = "deserialize_some")]
    pub notification: Option<Option<String>>,
    /// Bucket policy.
    #[serde(default, deserialize_with = "deserialize_some")]
    pub policy: Option<Option<String>>,
    /// Tagging document.
    #[serde(default, deserialize_with = "deserialize_some")]
    pub tagging: Option<Option<String>>,
    /// Versioning switch.
    #[serde(default, deserialize_with = "deserialize_some")]
    pub versioning: Option<Option<bool>>,
    /// Website configuration document.
    #[serde(default, deserialize_with = "deserialize_some")]
    pub website: Option<Option<String>>,
    /// Ordered per-key attribute rules.
    #[serde(default)]
    pub key_config: Vec<KeyConfigEntry>,
    /// Directory mirroring directives.
    #[serde(default)]
    pub rsync: Option<RsyncSpec>,
    /// `[key, url]` pairs written as website redirects.
    #[serde(default)]
    pub redirects: Vec<(String, String)>,
}

/// One `key_config` rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyConfigEntry {
    /// Include globs.
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Exclude globs.
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
    /// Include regexes.
    #[serde(default)]
    pub regexes: Vec<String>,
    /// Exclude regexes.
    #[serde(default)]
    pub ignore_regexes: Vec<String>,
    /// Access control policy document; `null` reverts to private.
    #[serde(default, deserialize_with = "deserialize_some")]
    pub acl: Option<Option<String>>,
    /// Canned ACL.
    #[serde(default)]
    pub canned_acl: Option<String>,
    /// `Cache-Control`.
    #[serde(default)]
    pub cache_control: Option<String>,
    /// `Content-Disposition`.
    #[serde(default)]
    pub content_disposition: Option<String>,
    /// `Content-Encoding`.
    #[serde(default)]
    pub content_encoding: Option<String>,
    /// `Content-Type`.
    #[serde(default)]
    pub content_type: Option<String>,
    /// `Content-Language`.
    #[serde(default)]
    pub content_language: Option<String>,
    /// `Expires`.
    #[serde(default)]
    pub expires: Option<String>,
    /// Server-side encryption.
    #[serde(default)]
    pub encrypted: Option<bool>,
    /// Reduced redundancy storage.
    #[serde(default)]
    pub reduced_redundancy: Option<bool>,
    /// User metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl KeyConfigEntry {
    fn configurator(&self) -> Result<KeyConfigurator, ConfigError> {
        let matcher = build_matcher(
            &self.patterns,
            &self.ignore_patterns,
            &self.regexes,
            &self.ignore_regexes,
        )?;
        let overrides = KeyOverrides {
            acl: self.acl.clone(),
            canned_acl: self.canned_acl.clone(),
            cache_control: self.cache_control.clone(),
            content_disposition: self.content_disposition.clone(),
            content_encoding: self.content_encoding.clone(),
            content_type: self.content_type.clone(),
            content_language: self.content_language.clone(),
            expires: self.expires.clone(),
            encrypted: self.encrypted,
            reduced_redundancy: self.reduced_redundancy,
            metadata: self.metadata.clone(),
        };
        Ok(KeyConfigurator::new(matcher, overrides))
    }
}

/// One `rsync` directive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RsyncEntry {
    /// Local source directory.
    pub src: PathBuf,
    /// Key prefix; the bucket root when absent.
    #[serde(default)]
    pub dest: Option<String>,
    /// Delete keys that no longer exist locally.
    #[serde(default)]
    pub delete: bool,
    /// Include globs.
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Exclude globs.
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
    /// Include regexes.
    #[serde(default)]
    pub regexes: Vec<String>,
    /// Exclude regexes.
    #[serde(default)]
    pub ignore_regexes: Vec<String>,
}

impl RsyncEntry {
    fn config(&self) -> Result<RsyncConfig, ConfigError> {
        let matcher = build_matcher(
            &self.patterns,
            &self.ignore_patterns,
            &self.regexes,
            &self.ignore_regexes,
        )?;
        Ok(RsyncConfig::new(
            self.src.clone(),
            self.dest.as_deref(),
            self.delete,
            matcher,
        ))
    }
}

/// The `rsync` field: a bare source path, one directive, or several.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RsyncSpec {
    /// Mirror this directory onto the bucket root.
    Src(PathBuf),
    /// One directive.
    One(RsyncEntry),
    /// Several directives.
    Many(Vec<RsyncEntry>),
}

// Dispatch on the YAML shape so a bad field inside a directive reports
// the directive's own error.
impl<'de> Deserialize<'de> for RsyncSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_yaml::Value::deserialize(deserializer)?;
        let invalid =
            |e: serde_yaml::Error| D::Error::custom(format_args!("invalid rsync directive: {e}"));
        match value {
            serde_yaml::Value::String(src) => Ok(Self::Src(PathBuf::from(src))),
            serde_yaml::Value::Mapping(_) => {
                serde_yaml::from_value(value).map(Self::One).map_err(invalid)
            }
            serde_yaml::Value::Sequence(_) => {
                serde_yaml::from_value(value).map(Self::Many).map_err(invalid)
            }
            other => Err(D::Error::invalid_type(
                unexpected(&other),
                &"a source path, a directive or a list of directives",
            )),
        }
    }
}

fn unexpected(value: &serde_yaml::Value) -> Unexpected<'_> {
    match value {
        serde_yaml::Value::Null => Unexpected::Unit,
        serde_yaml::Value::Bool(b) => Unexpected::Bool(*b),
        serde_yaml::Value::Number(_) => Unexpected::Other("number"),
        _ => Unexpected::Other("tagged value"),
    }
}

impl RsyncSpec {
    /// The directives in configuration order.
    #[must_use]
    pub fn entries(&self) -> Vec<RsyncEntry> {
        match self {
            Self::Src(src) => vec![RsyncEntry {
                src: src.clone(),
                ..RsyncEntry::default()
            }],
            Self::One(entry) => vec![entry.clone()],
            Self::Many(entries) => entries.clone(),
        }
    }
}

fn build_matcher(
    patterns: &[String],
    ignore_patterns: &[String],
    regexes: &[String],
    ignore_regexes: &[String],
) -> Result<Matcher, ConfigError> {
    Matcher::builder()
        .patterns(patterns.iter().cloned())
        .ignore_patterns(ignore_patterns.iter().cloned())
        .regexes(regexes.iter().cloned())
        .ignore_regexes(ignore_regexes.iter().cloned())
        .build()
}

impl BucketConfig {
    /// Bucket-level attributes.
    #[must_use]
    pub fn attributes(&self) -> BucketAttributes {
        BucketAttributes {
            region: self.region.clone(),
            canned_acl: self.canned_acl.clone(),
            acl: self.acl.clone(),
            cors: self.cors.clone(),
            lifecycle: self.lifecycle.clone(),
            logging: self.logging.clone(),
            notification: self.notification.clone(),
            policy: self.policy.clone(),
            tagging: self.tagging.clone(),
            versioning: self.versioning,
            website: self.website.clone(),
        }
    }

    /// Compile the `key_config` rules, preserving their order.
    pub fn key_factory(&self) -> Result<KeyFactory, ConfigError> {
        let configurators = self
            .key_config
            .iter()
            .map(KeyConfigEntry::configurator)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(KeyFactory::new(configurators))
    }

    /// Compile the `rsync` directives, preserving their order.
    pub fn rsync_planner(&self) -> Result<RsyncPlanner, ConfigError> {
        let configs = self
            .rsync
            .as_ref()
            .map(RsyncSpec::entries)
            .unwrap_or_default()
            .iter()
            .map(RsyncEntry::config)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RsyncPlanner::new(configs))
    }

    /// Endpoint settings with defaults for unset fields.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        let defaults = ClientConfig::default();
        ClientConfig {
            hostname: self.hostname.clone().unwrap_or(defaults.hostname),
            secure: self.secure.unwrap_or(defaults.secure),
            path_style: self.path_style.unwrap_or(defaults.path_style),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket.trim().is_empty() {
            return Err(ConfigError::Invalid("bucket name must not be empty".to_owned()));
        }
        self.key_factory()?;
        self.rsync_planner()?;
        Ok(())
    }
}

/// Parse a configuration document.
///
/// # Errors
///
/// Returns [`ConfigError`] for invalid YAML, unknown fields, a top level
/// that is neither a mapping nor a list, an empty bucket name, or a
/// pattern that does not compile.
pub fn parse_config(document: &str) -> Result<Vec<BucketConfig>, ConfigError> {
    let value: serde_yaml::Value = serde_yaml::from_str(document)?;
    let buckets: Vec<BucketConfig> = match value {
        serde_yaml::Value::Sequence(_) => serde_yaml::from_value(value)?,
        serde_yaml::Value::Mapping(_) => vec![serde_yaml::from_value(value)?],
        _ => {
            return Err(ConfigError::Invalid(
                "expected a bucket mapping or a list of buckets".to_owned(),
            ));
        }
    };
    for bucket in &buckets {
        bucket.validate()?;
    }
    Ok(buckets)
}

/// Read and parse a configuration file.
pub fn load_config(path: &Path) -> Result<Vec<BucketConfig>, ConfigError> {
    let document = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&document)
}

/// Turns [`BucketConfig`]s into ready-to-sync [`Bucket`]s.
///
/// Credentials resolve from the bucket's own configuration, then the
/// connector's overrides, then the environment.
#[derive(Debug, Clone)]
pub struct Connector {
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
    client_config: Option<ClientConfig>,
    transport: Arc<dyn HttpTransport>,
    metrics: Arc<dyn MetricsSink>,
}

impl Default for Connector {
    fn default() -> Self {
        Self {
            access_key_id: None,
            secret_access_key: None,
            client_config: None,
            transport: Arc::new(ReqwestTransport::new()),
            metrics: Arc::new(NoopMetrics),
        }
    }
}

impl Connector {
    /// A connector using reqwest and no metrics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Credentials used when a bucket does not configure its own.
    #[must_use]
    pub fn with_credentials(
        mut self,
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
    ) -> Self {
        self.access_key_id = access_key_id;
        self.secret_access_key = secret_access_key;
        self
    }

    /// Use `config` for every bucket instead of its own endpoint fields.
    #[must_use]
    pub fn with_client_config(mut self, config: ClientConfig) -> Self {
        self.client_config = Some(config);
        self
    }

    /// Send requests through `transport`.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = transport;
        self
    }

    /// Report requests to `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Build the bucket described by `config`.
    ///
    /// # Errors
    ///
    /// Returns a credential error when no access key pair can be found and a
    /// [`ConfigError`] when a pattern does not compile.
    pub fn connect(&self, config: &BucketConfig) -> Result<Bucket> {
        let credentials = Credentials::resolve(
            config.access_key_id.clone().or_else(|| self.access_key_id.clone()),
            config
                .secret_access_key
                .clone()
                .or_else(|| self.secret_access_key.clone()),
        )?;
        let client_config = self
            .client_config
            .clone()
            .unwrap_or_else(|| config.client_config());
        let client = S3Client::with_parts(
            config.bucket.as_str(),
            credentials,
            client_config,
            Arc::clone(&self.transport),
            Arc::clone(&self.metrics),
        );
        Ok(Bucket::new(client)
            .with_attributes(config.attributes())
            .with_key_factory(config.key_factory()?)
            .with_rsync(config.rsync_planner()?)
            .with_redirects(config.redirects.clone()))
    }
}
