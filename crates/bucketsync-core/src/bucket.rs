//! Bucket orchestrator.
//!
//! [`Bucket::sync`] first lists the bucket and builds the whole action plan,
//! so a conflict is reported before anything is written. It then drives the
//! bucket through
//! `Pending -> Created -> AttributesSynced -> KeysReconciled -> Done`:
//!
//! 1. create the bucket (idempotent on the provider side);
//! 2. apply every configured bucket attribute, concurrently;
//! 3. execute uploads and syncs concurrently, then the deletes in bulk;
//! 4. write the redirects.
//!
//! In rsync-only mode steps 2 and 4 are skipped and the plan keeps only
//! uploads and deletes.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use bucketsync_client::client::NO_SUCH_BUCKET;
use bucketsync_client::{ClientError, S3Client, S3Request};
use bucketsync_model::{
    BucketLoggingStatus, CreateBucketConfiguration, KeyRecord, NotificationConfiguration,
    VersioningConfiguration,
};
use bucketsync_xml::{LOGGING_NAMESPACE, to_xml, to_xml_with_namespace};
use tracing::{debug, info};

use crate::diff::diff;
use crate::error::{CoreError, Result};
use crate::executor::{DEFAULT_CONCURRENCY, Executor};
use crate::key::KeyOperations;
use crate::keyconfig::KeyFactory;
use crate::plan::{Action, ActionKind, ActionPlan};
use crate::rsync::RsyncPlanner;

/// Bucket-level configuration.
///
/// Tri-state fields: `None` is not configured (no request), `Some(None)`
/// reverts the attribute to its default, `Some(Some(v))` sets it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketAttributes {
    /// Location constraint used at creation.
    pub region: Option<String>,
    /// Canned ACL used at creation.
    pub canned_acl: Option<String>,
    /// Access control policy document.
    pub acl: Option<Option<String>>,
    /// CORS configuration document.
    pub cors: Option<Option<String>>,
    /// Lifecycle configuration document.
    pub lifecycle: Option<Option<String>>,
    /// Logging status document.
    pub logging: Option<Option<String>>,
    /// Notification configuration document.
    pub notification: Option<Option<String>>,
    /// Bucket policy (JSON).
    pub policy: Option<Option<String>>,
    /// Tagging document.
    pub tagging: Option<Option<String>>,
    /// Versioning switch.
    pub versioning: Option<Option<bool>>,
    /// Website configuration document.
    pub website: Option<Option<String>>,
}

/// Progress of one bucket sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SyncState {
    /// Nothing done yet.
    Pending,
    /// The bucket exists.
    Created,
    /// Bucket attributes applied.
    AttributesSynced,
    /// Uploads, syncs and deletes executed.
    KeysReconciled,
    /// Redirects written.
    Done,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Created => "created",
            Self::AttributesSynced => "attributes-synced",
            Self::KeysReconciled => "keys-reconciled",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Runtime switches of a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Log what would be done; only listings are sent.
    pub dry_run: bool,
    /// Only mirror directories: no bucket attributes, syncs or redirects.
    pub rsync_only: bool,
    /// List the bucket again after planning and sync only keys that did not
    /// change in between.
    pub recheck_remote: bool,
    /// Worker count; `<= 0` runs sequentially.
    pub concurrency: i64,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            rsync_only: false,
            recheck_remote: false,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Outcome of [`Bucket::sync`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Bucket name.
    pub bucket: String,
    /// Last state reached.
    pub state: SyncState,
    /// Keys uploaded.
    pub uploads: usize,
    /// Keys synced in place.
    pub syncs: usize,
    /// Redirects written.
    pub redirects: usize,
    /// Keys deleted.
    pub deletes: usize,
    /// Whether nothing was changed.
    pub dry_run: bool,
}

/// One bucket and everything configured for it.
#[derive(Debug, Clone)]
pub struct Bucket {
    client: S3Client,
    attributes: BucketAttributes,
    key_factory: Arc<KeyFactory>,
    rsync: RsyncPlanner,
    redirects: Vec<(String, String)>,
}

impl Bucket {
    /// A bucket with nothing configured.
    #[must_use]
    pub fn new(client: S3Client) -> Self {
        Self {
            client,
            attributes: BucketAttributes::default(),
            key_factory: Arc::new(KeyFactory::default()),
            rsync: RsyncPlanner::default(),
            redirects: Vec::new(),
        }
    }

    /// Set bucket-level attributes.
    #[must_use]
    pub fn with_attributes(mut self, attributes: BucketAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Set the key configurator chain.
    #[must_use]
    pub fn with_key_factory(mut self, factory: KeyFactory) -> Self {
        self.key_factory = Arc::new(factory);
        self
    }

    /// Set the rsync directives.
    #[must_use]
    pub fn with_rsync(mut self, rsync: RsyncPlanner) -> Self {
        self.rsync = rsync;
        self
    }

    /// Set the explicit `(key, url)` redirects.
    #[must_use]
    pub fn with_redirects(mut self, redirects: Vec<(String, String)>) -> Self {
        self.redirects = redirects;
        self
    }

    /// Bucket name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.client.bucket()
    }

    /// Configured attributes.
    #[must_use]
    pub fn attributes(&self) -> &BucketAttributes {
        &self.attributes
    }

    /// Create the bucket with its canned ACL and region.
    pub async fn create(&self) -> Result<()> {
        let mut request = S3Request::put();
        if let Some(canned) = &self.attributes.canned_acl {
            request = request.try_header("x-amz-acl", canned)?;
        }
        if let Some(region) = &self.attributes.region {
            let body = to_xml(
                "CreateBucketConfiguration",
                &CreateBucketConfiguration {
                    location_constraint: region.clone(),
                },
            )
            .map_err(ClientError::from)?;
            request = request.body(body);
        }
        info!(bucket = %self.name(), "creating bucket");
        self.client.execute(request).await?;
        Ok(())
    }

    /// One request per configured attribute, labelled with its name.
    pub fn attribute_requests(&self) -> Result<Vec<(&'static str, S3Request)>> {
        let attrs = &self.attributes;
        let mut requests = Vec::new();

        match &attrs.acl {
            Some(Some(policy)) => requests.push((
                "acl",
                S3Request::put().sub_resource("acl").body(policy.clone()),
            )),
            Some(None) => requests.push((
                "acl",
                S3Request::put()
                    .sub_resource("acl")
                    .try_header("x-amz-acl", "private")?,
            )),
            None => {}
        }

        let documents = [
            ("cors", &attrs.cors),
            ("lifecycle", &attrs.lifecycle),
            ("policy", &attrs.policy),
            ("tagging", &attrs.tagging),
            ("website", &attrs.website),
        ];
        for (name, value) in documents {
            match value {
                Some(Some(document)) => requests.push((
                    name,
                    S3Request::put().sub_resource(name).body(document.clone()),
                )),
                Some(None) => requests.push((name, S3Request::delete().sub_resource(name))),
                None => {}
            }
        }

        if let Some(logging) = &attrs.logging {
            let body = match logging {
                Some(document) => document.clone().into_bytes(),
                None => to_xml_with_namespace(
                    "BucketLoggingStatus",
                    Some(LOGGING_NAMESPACE),
                    &BucketLoggingStatus,
                )
                .map_err(ClientError::from)?,
            };
            requests.push(("logging", S3Request::put().sub_resource("logging").body(body)));
        }

        if let Some(notification) = &attrs.notification {
            let body = match notification {
                Some(document) => document.clone().into_bytes(),
                None => to_xml("NotificationConfiguration", &NotificationConfiguration)
                    .map_err(ClientError::from)?,
            };
            requests.push((
                "notification",
                S3Request::put().sub_resource("notification").body(body),
            ));
        }

        if let Some(versioning) = attrs.versioning {
            let config = VersioningConfiguration {
                status: versioning.unwrap_or(false).into(),
            };
            let body = to_xml("VersioningConfiguration", &config).map_err(ClientError::from)?;
            requests.push((
                "versioning",
                S3Request::put().sub_resource("versioning").body(body),
            ));
        }

        Ok(requests)
    }

    /// Apply every configured attribute. The requests are independent.
    pub async fn sync_attributes(&self, executor: &Executor, dry_run: bool) -> Result<usize> {
        let requests = self.attribute_requests()?;
        let count = requests.len();
        if dry_run {
            for (name, request) in &requests {
                info!(bucket = %self.name(), attribute = name, method = %request.method, "would set bucket attribute");
            }
            return Ok(count);
        }

        let tasks = requests.into_iter().map(|(name, request)| {
            let client = self.client.clone();
            async move {
                info!(bucket = %client.bucket(), attribute = name, method = %request.method, "bucket attribute");
                client.execute(request).await?;
                Ok::<_, CoreError>(())
            }
        });
        executor.join(tasks).await?;
        Ok(count)
    }

    /// Build the action plan for this run.
    ///
    /// Lists the bucket once, plans every rsync directive against that
    /// snapshot and adds the redirects. Every listed key still without an
    /// action then gets a default sync, so a redirect written by an earlier
    /// run is redirected again rather than copied in place. With
    /// `recheck_remote`, only keys that are unchanged in a second listing
    /// get the default sync.
    pub async fn plan_keys(&self, options: &SyncOptions) -> Result<ActionPlan> {
        let before = self.snapshot().await?;
        let mut plan = self.rsync.plan(&before).await?;
        for (key, url) in &self.redirects {
            plan.add_redirect(key.as_str(), url.as_str())?;
        }

        let unmodified: BTreeSet<String> = if options.recheck_remote {
            let after = self.snapshot().await?;
            diff(&before, &after).unmodified
        } else {
            before.iter().map(|k| k.name.clone()).collect()
        };
        for name in unmodified {
            if !plan.contains(&name) {
                plan.add_sync(name)?;
            }
        }

        if options.rsync_only {
            plan.remove_actions(&[ActionKind::Sync, ActionKind::Redirect]);
        }
        debug!(
            bucket = %self.name(),
            uploads = plan.count(ActionKind::Upload),
            syncs = plan.count(ActionKind::Sync),
            redirects = plan.count(ActionKind::Redirect),
            deletes = plan.count(ActionKind::Delete),
            "planned"
        );
        Ok(plan)
    }

    /// Every key in the bucket. A bucket that does not exist yet is empty.
    async fn snapshot(&self) -> Result<Vec<KeyRecord>> {
        match self.client.list_all(None).await {
            Ok(keys) => Ok(keys),
            Err(e) if e.is_code(NO_SUCH_BUCKET) => {
                debug!(bucket = %self.name(), "bucket does not exist yet");
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Run the uploads and syncs of `plan`, then its deletes in bulk.
    pub async fn execute_plan(&self, plan: &ActionPlan, ops: &KeyOperations, executor: &Executor) -> Result<()> {
        let tasks = plan
            .iter()
            .filter(|(_, action)| matches!(action, Action::Upload { .. } | Action::Sync))
            .map(|(key, action)| {
                let ops = ops.clone();
                let key = key.to_owned();
                let action = action.clone();
                async move {
                    let result = match &action {
                        Action::Upload { path } => ops.upload(&key, path).await,
                        _ => ops.sync(&key).await,
                    };
                    result.map_err(|e| e.in_action(key, action.kind()))
                }
            });
        executor.join(tasks).await?;

        let deletes: Vec<String> = plan.to_delete().map(str::to_owned).collect();
        if !deletes.is_empty() {
            let label = match deletes.as_slice() {
                [single] => single.clone(),
                many => format!("{} keys", many.len()),
            };
            ops.delete_many(&deletes)
                .await
                .map_err(|e| e.in_action(label, ActionKind::Delete))?;
        }
        Ok(())
    }

    /// Write every redirect of `plan`.
    pub async fn apply_redirects(&self, plan: &ActionPlan, ops: &KeyOperations, executor: &Executor) -> Result<()> {
        let tasks = plan.to_redirect().map(|(key, url)| {
            let ops = ops.clone();
            let key = key.to_owned();
            let url = url.to_owned();
            async move {
                ops.redirect(&key, &url)
                    .await
                    .map_err(|e| e.in_action(key, ActionKind::Redirect))
            }
        });
        executor.join(tasks).await?;
        Ok(())
    }

    /// Bring the bucket in line with its configuration.
    ///
    /// A failure leaves every already-applied change in place and returns
    /// the error of the first action that failed.
    pub async fn sync(&self, options: &SyncOptions) -> Result<SyncReport> {
        let executor = Executor::new(options.concurrency);
        let ops = KeyOperations::new(
            self.client.clone(),
            executor.clone(),
            Arc::clone(&self.key_factory),
        );
        let mut report = SyncReport {
            bucket: self.name().to_owned(),
            state: SyncState::Pending,
            uploads: 0,
            syncs: 0,
            redirects: 0,
            deletes: 0,
            dry_run: options.dry_run,
        };

        let plan = self.plan_keys(options).await?;
        report.uploads = plan.count(ActionKind::Upload);
        report.syncs = plan.count(ActionKind::Sync);
        report.redirects = plan.count(ActionKind::Redirect);
        report.deletes = plan.count(ActionKind::Delete);

        if !options.dry_run {
            self.create().await?;
        }
        self.advance(&mut report, SyncState::Created);

        if !options.rsync_only {
            self.sync_attributes(&executor, options.dry_run).await?;
            self.advance(&mut report, SyncState::AttributesSynced);
        }

        if options.dry_run {
            for (key, action) in plan.iter() {
                info!(bucket = %self.name(), key = %key, action = %action, "would apply");
            }
            self.advance(&mut report, SyncState::KeysReconciled);
            self.advance(&mut report, SyncState::Done);
            return Ok(report);
        }

        self.execute_plan(&plan, &ops, &executor).await?;
        self.advance(&mut report, SyncState::KeysReconciled);

        if !options.rsync_only {
            self.apply_redirects(&plan, &ops, &executor).await?;
        }
        self.advance(&mut report, SyncState::Done);
        Ok(report)
    }

    fn advance(&self, report: &mut SyncReport, state: SyncState) {
        info!(bucket = %self.name(), from = %report.state, to = %state, "bucket state");
        report.state = state;
    }
}
