//! Sequencing of synchronizers for one repository pair, and the sweep over
//! every mirrored repository on the destination.
//!
//! Components run in dependency order: labels and milestones first so that
//! issue bodies can refer to them, then issues, pull requests, the wiki and
//! finally releases. A failing component never stops the ones after it; its
//! outcome is recorded in the [`MetadataReport`] instead.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::api::{DestinationApi, SourceApi};
use crate::config::{MirrorStatus, RepoConfig, RepoConfigStore};
use crate::error::{Result, SyncError};
use crate::lock::RepoLocks;
use crate::pagination::{fetch_all, DESTINATION_PAGE_SIZE};
use crate::progress::{SyncPhase, SyncProgress};
use crate::release::ReleaseMirror;
use crate::sync::{
    IssueSynchronizer, ItemSyncReport, LabelSynchronizer, MilestoneSynchronizer,
    PullRequestSynchronizer, SyncContext,
};
use crate::types::{RepoRef, SyncCounts};
use crate::wiki::WikiMirror;

pub const LABELS: &str = "labels";
pub const MILESTONES: &str = "milestones";
pub const ISSUES: &str = "issues";
pub const PULL_REQUESTS: &str = "prs";
pub const WIKI: &str = "wiki";
pub const RELEASES: &str = "releases";

/// Outcome of one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentStatus {
    pub success: bool,
    pub message: String,
}

impl ComponentStatus {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Per-component outcome of [`Orchestrator::mirror_metadata`]. Components that
/// are switched off do not appear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataReport {
    /// Every reported component succeeded.
    pub overall_success: bool,
    /// At least one non-optional component failed outright.
    pub has_errors: bool,
    pub components: BTreeMap<String, ComponentStatus>,
}

impl Default for MetadataReport {
    fn default() -> Self {
        Self {
            overall_success: true,
            has_errors: false,
            components: BTreeMap::new(),
        }
    }
}

impl MetadataReport {
    fn record(&mut self, name: &str, status: ComponentStatus) {
        self.overall_success &= status.success;
        self.components.insert(name.to_string(), status);
    }

    fn record_error(&mut self, name: &str, error: &SyncError) {
        let retryable = error.is_retryable();
        error!(component = name, %error, retryable, "Component failed");
        self.has_errors = true;
        let message = if retryable {
            format!("Error: {error} (transient, retried on the next run)")
        } else {
            format!("Error: {error}")
        };
        self.record(name, ComponentStatus::warning(message));
    }

    pub fn component(&self, name: &str) -> Option<&ComponentStatus> {
        self.components.get(name)
    }

    /// Run status and messages derived from this report.
    pub fn status(&self) -> (MirrorStatus, Vec<String>) {
        let status = if self.overall_success {
            MirrorStatus::Success
        } else if self.has_errors {
            MirrorStatus::Error
        } else {
            MirrorStatus::Warning
        };
        let messages = self
            .components
            .iter()
            .filter(|(_, s)| !s.success)
            .map(|(name, s)| format!("Failed to mirror {name}: {}", s.message))
            .collect();
        (status, messages)
    }
}

fn counts_status(counts: SyncCounts) -> ComponentStatus {
    if counts.skipped == 0 {
        ComponentStatus::ok(counts.to_string())
    } else {
        ComponentStatus::warning(counts.to_string())
    }
}

fn item_status(report: ItemSyncReport) -> ComponentStatus {
    let mut message = format!("{}; comments: {}", report.counts, report.comments);
    if report.thread_errors > 0 {
        message.push_str(&format!("; {} threads not mirrored", report.thread_errors));
    }
    if report.is_clean() {
        ComponentStatus::ok(message)
    } else {
        ComponentStatus::warning(message)
    }
}

/// Per-run switches that take precedence over the stored configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOverrides {
    pub mirror_metadata: Option<bool>,
    pub mirror_releases: Option<bool>,
}

impl RunOverrides {
    fn apply(&self, config: &RepoConfig) -> RepoConfig {
        let mut config = config.clone();
        if let Some(metadata) = self.mirror_metadata {
            config.mirror_metadata = metadata;
        }
        if let Some(releases) = self.mirror_releases {
            config.mirror_releases = releases;
        }
        config
    }
}

/// Result of [`Orchestrator::mirror_repository`].
#[derive(Debug, Clone, Serialize)]
pub struct RepositoryRun {
    pub source: String,
    pub destination: String,
    pub status: MirrorStatus,
    pub messages: Vec<String>,
    pub report: Option<MetadataReport>,
}

impl RepositoryRun {
    fn failed(source: &RepoRef, destination: &RepoRef, error: &SyncError) -> Self {
        Self {
            source: source.to_string(),
            destination: destination.to_string(),
            status: MirrorStatus::Error,
            messages: vec![error.to_string()],
            report: None,
        }
    }
}

/// Entry point of the engine.
pub struct Orchestrator {
    source: Arc<dyn SourceApi>,
    destination: Arc<dyn DestinationApi>,
    configs: Arc<dyn RepoConfigStore>,
    wiki: Option<Arc<dyn WikiMirror>>,
    locks: RepoLocks,
    progress: Option<Arc<SyncProgress>>,
    overrides: RunOverrides,
}

impl Orchestrator {
    pub fn new(
        source: Arc<dyn SourceApi>,
        destination: Arc<dyn DestinationApi>,
        configs: Arc<dyn RepoConfigStore>,
    ) -> Self {
        Self {
            source,
            destination,
            configs,
            wiki: None,
            locks: RepoLocks::new(),
            progress: None,
            overrides: RunOverrides::default(),
        }
    }

    pub fn with_wiki(mut self, wiki: Arc<dyn WikiMirror>) -> Self {
        self.wiki = Some(wiki);
        self
    }

    /// Share a lock registry with other orchestrators in the process.
    pub fn with_locks(mut self, locks: RepoLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn with_progress(mut self, progress: Arc<SyncProgress>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_overrides(mut self, overrides: RunOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    fn phase(&self, phase: SyncPhase) {
        if let Some(progress) = &self.progress {
            progress.set_phase(phase);
        }
    }

    fn component_done(&self, status: &ComponentStatus) {
        if let Some(progress) = &self.progress {
            progress.complete_component(Some(&status.message));
        }
    }

    /// Run every enabled component for one pair and report per component.
    ///
    /// Waits for the destination repository's lock, so it never overlaps a
    /// run of [`Orchestrator::mirror_repository`] on the same repository.
    pub async fn mirror_metadata(
        &self,
        source: &RepoRef,
        dest: &RepoRef,
        config: &RepoConfig,
    ) -> MetadataReport {
        let _guard = self.locks.acquire(dest).await;
        self.run_components(source, dest, config).await
    }

    /// Component pass of one pair. Callers hold the lock of `dest`.
    async fn run_components(
        &self,
        source: &RepoRef,
        dest: &RepoRef,
        config: &RepoConfig,
    ) -> MetadataReport {
        let ctx = SyncContext::new(self.source.as_ref(), self.destination.as_ref(), source, dest);
        let mut report = MetadataReport::default();

        let metadata = config.mirror_metadata;
        if let Some(progress) = &self.progress {
            let total = [
                metadata && config.mirror_labels,
                metadata && config.mirror_milestones,
                metadata && config.mirror_issues,
                metadata && config.mirror_pull_requests,
                metadata && config.mirror_wiki,
                config.mirror_releases,
            ]
            .iter()
            .filter(|enabled| **enabled)
            .count();
            progress.start(&dest.to_string(), total as u64);
        }

        if !metadata {
            info!(%source, %dest, "Metadata mirroring is disabled");
        } else {
            if config.mirror_labels {
                self.phase(SyncPhase::Labels);
                match LabelSynchronizer::new(ctx).sync().await {
                    Ok(counts) => self.finish(&mut report, LABELS, counts_status(counts)),
                    Err(e) => report.record_error(LABELS, &e),
                }
            }

            if config.mirror_milestones {
                self.phase(SyncPhase::Milestones);
                match MilestoneSynchronizer::new(ctx).sync().await {
                    Ok(counts) => self.finish(&mut report, MILESTONES, counts_status(counts)),
                    Err(e) => report.record_error(MILESTONES, &e),
                }
            }

            if config.mirror_issues {
                self.phase(SyncPhase::Issues);
                match IssueSynchronizer::new(ctx).sync().await {
                    Ok(items) => self.finish(&mut report, ISSUES, item_status(items)),
                    Err(e) => report.record_error(ISSUES, &e),
                }
            }

            if config.mirror_pull_requests {
                self.phase(SyncPhase::PullRequests);
                match PullRequestSynchronizer::new(ctx).sync().await {
                    Ok(items) => self.finish(&mut report, PULL_REQUESTS, item_status(items)),
                    Err(e) => report.record_error(PULL_REQUESTS, &e),
                }
            }

            if config.mirror_wiki {
                self.phase(SyncPhase::Wiki);
                let status = self.mirror_wiki(source, dest).await;
                self.finish(&mut report, WIKI, status);
            }
        }

        if config.mirror_releases {
            self.phase(SyncPhase::Releases);
            match ReleaseMirror::new(ctx).mirror_all().await {
                Ok(releases) => {
                    let status = if releases.is_complete() {
                        ComponentStatus::ok(releases.summary())
                    } else {
                        ComponentStatus::warning(releases.summary())
                    };
                    self.finish(&mut report, RELEASES, status);
                }
                Err(e) => report.record_error(RELEASES, &e),
            }
        }

        self.phase(SyncPhase::Complete);
        if report.overall_success {
            info!(%source, %dest, "Mirrored all enabled metadata");
        } else {
            warn!(%source, %dest, has_errors = report.has_errors, "Metadata mirrored with problems");
        }
        report
    }

    fn finish(&self, report: &mut MetadataReport, name: &str, status: ComponentStatus) {
        self.component_done(&status);
        report.record(name, status);
    }

    /// Wiki failures are reported but never count as errors.
    async fn mirror_wiki(&self, source: &RepoRef, dest: &RepoRef) -> ComponentStatus {
        let Some(wiki) = &self.wiki else {
            warn!(%dest, "Wiki mirroring enabled but no wiki transport configured");
            return ComponentStatus::warning("wiki transport not configured");
        };
        match wiki.mirror_wiki(source, dest).await {
            Ok(true) => ComponentStatus::ok("wiki mirrored"),
            Ok(false) => ComponentStatus::ok("source has no wiki"),
            Err(e) => {
                warn!(%source, error = %e, "Wiki mirroring failed");
                ComponentStatus::warning(format!("Error: {e}"))
            }
        }
    }

    /// Full run for one pair: code sync trigger, metadata, and the status
    /// written back to the configuration store.
    pub async fn mirror_repository(&self, source: &RepoRef, dest: &RepoRef) -> Result<RepositoryRun> {
        let _guard = self.locks.acquire(dest).await;
        info!(%source, %dest, "Starting mirror run");

        let mut stored = self.configs.get_repo_config(source, dest)?;
        let config = self.overrides.apply(&stored);

        let mut messages = Vec::new();
        let mut code_synced = true;
        self.phase(SyncPhase::CodeMirror);
        if let Err(e) = self.destination.trigger_mirror_sync(dest).await {
            warn!(%dest, error = %e, "Failed to trigger code mirror sync");
            messages.push("Failed to trigger mirror sync for code".to_string());
            code_synced = false;
        }

        let report = self.run_components(source, dest, &config).await;
        let (mut status, component_messages) = report.status();
        if !code_synced && status == MirrorStatus::Success {
            status = MirrorStatus::Warning;
        }
        messages.extend(component_messages);

        stored.record_run(Utc::now(), status, messages.clone());
        self.configs.save_repo_config(source, dest, &stored)?;
        info!(%source, %dest, %status, "Mirror run finished");

        Ok(RepositoryRun {
            source: source.to_string(),
            destination: dest.to_string(),
            status,
            messages,
            report: Some(report),
        })
    }

    /// Pairs discovered from the destination: pull mirrors of GitHub repositories.
    pub async fn discover_mirrors(&self) -> Result<Vec<(RepoRef, RepoRef)>> {
        let destination = self.destination.as_ref();
        let repositories = fetch_all(DESTINATION_PAGE_SIZE, move |page| {
            destination.list_user_repositories(page, DESTINATION_PAGE_SIZE)
        })
        .await?;

        Ok(repositories
            .iter()
            .filter_map(|r| r.github_source().map(|source| (source, r.repo_ref())))
            .collect())
    }

    /// Mirror every discovered pair, up to `concurrency` repositories at once.
    pub async fn mirror_all(&self, concurrency: usize) -> Result<Vec<RepositoryRun>> {
        let pairs = self.discover_mirrors().await?;
        if pairs.is_empty() {
            warn!("No mirrored repositories found on the destination");
            return Ok(Vec::new());
        }
        info!(count = pairs.len(), concurrency, "Mirroring repositories");

        let runs = stream::iter(pairs)
            .map(|(source, dest)| async move {
                match self.mirror_repository(&source, &dest).await {
                    Ok(run) => run,
                    Err(e) => {
                        error!(%source, %dest, error = %e, "Mirror run failed");
                        RepositoryRun::failed(&source, &dest, &e)
                    }
                }
            })
            .buffer_unordered(concurrency.max(1))
            .collect::<Vec<_>>()
            .await;
        Ok(runs)
    }
}
