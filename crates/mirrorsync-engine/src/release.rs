//! Release and release asset mirroring.
//!
//! Each tag moves through `NotPresent -> Creating -> AssetsUploading` and ends
//! `Verified` or `Incomplete`. An existing release is verified instead of
//! trusted. When only assets are missing they are uploaded in place; a size
//! mismatch deletes the release and recreates it with every asset, at most
//! once per run.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};
use crate::pagination::{fetch_all, SOURCE_PAGE_SIZE};
use crate::sync::SyncContext;
use crate::types::{DestinationRelease, ReleaseDraft, SourceAsset, SourceRelease};
use crate::verify::{verify_assets, Verification};

const MIB: u64 = 1024 * 1024;
const SCALE_STEP_BYTES: u64 = 50 * MIB;

/// `secs_per_step` for every 50 MB of `size`, never below `floor_secs`.
fn scaled_timeout(floor_secs: u64, secs_per_step: u64, size: u64) -> Duration {
    let scaled_ms =
        u128::from(secs_per_step) * 1000 * u128::from(size) / u128::from(SCALE_STEP_BYTES);
    let scaled_ms = u64::try_from(scaled_ms).unwrap_or(u64::MAX);
    Duration::from_millis(scaled_ms).max(Duration::from_secs(floor_secs))
}

/// 30 seconds per 50 MB, at least 60 seconds.
pub fn download_timeout(size: u64) -> Duration {
    scaled_timeout(60, 30, size)
}

/// 60 seconds per 50 MB, at least 120 seconds.
pub fn upload_timeout(size: u64) -> Duration {
    scaled_timeout(120, 60, size)
}

/// Lifecycle of one tag during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseState {
    NotPresent,
    Creating,
    AssetsUploading,
    Verified,
    Incomplete,
}

impl std::fmt::Display for ReleaseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotPresent => write!(f, "not present"),
            Self::Creating => write!(f, "creating"),
            Self::AssetsUploading => write!(f, "uploading assets"),
            Self::Verified => write!(f, "verified"),
            Self::Incomplete => write!(f, "incomplete"),
        }
    }
}

/// What the mirror did for a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseAction {
    Created,
    AlreadyPresent,
    /// Missing assets were uploaded onto the existing release.
    Repaired,
    /// The release was deleted and created again.
    Recreated,
    Failed,
}

#[derive(Debug, Clone)]
pub struct ReleaseOutcome {
    pub tag: String,
    pub action: ReleaseAction,
    pub state: ReleaseState,
    /// Assets uploaded successfully in this run.
    pub uploaded: usize,
    /// Assets whose upload was attempted in this run.
    pub attempted: usize,
    /// Assets the source release has.
    pub total: usize,
    pub verification: Option<Verification>,
    pub error: Option<String>,
}

impl ReleaseOutcome {
    fn new(release: &SourceRelease) -> Self {
        Self {
            tag: release.tag_name.clone(),
            action: ReleaseAction::AlreadyPresent,
            state: ReleaseState::NotPresent,
            uploaded: 0,
            attempted: 0,
            total: release.assets.len(),
            verification: None,
            error: None,
        }
    }

    fn failed(mut self, error: SyncError) -> Self {
        warn!(tag = %self.tag, error = %error, "Release mirroring failed");
        self.action = ReleaseAction::Failed;
        self.state = ReleaseState::Incomplete;
        self.error = Some(error.to_string());
        self
    }

    fn finish(mut self, verification: Verification) -> Self {
        if verification.is_verified() {
            self.state = ReleaseState::Verified;
        } else {
            self.state = ReleaseState::Incomplete;
            let error = SyncError::VerificationFailed(verification.to_string());
            self.error = Some(error.to_string());
        }
        self.verification = Some(verification);
        self
    }

    pub fn is_verified(&self) -> bool {
        self.state == ReleaseState::Verified
    }
}

/// Outcomes of every tag in one run.
#[derive(Debug, Clone, Default)]
pub struct ReleaseReport {
    pub outcomes: Vec<ReleaseOutcome>,
}

impl ReleaseReport {
    fn count(&self, action: ReleaseAction) -> usize {
        self.outcomes.iter().filter(|o| o.action == action).count()
    }

    pub fn created(&self) -> usize {
        self.count(ReleaseAction::Created)
    }

    pub fn incomplete(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_verified()).count()
    }

    pub fn failed(&self) -> usize {
        self.count(ReleaseAction::Failed)
    }

    /// Every tag verified.
    pub fn is_complete(&self) -> bool {
        self.incomplete() == 0
    }

    pub fn summary(&self) -> String {
        let uploaded: usize = self.outcomes.iter().map(|o| o.uploaded).sum();
        let attempted: usize = self.outcomes.iter().map(|o| o.attempted).sum();
        format!(
            "{} releases: {} created, {} already present, {} repaired, {} recreated, {} incomplete; {uploaded}/{attempted} assets uploaded",
            self.outcomes.len(),
            self.created(),
            self.count(ReleaseAction::AlreadyPresent),
            self.count(ReleaseAction::Repaired),
            self.count(ReleaseAction::Recreated),
            self.incomplete(),
        )
    }
}

enum Step {
    Create,
    Existing(DestinationRelease),
    Verify,
}

/// Mirrors releases of one repository pair.
pub struct ReleaseMirror<'a> {
    ctx: SyncContext<'a>,
}

impl<'a> ReleaseMirror<'a> {
    pub fn new(ctx: SyncContext<'a>) -> Self {
        Self { ctx }
    }

    /// Mirror every source release. Fails only if the source listing fails.
    pub async fn mirror_all(&self) -> Result<ReleaseReport> {
        let (source, repo) = (self.ctx.source, self.ctx.source_repo);
        let releases = fetch_all(SOURCE_PAGE_SIZE, move |page| {
            source.list_releases(repo, page, SOURCE_PAGE_SIZE)
        })
        .await?;

        info!(repo = %self.ctx.dest_repo, count = releases.len(), "Mirroring releases");

        let mut report = ReleaseReport::default();
        for release in &releases {
            let outcome = self.mirror_release(release).await;
            info!(
                tag = %outcome.tag,
                action = ?outcome.action,
                state = %outcome.state,
                uploaded = outcome.uploaded,
                attempted = outcome.attempted,
                "Release processed"
            );
            report.outcomes.push(outcome);
        }

        info!(repo = %self.ctx.dest_repo, summary = %report.summary(), "Releases mirrored");
        Ok(report)
    }

    /// Drive one tag to `Verified` or `Incomplete`.
    pub async fn mirror_release(&self, release: &SourceRelease) -> ReleaseOutcome {
        let tag = release.tag_name.as_str();
        let destination = self.ctx.destination;
        let repo = self.ctx.dest_repo;
        let mut outcome = ReleaseOutcome::new(release);
        let mut recreated = false;
        let mut conflict_seen = false;

        let mut step = match destination.get_release_by_tag(repo, tag).await {
            Ok(Some(existing)) => Step::Existing(existing),
            Ok(None) => Step::Create,
            Err(e) => return outcome.failed(e),
        };

        loop {
            step = match step {
                Step::Create => {
                    outcome.state = ReleaseState::Creating;
                    debug!(tag, "Creating release");
                    match destination
                        .create_release(repo, &ReleaseDraft::from(release))
                        .await
                    {
                        Ok(created) => {
                            outcome.action = if recreated {
                                ReleaseAction::Recreated
                            } else {
                                ReleaseAction::Created
                            };
                            self.upload(&mut outcome, created.id, release.assets.iter())
                                .await;
                            Step::Verify
                        }
                        Err(e) if e.is_conflict() && !conflict_seen => {
                            conflict_seen = true;
                            info!(tag, "Release already exists, verifying it");
                            match destination.get_release_by_tag(repo, tag).await {
                                Ok(Some(existing)) => Step::Existing(existing),
                                Ok(None) => return outcome.failed(e),
                                Err(lookup) => return outcome.failed(lookup),
                            }
                        }
                        Err(e) => return outcome.failed(e),
                    }
                }
                Step::Existing(existing) => {
                    match verify_assets(&release.assets, &existing.assets) {
                        Verification::Verified => {
                            debug!(tag, "Release already complete");
                            return outcome.finish(Verification::Verified);
                        }
                        incomplete if !incomplete.has_mismatch() => {
                            let missing = incomplete.missing();
                            info!(tag, missing = missing.len(), "Uploading missing assets");
                            outcome.action = ReleaseAction::Repaired;
                            let assets = release
                                .assets
                                .iter()
                                .filter(|a| missing.contains(&a.name));
                            self.upload(&mut outcome, existing.id, assets).await;
                            Step::Verify
                        }
                        incomplete if !recreated => {
                            warn!(tag, verification = %incomplete, "Recreating release");
                            if let Err(e) = destination.delete_release(repo, existing.id).await {
                                return outcome.failed(e);
                            }
                            recreated = true;
                            Step::Create
                        }
                        incomplete => return outcome.finish(incomplete),
                    }
                }
                Step::Verify => {
                    let verification = match destination.get_release_by_tag(repo, tag).await {
                        Ok(Some(current)) => verify_assets(&release.assets, &current.assets),
                        Ok(None) => verify_assets(&release.assets, &[]),
                        Err(e) => {
                            warn!(tag, error = %e, "Could not re-read release for verification");
                            verify_assets(&release.assets, &[])
                        }
                    };
                    if !verification.is_verified() {
                        warn!(tag, %verification, "Release incomplete");
                    }
                    return outcome.finish(verification);
                }
            };
        }
    }

    async fn upload(
        &self,
        outcome: &mut ReleaseOutcome,
        release_id: u64,
        assets: impl Iterator<Item = &SourceAsset>,
    ) {
        outcome.state = ReleaseState::AssetsUploading;
        for asset in assets {
            outcome.attempted += 1;
            match self.transfer(release_id, asset).await {
                Ok(()) => outcome.uploaded += 1,
                Err(e) => warn!(
                    tag = %outcome.tag,
                    asset = %asset.name,
                    size = asset.size,
                    error = %e,
                    "Asset transfer failed"
                ),
            }
        }
    }

    async fn transfer(&self, release_id: u64, asset: &SourceAsset) -> Result<()> {
        let data = self
            .ctx
            .source
            .download_asset(asset, download_timeout(asset.size))
            .await?;
        debug!(asset = %asset.name, bytes = data.len(), "Downloaded asset");
        self.ctx
            .destination
            .upload_release_asset(
                self.ctx.dest_repo,
                release_id,
                &asset.name,
                data,
                upload_timeout(asset.size),
            )
            .await
    }
}
