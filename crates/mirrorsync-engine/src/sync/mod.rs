//! Per-entity synchronizers.
//!
//! Each synchronizer lists the destination collection once, resolves what is
//! already mirrored, then creates, updates or skips every source item. Errors
//! on individual items are logged and counted; only a failed listing aborts
//! the synchronizer.

pub mod comments;
pub mod issues;
pub mod labels;
pub mod milestones;
pub mod pulls;

use tracing::{debug, warn};

use crate::api::{DestinationApi, SourceApi};
use crate::error::Result;
use crate::identity::{IdentityMap, MarkerKind};
use crate::pagination::{fetch_all, DESTINATION_PAGE_SIZE};
use crate::types::{CommentCounts, DestinationIssue, IssueDraft, RepoRef, SyncCounts};

pub use comments::{CommentSynchronizer, Fingerprint};
pub use issues::IssueSynchronizer;
pub use labels::LabelSynchronizer;
pub use milestones::MilestoneSynchronizer;
pub use pulls::PullRequestSynchronizer;

/// Services and repositories one synchronizer pass operates on.
#[derive(Clone, Copy)]
pub struct SyncContext<'a> {
    pub source: &'a dyn SourceApi,
    pub destination: &'a dyn DestinationApi,
    pub source_repo: &'a RepoRef,
    pub dest_repo: &'a RepoRef,
}

impl<'a> SyncContext<'a> {
    pub fn new(
        source: &'a dyn SourceApi,
        destination: &'a dyn DestinationApi,
        source_repo: &'a RepoRef,
        dest_repo: &'a RepoRef,
    ) -> Self {
        Self {
            source,
            destination,
            source_repo,
            dest_repo,
        }
    }

    /// Every destination issue, mirrored pull requests included.
    pub async fn destination_issues(&self) -> Result<Vec<DestinationIssue>> {
        let destination = self.destination;
        let repo = self.dest_repo;
        fetch_all(DESTINATION_PAGE_SIZE, move |page| {
            destination.list_issues(repo, page, DESTINATION_PAGE_SIZE)
        })
        .await
    }

    /// Fresh identity map for `kind` built from the destination's issues.
    pub async fn identity_map(&self, kind: MarkerKind) -> Result<IdentityMap> {
        let issues = self.destination_issues().await?;
        Ok(IdentityMap::resolve(kind, &issues))
    }
}

/// Result of an issue or pull request pass, including the comment threads
/// mirrored alongside each item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemSyncReport {
    pub counts: SyncCounts,
    pub comments: CommentCounts,
    /// Threads whose listing failed and were left for the next run.
    pub thread_errors: usize,
}

impl ItemSyncReport {
    /// Whether anything was skipped or failed.
    pub fn is_clean(&self) -> bool {
        self.counts.skipped == 0 && self.comments.failed == 0 && self.thread_errors == 0
    }
}

/// Where a source item ended up on the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placement {
    Updated(u64),
    Created(u64),
    Skipped,
}

/// Apply the update-or-create policy for one issue-like source item.
///
/// 1. Mapped by marker: PATCH it. A failed PATCH skips the item.
/// 2. Unmapped but a destination title carries the exact marker: PATCH it
///    and register the mapping. A failed PATCH skips the item.
/// 3. Otherwise POST, then register the new number immediately.
pub(crate) async fn place_item(
    ctx: &SyncContext<'_>,
    map: &mut IdentityMap,
    source_number: u64,
    update: &IssueDraft,
    create: &IssueDraft,
) -> Placement {
    let kind = map.kind();
    let existing = map
        .get(source_number)
        .map(|n| (n, false))
        .or_else(|| map.find_by_title_marker(source_number).map(|n| (n, true)));

    if let Some((number, by_title)) = existing {
        return match ctx
            .destination
            .update_issue(ctx.dest_repo, number, update)
            .await
        {
            Ok(_) => {
                if by_title {
                    map.register(source_number, number);
                }
                debug!(%kind, source_number, number, by_title, "Updated mirror");
                Placement::Updated(number)
            }
            Err(e) => {
                warn!(%kind, source_number, number, error = %e, "Failed to update mirror");
                Placement::Skipped
            }
        };
    }

    match ctx.destination.create_issue(ctx.dest_repo, create).await {
        Ok(created) => {
            map.register(source_number, created.number);
            map.record_title(&created.title, created.number);
            debug!(%kind, source_number, number = created.number, "Created mirror");
            Placement::Created(created.number)
        }
        Err(e) => {
            warn!(%kind, source_number, error = %e, "Failed to create mirror");
            Placement::Skipped
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::issues::{create_draft, update_draft};
    use crate::testing::{source_issue, FakeDestination, FakeSource};
    use crate::types::EntityState;

    #[tokio::test]
    async fn test_created_item_is_mapped_immediately() {
        let source = FakeSource::default();
        let destination = FakeDestination::default();
        let (src, dst) = (RepoRef::new("octo", "widgets"), RepoRef::new("mirror", "widgets"));
        let ctx = SyncContext::new(&source, &destination, &src, &dst);
        let issue = source_issue(4, "Crash on start", EntityState::Open);
        let mut map = IdentityMap::new(MarkerKind::Issue);

        let first =
            place_item(&ctx, &mut map, 4, &update_draft(&issue), &create_draft(&issue)).await;
        let Placement::Created(number) = first else {
            panic!("expected a created mirror, got {first:?}");
        };
        assert_eq!(map.get(4), Some(number));

        let second =
            place_item(&ctx, &mut map, 4, &update_draft(&issue), &create_draft(&issue)).await;
        assert_eq!(second, Placement::Updated(number));
        assert_eq!(destination.issue_count(), 1);
        let patched: Vec<u64> = destination.issue_patches().iter().map(|(n, _)| *n).collect();
        assert_eq!(patched, vec![number]);
    }
}
