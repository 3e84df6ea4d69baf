//! Pull requests, mirrored as destination issues.
//!
//! The destination already holds the branches through its code mirror, so a
//! pull request is represented by an issue describing it, followed by its
//! conversation, reviews and inline review comments.

use std::collections::HashSet;

use tracing::{info, warn};

use super::{place_item, CommentSynchronizer, ItemSyncReport, Placement, SyncContext};
use crate::error::Result;
use crate::identity::MarkerKind;
use crate::pagination::{fetch_all, SOURCE_PAGE_SIZE};
use crate::render;
use crate::types::{EntityState, IssueDraft, SourceChangedFile, SourceCommit, SourcePullRequest};

pub struct PullRequestSynchronizer<'a> {
    ctx: SyncContext<'a>,
}

/// PATCH payload. Closed sources send both `closed` and `state`; an open
/// source sends neither, so nothing is ever reopened.
pub fn update_draft(
    pr: &SourcePullRequest,
    commits: Option<&[SourceCommit]>,
    files: Option<&[SourceChangedFile]>,
) -> IssueDraft {
    let closed = pr.state.is_closed();
    IssueDraft {
        title: render::pull_request_title(pr),
        body: render::pull_request_body(pr, commits, files),
        state: closed.then_some(EntityState::Closed),
        closed: closed.then_some(true),
    }
}

pub fn create_draft(
    pr: &SourcePullRequest,
    commits: Option<&[SourceCommit]>,
    files: Option<&[SourceChangedFile]>,
) -> IssueDraft {
    IssueDraft {
        title: render::pull_request_title(pr),
        body: render::pull_request_body(pr, commits, files),
        state: None,
        closed: pr.state.is_closed().then_some(true),
    }
}

impl<'a> PullRequestSynchronizer<'a> {
    pub fn new(ctx: SyncContext<'a>) -> Self {
        Self { ctx }
    }

    async fn commits(&self, number: u64) -> Option<Vec<SourceCommit>> {
        let (source, repo) = (self.ctx.source, self.ctx.source_repo);
        fetch_all(SOURCE_PAGE_SIZE, move |page| {
            source.list_pull_commits(repo, number, page, SOURCE_PAGE_SIZE)
        })
        .await
        .map_err(|e| warn!(number, error = %e, "Failed to fetch pull request commits"))
        .ok()
    }

    async fn files(&self, number: u64) -> Option<Vec<SourceChangedFile>> {
        let (source, repo) = (self.ctx.source, self.ctx.source_repo);
        fetch_all(SOURCE_PAGE_SIZE, move |page| {
            source.list_pull_files(repo, number, page, SOURCE_PAGE_SIZE)
        })
        .await
        .map_err(|e| warn!(number, error = %e, "Failed to fetch pull request files"))
        .ok()
    }

    /// Mirror every source pull request and its discussion.
    pub async fn sync(&self) -> Result<ItemSyncReport> {
        let (source, source_repo) = (self.ctx.source, self.ctx.source_repo);
        let pulls = fetch_all(SOURCE_PAGE_SIZE, move |page| {
            source.list_pulls(source_repo, page, SOURCE_PAGE_SIZE)
        })
        .await?;

        let mut map = self.ctx.identity_map(MarkerKind::PullRequest).await?;
        info!(
            repo = %self.ctx.dest_repo,
            source = pulls.len(),
            mapped = map.len(),
            "Mirroring pull requests"
        );

        let comments = CommentSynchronizer::new(self.ctx);
        let mut processed = HashSet::new();
        let mut report = ItemSyncReport::default();

        for pr in &pulls {
            if !processed.insert(pr.number) {
                warn!(number = pr.number, "Source pull request listed twice, skipping");
                report.counts.skipped += 1;
                continue;
            }

            let commits = self.commits(pr.number).await;
            let files = self.files(pr.number).await;
            let placement = place_item(
                &self.ctx,
                &mut map,
                pr.number,
                &update_draft(pr, commits.as_deref(), files.as_deref()),
                &create_draft(pr, commits.as_deref(), files.as_deref()),
            )
            .await;

            let parent = match placement {
                Placement::Updated(n) => {
                    report.counts.updated += 1;
                    n
                }
                Placement::Created(n) => {
                    report.counts.created += 1;
                    n
                }
                Placement::Skipped => {
                    report.counts.skipped += 1;
                    continue;
                }
            };

            match comments.sync_pull_request_thread(pr.number, parent).await {
                Ok(counts) => report.comments += counts,
                Err(e) => {
                    warn!(number = pr.number, parent, error = %e, "Failed to mirror pull request discussion");
                    report.thread_errors += 1;
                }
            }
        }

        info!(
            repo = %self.ctx.dest_repo,
            counts = %report.counts,
            comments = %report.comments,
            "Pull requests mirrored"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::IssueSynchronizer;
    use crate::testing::{source_issue, source_pull, FakeDestination, FakeSource};
    use crate::types::RepoRef;

    fn repos() -> (RepoRef, RepoRef) {
        (RepoRef::new("octo", "widgets"), RepoRef::new("mirror", "widgets"))
    }

    #[test]
    fn test_closed_update_sends_both_flags() {
        let draft = update_draft(&source_pull(1, EntityState::Closed, false), None, None);
        assert_eq!(draft.closed, Some(true));
        assert_eq!(draft.state, Some(EntityState::Closed));

        let draft = update_draft(&source_pull(1, EntityState::Open, false), None, None);
        assert_eq!(draft.closed, None);
        assert_eq!(draft.state, None);
    }

    #[tokio::test]
    async fn test_merged_pull_request_is_created_closed() {
        let source = FakeSource::default();
        source.set_pulls(vec![source_pull(5, EntityState::Closed, true)]);
        let destination = FakeDestination::default();
        let (src, dst) = repos();

        let report = PullRequestSynchronizer::new(SyncContext::new(&source, &destination, &src, &dst))
            .sync()
            .await
            .unwrap();

        assert_eq!(report.counts.created, 1);
        assert_eq!(destination.issue_state(1), Some(EntityState::Closed));
        assert!(destination.issue_title(1).unwrap().starts_with("[GH-PR-5] [MERGED] "));
    }

    #[tokio::test]
    async fn test_issue_and_pull_with_same_number_stay_separate() {
        let source = FakeSource::default();
        source.set_issues(vec![source_issue(5, "Issue five", EntityState::Open)]);
        source.set_pulls(vec![source_pull(5, EntityState::Open, false)]);
        let destination = FakeDestination::default();
        let (src, dst) = repos();
        let ctx = SyncContext::new(&source, &destination, &src, &dst);

        IssueSynchronizer::new(ctx).sync().await.unwrap();
        let first = PullRequestSynchronizer::new(ctx).sync().await.unwrap();
        assert_eq!(first.counts.created, 1);

        let issues = IssueSynchronizer::new(ctx).sync().await.unwrap();
        let pulls = PullRequestSynchronizer::new(ctx).sync().await.unwrap();
        assert_eq!(issues.counts.updated, 1);
        assert_eq!(pulls.counts.updated, 1);
        assert_eq!(destination.issue_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_commit_listing_still_mirrors() {
        let source = FakeSource::default();
        source.set_pulls(vec![source_pull(9, EntityState::Open, false)]);
        source.fail_pull_details(true);
        let destination = FakeDestination::default();
        let (src, dst) = repos();

        let report = PullRequestSynchronizer::new(SyncContext::new(&source, &destination, &src, &dst))
            .sync()
            .await
            .unwrap();

        assert_eq!(report.counts.created, 1);
    }
}
