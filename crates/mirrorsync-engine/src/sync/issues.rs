//! Issue synchronization.

use std::collections::HashSet;

use tracing::{info, warn};

use super::{place_item, CommentSynchronizer, ItemSyncReport, Placement, SyncContext};
use crate::error::Result;
use crate::identity::MarkerKind;
use crate::pagination::{fetch_all, SOURCE_PAGE_SIZE};
use crate::render;
use crate::types::{EntityState, IssueDraft, SourceIssue};

pub struct IssueSynchronizer<'a> {
    ctx: SyncContext<'a>,
}

/// PATCH payload. Only a closed source sets the state, so a mirror is never
/// reopened.
pub fn update_draft(issue: &SourceIssue) -> IssueDraft {
    IssueDraft {
        title: render::issue_title(issue),
        body: render::issue_body(issue),
        state: issue.state.is_closed().then_some(EntityState::Closed),
        closed: None,
    }
}

pub fn create_draft(issue: &SourceIssue) -> IssueDraft {
    IssueDraft {
        title: render::issue_title(issue),
        body: render::issue_body(issue),
        state: None,
        closed: issue.state.is_closed().then_some(true),
    }
}

impl<'a> IssueSynchronizer<'a> {
    pub fn new(ctx: SyncContext<'a>) -> Self {
        Self { ctx }
    }

    /// Mirror every source issue and its comments.
    pub async fn sync(&self) -> Result<ItemSyncReport> {
        let (source, source_repo) = (self.ctx.source, self.ctx.source_repo);
        let issues: Vec<SourceIssue> = fetch_all(SOURCE_PAGE_SIZE, move |page| {
            source.list_issues(source_repo, page, SOURCE_PAGE_SIZE)
        })
        .await?
        .into_iter()
        .filter(|issue| !issue.is_pull_request())
        .collect();

        let mut map = self.ctx.identity_map(MarkerKind::Issue).await?;
        info!(
            repo = %self.ctx.dest_repo,
            source = issues.len(),
            mapped = map.len(),
            "Mirroring issues"
        );

        let comments = CommentSynchronizer::new(self.ctx);
        let mut processed = HashSet::new();
        let mut report = ItemSyncReport::default();

        for issue in &issues {
            if !processed.insert(issue.number) {
                warn!(number = issue.number, "Source issue listed twice, skipping");
                report.counts.skipped += 1;
                continue;
            }

            let placement = place_item(
                &self.ctx,
                &mut map,
                issue.number,
                &update_draft(issue),
                &create_draft(issue),
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

            match comments.sync_issue_thread(issue.number, parent).await {
                Ok(counts) => report.comments += counts,
                Err(e) => {
                    warn!(number = issue.number, parent, error = %e, "Failed to mirror issue comments");
                    report.thread_errors += 1;
                }
            }
        }

        info!(
            repo = %self.ctx.dest_repo,
            counts = %report.counts,
            comments = %report.comments,
            "Issues mirrored"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{source_issue, FakeDestination, FakeSource};
    use crate::types::RepoRef;

    fn repos() -> (RepoRef, RepoRef) {
        (RepoRef::new("octo", "widgets"), RepoRef::new("mirror", "widgets"))
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let source = FakeSource::default();
        source.set_issues(vec![
            source_issue(1, "First", EntityState::Open),
            source_issue(2, "Second", EntityState::Closed),
        ]);
        let destination = FakeDestination::default();
        let (src, dst) = repos();
        let sync = IssueSynchronizer::new(SyncContext::new(&source, &destination, &src, &dst));

        let first = sync.sync().await.unwrap();
        assert_eq!(first.counts.created, 2);

        let second = sync.sync().await.unwrap();
        assert_eq!(second.counts.created, 0);
        assert_eq!(second.counts.updated, 2);
        assert_eq!(destination.issue_count(), 2);
    }

    #[tokio::test]
    async fn test_pull_requests_are_filtered_out() {
        let source = FakeSource::default();
        let mut pr = source_issue(3, "A pull request", EntityState::Open);
        pr.pull_request = Some(serde_json::json!({}));
        source.set_issues(vec![source_issue(1, "Issue", EntityState::Open), pr]);
        let destination = FakeDestination::default();
        let (src, dst) = repos();

        let report = IssueSynchronizer::new(SyncContext::new(&source, &destination, &src, &dst))
            .sync()
            .await
            .unwrap();

        assert_eq!(report.counts.created, 1);
        assert_eq!(destination.issue_count(), 1);
    }

    #[tokio::test]
    async fn test_close_propagates_but_reopen_does_not() {
        let source = FakeSource::default();
        source.set_issues(vec![source_issue(1, "Bug", EntityState::Open)]);
        let destination = FakeDestination::default();
        let (src, dst) = repos();
        let sync = IssueSynchronizer::new(SyncContext::new(&source, &destination, &src, &dst));

        sync.sync().await.unwrap();
        assert_eq!(destination.issue_state(1), Some(EntityState::Open));

        source.set_issues(vec![source_issue(1, "Bug", EntityState::Closed)]);
        sync.sync().await.unwrap();
        assert_eq!(destination.issue_state(1), Some(EntityState::Closed));

        source.set_issues(vec![source_issue(1, "Bug", EntityState::Open)]);
        sync.sync().await.unwrap();
        assert_eq!(destination.issue_state(1), Some(EntityState::Closed));
        assert!(destination
            .issue_patches()
            .iter()
            .all(|(_, draft)| draft.state != Some(EntityState::Open)));
    }

    #[tokio::test]
    async fn test_title_marker_fallback_adopts_existing_issue() {
        let source = FakeSource::default();
        source.set_issues(vec![source_issue(7, "Renamed upstream", EntityState::Open)]);
        let destination = FakeDestination::default();
        // Body rewritten by hand, only the title marker survives.
        destination.add_issue("[GH-7] Old title", Some("edited"), EntityState::Open);
        let (src, dst) = repos();

        let report = IssueSynchronizer::new(SyncContext::new(&source, &destination, &src, &dst))
            .sync()
            .await
            .unwrap();

        assert_eq!(report.counts.updated, 1);
        assert_eq!(report.counts.created, 0);
        assert_eq!(destination.issue_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_update_is_skipped_not_recreated() {
        let source = FakeSource::default();
        source.set_issues(vec![source_issue(1, "Bug", EntityState::Open)]);
        let destination = FakeDestination::default();
        let (src, dst) = repos();
        let sync = IssueSynchronizer::new(SyncContext::new(&source, &destination, &src, &dst));
        sync.sync().await.unwrap();

        destination.fail_issue_updates(true);
        let report = sync.sync().await.unwrap();

        assert_eq!(report.counts.skipped, 1);
        assert_eq!(report.counts.created, 0);
        assert_eq!(destination.issue_count(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_source_number_is_skipped() {
        let source = FakeSource::default();
        source.set_issues(vec![
            source_issue(4, "Once", EntityState::Open),
            source_issue(4, "Once", EntityState::Open),
        ]);
        let destination = FakeDestination::default();
        let (src, dst) = repos();

        let report = IssueSynchronizer::new(SyncContext::new(&source, &destination, &src, &dst))
            .sync()
            .await
            .unwrap();

        assert_eq!(report.counts.created, 1);
        assert_eq!(report.counts.skipped, 1);
    }

    #[tokio::test]
    async fn test_destination_listing_failure_aborts_before_writes() {
        let source = FakeSource::default();
        source.set_issues(vec![source_issue(1, "Bug", EntityState::Open)]);
        let destination = FakeDestination::default();
        destination.fail_issue_listing(true);
        let (src, dst) = repos();

        let result = IssueSynchronizer::new(SyncContext::new(&source, &destination, &src, &dst))
            .sync()
            .await;

        assert!(result.is_err());
        assert_eq!(destination.issue_count(), 0);
    }
}
