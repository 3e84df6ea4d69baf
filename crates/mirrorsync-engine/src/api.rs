//! Service seams.
//!
//! The reconciliation engine only ever talks to the two services through these
//! traits. Listing methods return a single page so that [`crate::pagination`]
//! owns the paging loop for every collection.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::types::{
    DestinationComment, DestinationIssue, DestinationLabel, DestinationMilestone,
    DestinationRelease, DestinationRepository, IssueDraft, LabelDraft, MilestoneDraft,
    ReleaseDraft, RepoRef, RepositoryDraft, SourceAsset, SourceChangedFile, SourceComment,
    SourceCommit, SourceIssue, SourceLabel, SourceMilestone, SourcePullRequest, SourceRelease,
    SourceRepository, SourceReview, SourceReviewComment,
};

/// Read access to the source service.
#[async_trait]
pub trait SourceApi: Send + Sync {
    /// Issues in every state. Pull requests are included in this listing.
    async fn list_issues(&self, repo: &RepoRef, page: u32, per_page: u32)
        -> Result<Vec<SourceIssue>>;

    /// Pull requests in every state.
    async fn list_pulls(
        &self,
        repo: &RepoRef,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<SourcePullRequest>>;

    async fn list_labels(&self, repo: &RepoRef, page: u32, per_page: u32)
        -> Result<Vec<SourceLabel>>;

    async fn list_milestones(
        &self,
        repo: &RepoRef,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<SourceMilestone>>;

    async fn list_releases(
        &self,
        repo: &RepoRef,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<SourceRelease>>;

    /// Conversation comments of an issue or pull request.
    async fn list_issue_comments(
        &self,
        repo: &RepoRef,
        number: u64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<SourceComment>>;

    /// Inline diff comments of a pull request.
    async fn list_review_comments(
        &self,
        repo: &RepoRef,
        number: u64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<SourceReviewComment>>;

    async fn list_reviews(
        &self,
        repo: &RepoRef,
        number: u64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<SourceReview>>;

    async fn list_pull_commits(
        &self,
        repo: &RepoRef,
        number: u64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<SourceCommit>>;

    async fn list_pull_files(
        &self,
        repo: &RepoRef,
        number: u64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<SourceChangedFile>>;

    async fn get_repository(&self, repo: &RepoRef) -> Result<SourceRepository>;

    /// Download a release asset within `timeout`.
    async fn download_asset(&self, asset: &SourceAsset, timeout: Duration) -> Result<Bytes>;
}

/// Read/write access to the destination service.
#[async_trait]
pub trait DestinationApi: Send + Sync {
    /// Issues in every state, including mirrored pull requests.
    async fn list_issues(
        &self,
        repo: &RepoRef,
        page: u32,
        limit: u32,
    ) -> Result<Vec<DestinationIssue>>;

    async fn create_issue(&self, repo: &RepoRef, draft: &IssueDraft) -> Result<DestinationIssue>;

    async fn update_issue(
        &self,
        repo: &RepoRef,
        number: u64,
        draft: &IssueDraft,
    ) -> Result<DestinationIssue>;

    async fn list_comments(
        &self,
        repo: &RepoRef,
        number: u64,
        page: u32,
        limit: u32,
    ) -> Result<Vec<DestinationComment>>;

    async fn create_comment(
        &self,
        repo: &RepoRef,
        number: u64,
        body: &str,
    ) -> Result<DestinationComment>;

    async fn list_labels(
        &self,
        repo: &RepoRef,
        page: u32,
        limit: u32,
    ) -> Result<Vec<DestinationLabel>>;

    async fn create_label(&self, repo: &RepoRef, draft: &LabelDraft) -> Result<DestinationLabel>;

    async fn update_label(
        &self,
        repo: &RepoRef,
        id: u64,
        draft: &LabelDraft,
    ) -> Result<DestinationLabel>;

    async fn list_milestones(
        &self,
        repo: &RepoRef,
        page: u32,
        limit: u32,
    ) -> Result<Vec<DestinationMilestone>>;

    async fn create_milestone(
        &self,
        repo: &RepoRef,
        draft: &MilestoneDraft,
    ) -> Result<DestinationMilestone>;

    async fn update_milestone(
        &self,
        repo: &RepoRef,
        id: u64,
        draft: &MilestoneDraft,
    ) -> Result<DestinationMilestone>;

    /// Release for `tag`, or `None` when the destination has none.
    async fn get_release_by_tag(
        &self,
        repo: &RepoRef,
        tag: &str,
    ) -> Result<Option<DestinationRelease>>;

    async fn create_release(
        &self,
        repo: &RepoRef,
        draft: &ReleaseDraft,
    ) -> Result<DestinationRelease>;

    async fn delete_release(&self, repo: &RepoRef, id: u64) -> Result<()>;

    async fn upload_release_asset(
        &self,
        repo: &RepoRef,
        release_id: u64,
        name: &str,
        data: Bytes,
        timeout: Duration,
    ) -> Result<()>;

    /// Ask the destination to pull the latest code from its upstream.
    async fn trigger_mirror_sync(&self, repo: &RepoRef) -> Result<()>;

    /// Repository metadata, or `None` if it does not exist.
    async fn get_repository(&self, repo: &RepoRef) -> Result<Option<DestinationRepository>>;

    /// Create a repository owned by the authenticated user.
    async fn create_repository(&self, draft: &RepositoryDraft) -> Result<DestinationRepository>;

    async fn update_description(&self, repo: &RepoRef, description: &str) -> Result<()>;

    /// Repositories visible to the authenticated user.
    async fn list_user_repositories(
        &self,
        page: u32,
        limit: u32,
    ) -> Result<Vec<DestinationRepository>>;
}
