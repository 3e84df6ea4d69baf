//! Gitea v1 implementation of [`DestinationApi`].

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde::Serialize;
use tracing::{debug, info};

use crate::api::DestinationApi;
use crate::client::{accept_headers, ApiClient};
use crate::error::Result;
use crate::types::{
    DestinationComment, DestinationIssue, DestinationLabel, DestinationMilestone,
    DestinationRelease, DestinationRepository, IssueDraft, LabelDraft, MilestoneDraft,
    ReleaseDraft, RepoRef, RepositoryDraft,
};

/// Read/write Gitea client rooted at the instance URL.
#[derive(Debug, Clone)]
pub struct GiteaClient {
    api: ApiClient,
}

#[derive(Serialize)]
struct DescriptionPatch<'a> {
    description: &'a str,
}

#[derive(Serialize)]
struct CommentPayload<'a> {
    body: &'a str,
}

impl GiteaClient {
    /// `url` is the web root of the instance, e.g. `https://gitea.example.com`.
    pub fn new(url: &str, token: impl Into<String>) -> Result<Self> {
        let base = format!("{}/api/v1", url.trim_end_matches('/'));
        Ok(Self {
            api: ApiClient::new(base, Some(token.into()), accept_headers("application/json"))?,
        })
    }

    fn repo_path(repo: &RepoRef, rest: &str) -> String {
        format!("/repos/{}/{}{rest}", repo.owner, repo.name)
    }

    /// Release lookup path with the tag as a single percent-encoded segment.
    ///
    /// Git ref names never contain spaces, so form encoding is exact here.
    fn release_tag_path(repo: &RepoRef, tag: &str) -> String {
        let tag: String = url::form_urlencoded::byte_serialize(tag.as_bytes()).collect();
        Self::repo_path(repo, &format!("/releases/tags/{tag}"))
    }

    fn page_query(page: u32, limit: u32) -> Vec<(&'static str, String)> {
        vec![("page", page.to_string()), ("limit", limit.to_string())]
    }
}

#[async_trait]
impl DestinationApi for GiteaClient {
    async fn list_issues(
        &self,
        repo: &RepoRef,
        page: u32,
        limit: u32,
    ) -> Result<Vec<DestinationIssue>> {
        let mut query = Self::page_query(page, limit);
        query.push(("state", "all".to_string()));
        query.push(("type", "issues".to_string()));
        self.api
            .get_json(&Self::repo_path(repo, "/issues"), &query)
            .await
    }

    async fn create_issue(&self, repo: &RepoRef, draft: &IssueDraft) -> Result<DestinationIssue> {
        self.api
            .post_json(&Self::repo_path(repo, "/issues"), draft)
            .await
    }

    async fn update_issue(
        &self,
        repo: &RepoRef,
        number: u64,
        draft: &IssueDraft,
    ) -> Result<DestinationIssue> {
        self.api
            .patch_json(&Self::repo_path(repo, &format!("/issues/{number}")), draft)
            .await
    }

    async fn list_comments(
        &self,
        repo: &RepoRef,
        number: u64,
        page: u32,
        _limit: u32,
    ) -> Result<Vec<DestinationComment>> {
        // The per-issue comment endpoint returns the whole thread at once.
        if page > 1 {
            return Ok(Vec::new());
        }
        self.api
            .get_json(
                &Self::repo_path(repo, &format!("/issues/{number}/comments")),
                &[],
            )
            .await
    }

    async fn create_comment(
        &self,
        repo: &RepoRef,
        number: u64,
        body: &str,
    ) -> Result<DestinationComment> {
        self.api
            .post_json(
                &Self::repo_path(repo, &format!("/issues/{number}/comments")),
                &CommentPayload { body },
            )
            .await
    }

    async fn list_labels(
        &self,
        repo: &RepoRef,
        page: u32,
        limit: u32,
    ) -> Result<Vec<DestinationLabel>> {
        self.api
            .get_json(
                &Self::repo_path(repo, "/labels"),
                &Self::page_query(page, limit),
            )
            .await
    }

    async fn create_label(&self, repo: &RepoRef, draft: &LabelDraft) -> Result<DestinationLabel> {
        self.api
            .post_json(&Self::repo_path(repo, "/labels"), draft)
            .await
    }

    async fn update_label(
        &self,
        repo: &RepoRef,
        id: u64,
        draft: &LabelDraft,
    ) -> Result<DestinationLabel> {
        self.api
            .patch_json(&Self::repo_path(repo, &format!("/labels/{id}")), draft)
            .await
    }

    async fn list_milestones(
        &self,
        repo: &RepoRef,
        page: u32,
        limit: u32,
    ) -> Result<Vec<DestinationMilestone>> {
        let mut query = Self::page_query(page, limit);
        query.push(("state", "all".to_string()));
        self.api
            .get_json(&Self::repo_path(repo, "/milestones"), &query)
            .await
    }

    async fn create_milestone(
        &self,
        repo: &RepoRef,
        draft: &MilestoneDraft,
    ) -> Result<DestinationMilestone> {
        self.api
            .post_json(&Self::repo_path(repo, "/milestones"), draft)
            .await
    }

    async fn update_milestone(
        &self,
        repo: &RepoRef,
        id: u64,
        draft: &MilestoneDraft,
    ) -> Result<DestinationMilestone> {
        self.api
            .patch_json(&Self::repo_path(repo, &format!("/milestones/{id}")), draft)
            .await
    }

    async fn get_release_by_tag(
        &self,
        repo: &RepoRef,
        tag: &str,
    ) -> Result<Option<DestinationRelease>> {
        match self
            .api
            .get_json(&Self::release_tag_path(repo, tag), &[])
            .await
        {
            Ok(release) => Ok(Some(release)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_release(
        &self,
        repo: &RepoRef,
        draft: &ReleaseDraft,
    ) -> Result<DestinationRelease> {
        self.api
            .post_json(&Self::repo_path(repo, "/releases"), draft)
            .await
    }

    async fn delete_release(&self, repo: &RepoRef, id: u64) -> Result<()> {
        self.api
            .delete(&Self::repo_path(repo, &format!("/releases/{id}")))
            .await
    }

    async fn upload_release_asset(
        &self,
        repo: &RepoRef,
        release_id: u64,
        name: &str,
        data: Bytes,
        timeout: Duration,
    ) -> Result<()> {
        let length = data.len() as u64;
        debug!(%repo, release_id, asset = name, length, ?timeout, "Uploading asset");

        let part = Part::stream_with_length(data, length).file_name(name.to_string());
        let form = Form::new().part("attachment", part);
        let request = self
            .api
            .request(
                Method::POST,
                &Self::repo_path(repo, &format!("/releases/{release_id}/assets")),
            )
            .query(&[("name", name)])
            .multipart(form)
            .timeout(timeout);
        self.api.send(request).await?;
        Ok(())
    }

    async fn trigger_mirror_sync(&self, repo: &RepoRef) -> Result<()> {
        info!(%repo, "Triggering mirror sync");
        self.api
            .post_empty(&Self::repo_path(repo, "/mirror-sync"))
            .await
    }

    async fn get_repository(&self, repo: &RepoRef) -> Result<Option<DestinationRepository>> {
        match self.api.get_json(&Self::repo_path(repo, ""), &[]).await {
            Ok(repository) => Ok(Some(repository)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_repository(&self, draft: &RepositoryDraft) -> Result<DestinationRepository> {
        self.api.post_json("/user/repos", draft).await
    }

    async fn update_description(&self, repo: &RepoRef, description: &str) -> Result<()> {
        let _: DestinationRepository = self
            .api
            .patch_json(
                &Self::repo_path(repo, ""),
                &DescriptionPatch { description },
            )
            .await?;
        Ok(())
    }

    async fn list_user_repositories(
        &self,
        page: u32,
        limit: u32,
    ) -> Result<Vec<DestinationRepository>> {
        self.api
            .get_json("/user/repos", &Self::page_query(page, limit))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_root() {
        let client = GiteaClient::new("https://gitea.local/", "tok").unwrap();
        assert_eq!(client.api.base_url(), "https://gitea.local/api/v1");
    }

    #[test]
    fn test_repo_path() {
        assert_eq!(
            GiteaClient::repo_path(&RepoRef::new("m", "widgets"), "/releases/tags/v1"),
            "/repos/m/widgets/releases/tags/v1"
        );
    }

    #[test]
    fn test_release_tag_is_one_path_segment() {
        let repo = RepoRef::new("m", "widgets");
        assert_eq!(
            GiteaClient::release_tag_path(&repo, "release/1.0"),
            "/repos/m/widgets/releases/tags/release%2F1.0"
        );
        assert_eq!(
            GiteaClient::release_tag_path(&repo, "v1.0+build.7"),
            "/repos/m/widgets/releases/tags/v1.0%2Bbuild.7"
        );
        assert_eq!(
            GiteaClient::release_tag_path(&repo, "v2.1.0-rc.1"),
            "/repos/m/widgets/releases/tags/v2.1.0-rc.1"
        );
    }
}
