//! GitHub REST v3 implementation of [`SourceApi`].

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::Method;
use tracing::debug;

use crate::api::SourceApi;
use crate::client::{accept_headers, ApiClient};
use crate::error::Result;
use crate::types::{
    RepoRef, SourceAsset, SourceChangedFile, SourceComment, SourceCommit, SourceIssue,
    SourceLabel, SourceMilestone, SourcePullRequest, SourceRelease, SourceRepository,
    SourceReview, SourceReviewComment,
};

/// Public GitHub API endpoint.
pub const GITHUB_API_URL: &str = "https://api.github.com";

const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const GITHUB_API_VERSION: &str = "2022-11-28";

/// Read-only GitHub client.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    api: ApiClient,
}

impl GitHubClient {
    /// Client for api.github.com. Without a token, requests are anonymous and
    /// heavily rate limited.
    pub fn new(token: Option<String>) -> Result<Self> {
        Self::with_base_url(GITHUB_API_URL, token)
    }

    /// Client for another endpoint, such as GitHub Enterprise or a test server.
    pub fn with_base_url(base_url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let mut headers = accept_headers(GITHUB_ACCEPT);
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static(GITHUB_API_VERSION),
        );
        Ok(Self {
            api: ApiClient::new(base_url, token, headers)?,
        })
    }

    fn repo_path(repo: &RepoRef, rest: &str) -> String {
        format!("/repos/{}/{}{rest}", repo.owner, repo.name)
    }

    fn page_query(page: u32, per_page: u32, all_states: bool) -> Vec<(&'static str, String)> {
        let mut query = vec![("page", page.to_string()), ("per_page", per_page.to_string())];
        if all_states {
            query.push(("state", "all".to_string()));
        }
        query
    }
}

#[async_trait]
impl SourceApi for GitHubClient {
    async fn list_issues(
        &self,
        repo: &RepoRef,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<SourceIssue>> {
        self.api
            .get_json(
                &Self::repo_path(repo, "/issues"),
                &Self::page_query(page, per_page, true),
            )
            .await
    }

    async fn list_pulls(
        &self,
        repo: &RepoRef,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<SourcePullRequest>> {
        self.api
            .get_json(
                &Self::repo_path(repo, "/pulls"),
                &Self::page_query(page, per_page, true),
            )
            .await
    }

    async fn list_labels(
        &self,
        repo: &RepoRef,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<SourceLabel>> {
        self.api
            .get_json(
                &Self::repo_path(repo, "/labels"),
                &Self::page_query(page, per_page, false),
            )
            .await
    }

    async fn list_milestones(
        &self,
        repo: &RepoRef,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<SourceMilestone>> {
        self.api
            .get_json(
                &Self::repo_path(repo, "/milestones"),
                &Self::page_query(page, per_page, true),
            )
            .await
    }

    async fn list_releases(
        &self,
        repo: &RepoRef,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<SourceRelease>> {
        self.api
            .get_json(
                &Self::repo_path(repo, "/releases"),
                &Self::page_query(page, per_page, false),
            )
            .await
    }

    async fn list_issue_comments(
        &self,
        repo: &RepoRef,
        number: u64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<SourceComment>> {
        self.api
            .get_json(
                &Self::repo_path(repo, &format!("/issues/{number}/comments")),
                &Self::page_query(page, per_page, false),
            )
            .await
    }

    async fn list_review_comments(
        &self,
        repo: &RepoRef,
        number: u64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<SourceReviewComment>> {
        self.api
            .get_json(
                &Self::repo_path(repo, &format!("/pulls/{number}/comments")),
                &Self::page_query(page, per_page, false),
            )
            .await
    }

    async fn list_reviews(
        &self,
        repo: &RepoRef,
        number: u64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<SourceReview>> {
        self.api
            .get_json(
                &Self::repo_path(repo, &format!("/pulls/{number}/reviews")),
                &Self::page_query(page, per_page, false),
            )
            .await
    }

    async fn list_pull_commits(
        &self,
        repo: &RepoRef,
        number: u64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<SourceCommit>> {
        self.api
            .get_json(
                &Self::repo_path(repo, &format!("/pulls/{number}/commits")),
                &Self::page_query(page, per_page, false),
            )
            .await
    }

    async fn list_pull_files(
        &self,
        repo: &RepoRef,
        number: u64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<SourceChangedFile>> {
        self.api
            .get_json(
                &Self::repo_path(repo, &format!("/pulls/{number}/files")),
                &Self::page_query(page, per_page, false),
            )
            .await
    }

    async fn get_repository(&self, repo: &RepoRef) -> Result<SourceRepository> {
        self.api.get_json(&Self::repo_path(repo, ""), &[]).await
    }

    async fn download_asset(&self, asset: &SourceAsset, timeout: Duration) -> Result<Bytes> {
        debug!(asset = %asset.name, size = asset.size, ?timeout, "Downloading asset");
        let request = self
            .api
            .request(Method::GET, &asset.browser_download_url)
            .header(ACCEPT, "application/octet-stream")
            .timeout(timeout);
        let response = self.api.send(request).await?;
        Ok(response.bytes().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_paths() {
        let repo = RepoRef::new("octo", "widgets");
        assert_eq!(
            GitHubClient::repo_path(&repo, "/pulls/3/files"),
            "/repos/octo/widgets/pulls/3/files"
        );
        assert_eq!(GitHubClient::repo_path(&repo, ""), "/repos/octo/widgets");
    }

    #[test]
    fn test_page_query() {
        let query = GitHubClient::page_query(2, 100, true);
        assert!(query.contains(&("per_page", "100".to_string())));
        assert!(query.contains(&("state", "all".to_string())));
    }
}
