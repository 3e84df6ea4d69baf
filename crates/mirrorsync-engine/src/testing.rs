//! In-memory service fakes for unit tests.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::api::{DestinationApi, SourceApi};
use crate::config::{RepoConfig, RepoConfigStore};
use crate::error::{Result, SyncError};
use crate::types::*;

fn page_of<T: Clone>(items: &[T], page: u32, per_page: u32) -> Vec<T> {
    let start = (page.saturating_sub(1) as usize) * per_page as usize;
    items
        .iter()
        .skip(start)
        .take(per_page as usize)
        .cloned()
        .collect()
}

fn server_error(what: &str) -> SyncError {
    SyncError::Api {
        status: 500,
        body: format!("{what} unavailable"),
    }
}

fn timestamp() -> chrono::DateTime<chrono::Utc> {
    "2024-03-01T12:00:00Z".parse().unwrap()
}

fn user(login: &str) -> User {
    User {
        login: login.to_string(),
    }
}

pub fn source_comment(login: &str, body: &str) -> SourceComment {
    SourceComment {
        user: user(login),
        body: Some(body.to_string()),
        created_at: timestamp(),
    }
}

pub fn source_issue(number: u64, title: &str, state: EntityState) -> SourceIssue {
    SourceIssue {
        number,
        title: title.to_string(),
        body: Some(format!("Body of {title}")),
        state,
        user: user("alice"),
        created_at: timestamp(),
        html_url: format!("https://github.com/octo/widgets/issues/{number}"),
        labels: Vec::new(),
        milestone: None,
        assignees: Vec::new(),
        pull_request: None,
    }
}

pub fn source_pull(number: u64, state: EntityState, merged: bool) -> SourcePullRequest {
    let branch = |name: &str| BranchRef {
        label: format!("octo:{name}"),
        ref_name: name.to_string(),
    };
    SourcePullRequest {
        number,
        title: format!("Pull request {number}"),
        body: Some("Adds things".to_string()),
        state,
        user: user("bob"),
        created_at: timestamp(),
        html_url: format!("https://github.com/octo/widgets/pull/{number}"),
        merged,
        merged_at: merged.then(timestamp),
        merge_commit_sha: merged.then(|| "abc123".to_string()),
        closed_at: state.is_closed().then(timestamp),
        head: branch("feature"),
        base: branch("main"),
        labels: Vec::new(),
        milestone: None,
        assignees: Vec::new(),
    }
}

pub fn source_release(tag: &str, assets: &[(&str, u64)]) -> SourceRelease {
    SourceRelease {
        tag_name: tag.to_string(),
        name: Some(format!("Release {tag}")),
        body: None,
        draft: false,
        prerelease: false,
        assets: assets
            .iter()
            .map(|(name, size)| SourceAsset {
                name: name.to_string(),
                size: *size,
                browser_download_url: format!("https://github.com/octo/widgets/releases/download/{tag}/{name}"),
            })
            .collect(),
    }
}

#[derive(Default)]
struct SourceState {
    issues: Vec<SourceIssue>,
    pulls: Vec<SourcePullRequest>,
    labels: Vec<SourceLabel>,
    milestones: Vec<SourceMilestone>,
    releases: Vec<SourceRelease>,
    issue_comments: HashMap<u64, Vec<SourceComment>>,
    reviews: HashMap<u64, Vec<SourceReview>>,
    review_comments: HashMap<u64, Vec<SourceReviewComment>>,
    fail_listings: bool,
    fail_pull_details: bool,
    has_wiki: bool,
}

/// Source service backed by vectors.
#[derive(Default)]
pub struct FakeSource {
    state: Mutex<SourceState>,
}

impl FakeSource {
    pub fn set_issues(&self, issues: Vec<SourceIssue>) {
        self.state.lock().issues = issues;
    }

    pub fn set_pulls(&self, pulls: Vec<SourcePullRequest>) {
        self.state.lock().pulls = pulls;
    }

    pub fn set_labels(&self, labels: Vec<SourceLabel>) {
        self.state.lock().labels = labels;
    }

    pub fn set_milestones(&self, milestones: Vec<SourceMilestone>) {
        self.state.lock().milestones = milestones;
    }

    pub fn set_releases(&self, releases: Vec<SourceRelease>) {
        self.state.lock().releases = releases;
    }

    pub fn add_issue_comment(&self, number: u64, comment: SourceComment) {
        self.state
            .lock()
            .issue_comments
            .entry(number)
            .or_default()
            .push(comment);
    }

    pub fn add_review(&self, number: u64, review: SourceReview) {
        self.state.lock().reviews.entry(number).or_default().push(review);
    }

    pub fn add_review_comment(&self, number: u64, comment: SourceReviewComment) {
        self.state
            .lock()
            .review_comments
            .entry(number)
            .or_default()
            .push(comment);
    }

    /// Make every top-level listing fail.
    pub fn fail_listings(&self, fail: bool) {
        self.state.lock().fail_listings = fail;
    }

    /// Make pull request commit and file listings fail.
    pub fn fail_pull_details(&self, fail: bool) {
        self.state.lock().fail_pull_details = fail;
    }

    pub fn set_has_wiki(&self, has_wiki: bool) {
        self.state.lock().has_wiki = has_wiki;
    }

    fn listing<T: Clone>(
        &self,
        select: impl FnOnce(&SourceState) -> &Vec<T>,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<T>> {
        let state = self.state.lock();
        if state.fail_listings {
            return Err(server_error("source listing"));
        }
        Ok(page_of(select(&state), page, per_page))
    }

    fn thread<T: Clone>(
        &self,
        select: impl FnOnce(&SourceState) -> Option<&Vec<T>>,
        page: u32,
        per_page: u32,
    ) -> Vec<T> {
        let state = self.state.lock();
        select(&state)
            .map(|items| page_of(items, page, per_page))
            .unwrap_or_default()
    }
}

#[async_trait]
impl SourceApi for FakeSource {
    async fn list_issues(&self, _: &RepoRef, page: u32, per_page: u32) -> Result<Vec<SourceIssue>> {
        self.listing(|s| &s.issues, page, per_page)
    }

    async fn list_pulls(
        &self,
        _: &RepoRef,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<SourcePullRequest>> {
        self.listing(|s| &s.pulls, page, per_page)
    }

    async fn list_labels(&self, _: &RepoRef, page: u32, per_page: u32) -> Result<Vec<SourceLabel>> {
        self.listing(|s| &s.labels, page, per_page)
    }

    async fn list_milestones(
        &self,
        _: &RepoRef,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<SourceMilestone>> {
        self.listing(|s| &s.milestones, page, per_page)
    }

    async fn list_releases(
        &self,
        _: &RepoRef,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<SourceRelease>> {
        self.listing(|s| &s.releases, page, per_page)
    }

    async fn list_issue_comments(
        &self,
        _: &RepoRef,
        number: u64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<SourceComment>> {
        Ok(self.thread(|s| s.issue_comments.get(&number), page, per_page))
    }

    async fn list_review_comments(
        &self,
        _: &RepoRef,
        number: u64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<SourceReviewComment>> {
        Ok(self.thread(|s| s.review_comments.get(&number), page, per_page))
    }

    async fn list_reviews(
        &self,
        _: &RepoRef,
        number: u64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<SourceReview>> {
        Ok(self.thread(|s| s.reviews.get(&number), page, per_page))
    }

    async fn list_pull_commits(
        &self,
        _: &RepoRef,
        _: u64,
        _: u32,
        _: u32,
    ) -> Result<Vec<SourceCommit>> {
        if self.state.lock().fail_pull_details {
            return Err(server_error("pull request commits"));
        }
        Ok(Vec::new())
    }

    async fn list_pull_files(
        &self,
        _: &RepoRef,
        _: u64,
        _: u32,
        _: u32,
    ) -> Result<Vec<SourceChangedFile>> {
        if self.state.lock().fail_pull_details {
            return Err(server_error("pull request files"));
        }
        Ok(Vec::new())
    }

    async fn get_repository(&self, _: &RepoRef) -> Result<SourceRepository> {
        Ok(SourceRepository {
            has_wiki: self.state.lock().has_wiki,
            description: Some("Widgets for everyone".to_string()),
        })
    }

    async fn download_asset(&self, asset: &SourceAsset, _: Duration) -> Result<Bytes> {
        Ok(Bytes::from(vec![0u8; asset.size as usize]))
    }
}

#[derive(Default)]
struct DestinationState {
    issues: Vec<DestinationIssue>,
    patches: Vec<(u64, IssueDraft)>,
    fail_issue_updates: bool,
    fail_issue_listing: bool,
    comments: HashMap<u64, Vec<DestinationComment>>,
    next_comment_id: u64,
    fail_comment_creation: bool,
    labels: Vec<DestinationLabel>,
    milestones: Vec<DestinationMilestone>,
    releases: Vec<DestinationRelease>,
    next_release_id: u64,
    next_asset_id: u64,
    hidden_lookups: usize,
    deleted_releases: usize,
    failing_uploads: HashSet<String>,
    upload_log: Vec<String>,
    repositories: Vec<DestinationRepository>,
    mirror_syncs: Vec<RepoRef>,
    fail_mirror_sync: bool,
}

impl DestinationState {
    fn add_release(&mut self, tag: &str, assets: &[(&str, u64)]) -> DestinationRelease {
        self.next_release_id += 1;
        let mut release = DestinationRelease {
            id: self.next_release_id,
            tag_name: tag.to_string(),
            assets: Vec::new(),
        };
        for (name, size) in assets {
            self.next_asset_id += 1;
            release.assets.push(DestinationAsset {
                id: self.next_asset_id,
                name: name.to_string(),
                size: *size,
            });
        }
        self.releases.push(release.clone());
        release
    }
}

/// Destination service backed by vectors. Issue numbers start at 1.
#[derive(Default)]
pub struct FakeDestination {
    state: Mutex<DestinationState>,
}

impl FakeDestination {
    /// Insert an issue directly, as if a user had created it.
    pub fn add_issue(&self, title: &str, body: Option<&str>, state: EntityState) -> u64 {
        let mut s = self.state.lock();
        let number = s.issues.len() as u64 + 1;
        s.issues.push(DestinationIssue {
            number,
            title: title.to_string(),
            body: body.map(str::to_string),
            state,
        });
        number
    }

    pub fn issue_count(&self) -> usize {
        self.state.lock().issues.len()
    }

    pub fn issue_state(&self, number: u64) -> Option<EntityState> {
        self.issue(number).map(|i| i.state)
    }

    pub fn issue_title(&self, number: u64) -> Option<String> {
        self.issue(number).map(|i| i.title)
    }

    fn issue(&self, number: u64) -> Option<DestinationIssue> {
        self.state
            .lock()
            .issues
            .iter()
            .find(|i| i.number == number)
            .cloned()
    }

    /// Every PATCH received, in order.
    pub fn issue_patches(&self) -> Vec<(u64, IssueDraft)> {
        self.state.lock().patches.clone()
    }

    pub fn fail_issue_updates(&self, fail: bool) {
        self.state.lock().fail_issue_updates = fail;
    }

    pub fn fail_issue_listing(&self, fail: bool) {
        self.state.lock().fail_issue_listing = fail;
    }

    /// Bodies of the comments on `number`.
    pub fn comments_on(&self, number: u64) -> Vec<String> {
        self.state
            .lock()
            .comments
            .get(&number)
            .map(|c| c.iter().filter_map(|c| c.body.clone()).collect())
            .unwrap_or_default()
    }

    pub fn fail_comment_creation(&self, fail: bool) {
        self.state.lock().fail_comment_creation = fail;
    }

    pub fn label_names(&self) -> Vec<String> {
        self.state
            .lock()
            .labels
            .iter()
            .map(|l| l.name.clone())
            .collect()
    }

    pub fn add_milestone(&self, title: &str) {
        let mut s = self.state.lock();
        let id = s.milestones.len() as u64 + 1;
        s.milestones.push(DestinationMilestone {
            id,
            title: title.to_string(),
        });
    }

    pub fn add_release(&self, tag: &str, assets: &[(&str, u64)]) {
        self.state.lock().add_release(tag, assets);
    }

    /// The next `count` tag lookups report no release.
    pub fn hide_release_lookups(&self, count: usize) {
        self.state.lock().hidden_lookups = count;
    }

    pub fn deleted_releases(&self) -> usize {
        self.state.lock().deleted_releases
    }

    pub fn fail_asset_upload(&self, name: &str) {
        self.state.lock().failing_uploads.insert(name.to_string());
    }

    pub fn clear_upload_failures(&self) {
        self.state.lock().failing_uploads.clear();
    }

    /// Names of successfully uploaded assets, in order.
    pub fn upload_log(&self) -> Vec<String> {
        self.state.lock().upload_log.clone()
    }

    pub fn clear_upload_log(&self) {
        self.state.lock().upload_log.clear();
    }

    pub fn release_asset_names(&self, tag: &str) -> Vec<String> {
        self.state
            .lock()
            .releases
            .iter()
            .find(|r| r.tag_name == tag)
            .map(|r| r.assets.iter().map(|a| a.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Register a repository. `original_url` makes it a pull mirror.
    pub fn add_repository(&self, repo: &RepoRef, original_url: Option<&str>) {
        self.state.lock().repositories.push(DestinationRepository {
            name: repo.name.clone(),
            owner: DestinationOwner {
                login: repo.owner.clone(),
            },
            mirror: original_url.is_some(),
            original_url: original_url.map(str::to_string),
            description: Some(format!("Mirror of {repo}")),
        });
    }

    pub fn repository_description(&self, repo: &RepoRef) -> Option<String> {
        self.state
            .lock()
            .repositories
            .iter()
            .find(|r| r.repo_ref() == *repo)
            .and_then(|r| r.description.clone())
    }

    /// Repositories a mirror sync was requested for.
    pub fn mirror_syncs(&self) -> Vec<RepoRef> {
        self.state.lock().mirror_syncs.clone()
    }

    pub fn fail_mirror_sync(&self, fail: bool) {
        self.state.lock().fail_mirror_sync = fail;
    }
}

#[async_trait]
impl DestinationApi for FakeDestination {
    async fn list_issues(
        &self,
        _: &RepoRef,
        page: u32,
        limit: u32,
    ) -> Result<Vec<DestinationIssue>> {
        let s = self.state.lock();
        if s.fail_issue_listing {
            return Err(server_error("issue listing"));
        }
        Ok(page_of(&s.issues, page, limit))
    }

    async fn create_issue(&self, _: &RepoRef, draft: &IssueDraft) -> Result<DestinationIssue> {
        let mut s = self.state.lock();
        let issue = DestinationIssue {
            number: s.issues.len() as u64 + 1,
            title: draft.title.clone(),
            body: Some(draft.body.clone()),
            state: if draft.closed == Some(true) {
                EntityState::Closed
            } else {
                draft.state.unwrap_or(EntityState::Open)
            },
        };
        s.issues.push(issue.clone());
        Ok(issue)
    }

    async fn update_issue(
        &self,
        _: &RepoRef,
        number: u64,
        draft: &IssueDraft,
    ) -> Result<DestinationIssue> {
        let mut s = self.state.lock();
        if s.fail_issue_updates {
            return Err(server_error("issue update"));
        }
        s.patches.push((number, draft.clone()));
        let issue = s
            .issues
            .iter_mut()
            .find(|i| i.number == number)
            .ok_or(SyncError::Api {
                status: 404,
                body: "issue not found".into(),
            })?;
        issue.title = draft.title.clone();
        issue.body = Some(draft.body.clone());
        if let Some(state) = draft.state {
            issue.state = state;
        } else if draft.closed == Some(true) {
            issue.state = EntityState::Closed;
        }
        Ok(issue.clone())
    }

    async fn list_comments(
        &self,
        _: &RepoRef,
        number: u64,
        page: u32,
        limit: u32,
    ) -> Result<Vec<DestinationComment>> {
        let s = self.state.lock();
        Ok(s.comments
            .get(&number)
            .map(|c| page_of(c, page, limit))
            .unwrap_or_default())
    }

    async fn create_comment(
        &self,
        _: &RepoRef,
        number: u64,
        body: &str,
    ) -> Result<DestinationComment> {
        let mut s = self.state.lock();
        if s.fail_comment_creation {
            return Err(server_error("comment creation"));
        }
        s.next_comment_id += 1;
        let comment = DestinationComment {
            id: s.next_comment_id,
            body: Some(body.to_string()),
        };
        s.comments.entry(number).or_default().push(comment.clone());
        Ok(comment)
    }

    async fn list_labels(
        &self,
        _: &RepoRef,
        page: u32,
        limit: u32,
    ) -> Result<Vec<DestinationLabel>> {
        Ok(page_of(&self.state.lock().labels, page, limit))
    }

    async fn create_label(&self, _: &RepoRef, draft: &LabelDraft) -> Result<DestinationLabel> {
        let mut s = self.state.lock();
        let label = DestinationLabel {
            id: s.labels.len() as u64 + 1,
            name: draft.name.clone(),
        };
        s.labels.push(label.clone());
        Ok(label)
    }

    async fn update_label(
        &self,
        _: &RepoRef,
        id: u64,
        draft: &LabelDraft,
    ) -> Result<DestinationLabel> {
        Ok(DestinationLabel {
            id,
            name: draft.name.clone(),
        })
    }

    async fn list_milestones(
        &self,
        _: &RepoRef,
        page: u32,
        limit: u32,
    ) -> Result<Vec<DestinationMilestone>> {
        Ok(page_of(&self.state.lock().milestones, page, limit))
    }

    async fn create_milestone(
        &self,
        _: &RepoRef,
        draft: &MilestoneDraft,
    ) -> Result<DestinationMilestone> {
        let mut s = self.state.lock();
        let milestone = DestinationMilestone {
            id: s.milestones.len() as u64 + 1,
            title: draft.title.clone(),
        };
        s.milestones.push(milestone.clone());
        Ok(milestone)
    }

    async fn update_milestone(
        &self,
        _: &RepoRef,
        id: u64,
        draft: &MilestoneDraft,
    ) -> Result<DestinationMilestone> {
        Ok(DestinationMilestone {
            id,
            title: draft.title.clone(),
        })
    }

    async fn get_release_by_tag(
        &self,
        _: &RepoRef,
        tag: &str,
    ) -> Result<Option<DestinationRelease>> {
        let mut s = self.state.lock();
        if s.hidden_lookups > 0 {
            s.hidden_lookups -= 1;
            return Ok(None);
        }
        Ok(s.releases.iter().find(|r| r.tag_name == tag).cloned())
    }

    async fn create_release(
        &self,
        _: &RepoRef,
        draft: &ReleaseDraft,
    ) -> Result<DestinationRelease> {
        let mut s = self.state.lock();
        if s.releases.iter().any(|r| r.tag_name == draft.tag_name) {
            return Err(SyncError::Api {
                status: 409,
                body: "release with this tag already exists".into(),
            });
        }
        Ok(s.add_release(&draft.tag_name, &[]))
    }

    async fn delete_release(&self, _: &RepoRef, id: u64) -> Result<()> {
        let mut s = self.state.lock();
        s.releases.retain(|r| r.id != id);
        s.deleted_releases += 1;
        Ok(())
    }

    async fn upload_release_asset(
        &self,
        _: &RepoRef,
        release_id: u64,
        name: &str,
        data: Bytes,
        _: Duration,
    ) -> Result<()> {
        let mut s = self.state.lock();
        if s.failing_uploads.contains(name) {
            return Err(server_error("asset upload"));
        }
        s.next_asset_id += 1;
        let asset = DestinationAsset {
            id: s.next_asset_id,
            name: name.to_string(),
            size: data.len() as u64,
        };
        let release = s
            .releases
            .iter_mut()
            .find(|r| r.id == release_id)
            .ok_or(SyncError::Api {
                status: 404,
                body: "release not found".into(),
            })?;
        release.assets.push(asset);
        s.upload_log.push(name.to_string());
        Ok(())
    }

    async fn trigger_mirror_sync(&self, repo: &RepoRef) -> Result<()> {
        let mut s = self.state.lock();
        if s.fail_mirror_sync {
            return Err(server_error("mirror sync"));
        }
        s.mirror_syncs.push(repo.clone());
        Ok(())
    }

    async fn get_repository(&self, repo: &RepoRef) -> Result<Option<DestinationRepository>> {
        Ok(self
            .state
            .lock()
            .repositories
            .iter()
            .find(|r| r.repo_ref() == *repo)
            .cloned())
    }

    async fn create_repository(&self, draft: &RepositoryDraft) -> Result<DestinationRepository> {
        let repository = DestinationRepository {
            name: draft.name.clone(),
            owner: DestinationOwner {
                login: "mirror".to_string(),
            },
            mirror: false,
            original_url: None,
            description: Some(draft.description.clone()),
        };
        self.state.lock().repositories.push(repository.clone());
        Ok(repository)
    }

    async fn update_description(&self, repo: &RepoRef, description: &str) -> Result<()> {
        let mut s = self.state.lock();
        if let Some(r) = s.repositories.iter_mut().find(|r| r.repo_ref() == *repo) {
            r.description = Some(description.to_string());
        }
        Ok(())
    }

    async fn list_user_repositories(
        &self,
        page: u32,
        limit: u32,
    ) -> Result<Vec<DestinationRepository>> {
        Ok(page_of(&self.state.lock().repositories, page, limit))
    }
}

/// Config store kept in memory, keyed by pair.
#[derive(Default)]
pub struct MemoryConfigStore {
    default: RepoConfig,
    configs: Mutex<HashMap<(String, String), RepoConfig>>,
}

impl MemoryConfigStore {
    pub fn with_default(default: RepoConfig) -> Self {
        Self {
            default,
            configs: Mutex::default(),
        }
    }

    pub fn saved(&self, source: &RepoRef, destination: &RepoRef) -> Option<RepoConfig> {
        self.configs
            .lock()
            .get(&(source.to_string(), destination.to_string()))
            .cloned()
    }
}

impl RepoConfigStore for MemoryConfigStore {
    fn get_repo_config(&self, source: &RepoRef, destination: &RepoRef) -> Result<RepoConfig> {
        Ok(self
            .saved(source, destination)
            .unwrap_or_else(|| self.default.clone()))
    }

    fn save_repo_config(
        &self,
        source: &RepoRef,
        destination: &RepoRef,
        config: &RepoConfig,
    ) -> Result<()> {
        self.configs.lock().insert(
            (source.to_string(), destination.to_string()),
            config.clone(),
        );
        Ok(())
    }
}
