//! Typed records exchanged with the source and destination services.
//!
//! Source records deserialize straight from GitHub REST responses, destination
//! records from Gitea `/api/v1` responses. Only the fields the engine reads are
//! declared; optional fields are explicit `Option`s.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, SyncError};

/// `owner/name` reference to a repository on either service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepoRef {
    /// Owning user or organization.
    pub owner: String,
    /// Repository name.
    pub name: String,
}

impl RepoRef {
    /// Create a reference from its parts.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Parse `owner/repo` or a clone/browse URL such as
    /// `https://github.com/owner/repo.git`.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim().trim_end_matches('/');
        let is_url = trimmed.starts_with("http://") || trimmed.starts_with("https://");

        let path = if is_url {
            let url = Url::parse(trimmed)
                .map_err(|e| SyncError::InvalidRepository(format!("{input}: {e}")))?;
            url.path().trim_matches('/').to_string()
        } else {
            trimmed.to_string()
        };
        let path = path.strip_suffix(".git").unwrap_or(&path);

        let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
        let (owner, name) = match parts.as_slice() {
            [owner, name] => (*owner, *name),
            [.., owner, name] if is_url => (*owner, *name),
            _ => {
                return Err(SyncError::InvalidRepository(format!(
                    "{input}. Expected 'owner/repo'"
                )))
            }
        };

        Ok(Self::new(owner, name))
    }

    /// HTTPS clone URL of this repository on GitHub.
    pub fn github_clone_url(&self) -> String {
        format!("https://github.com/{}/{}.git", self.owner, self.name)
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Open/closed state shared by issues, pull requests and milestones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityState {
    Open,
    Closed,
}

impl EntityState {
    pub fn is_closed(self) -> bool {
        self == Self::Closed
    }
}

impl std::fmt::Display for EntityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Timestamps are rendered the way GitHub reports them.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

// ---------------------------------------------------------------------------
// Source (GitHub)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub login: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelRef {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilestoneRef {
    pub title: String,
}

/// An issue as listed by the source. The listing also returns pull requests,
/// recognisable by the `pull_request` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceIssue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub state: EntityState,
    pub user: User,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub labels: Vec<LabelRef>,
    #[serde(default)]
    pub milestone: Option<MilestoneRef>,
    #[serde(default)]
    pub assignees: Vec<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<serde_json::Value>,
}

impl SourceIssue {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchRef {
    pub label: String,
    #[serde(rename = "ref")]
    pub ref_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcePullRequest {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub state: EntityState,
    pub user: User,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub html_url: String,
    /// Only present on single-PR responses; listings carry `merged_at` instead.
    #[serde(default)]
    pub merged: bool,
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub merge_commit_sha: Option<String>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    pub head: BranchRef,
    pub base: BranchRef,
    #[serde(default)]
    pub labels: Vec<LabelRef>,
    #[serde(default)]
    pub milestone: Option<MilestoneRef>,
    #[serde(default)]
    pub assignees: Vec<User>,
}

impl SourcePullRequest {
    pub fn is_merged(&self) -> bool {
        self.merged || self.merged_at.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitAuthor {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitDetail {
    pub message: String,
    #[serde(default)]
    pub author: Option<CommitAuthor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceCommit {
    pub sha: String,
    pub commit: CommitDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceChangedFile {
    pub filename: String,
    pub status: String,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default)]
    pub patch: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceComment {
    pub user: User,
    #[serde(default)]
    pub body: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceReview {
    pub user: User,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default = "default_review_state")]
    pub state: String,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

fn default_review_state() -> String {
    "COMMENTED".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceReviewComment {
    pub user: User,
    #[serde(default)]
    pub body: Option<String>,
    pub created_at: DateTime<Utc>,
    pub path: String,
    #[serde(default)]
    pub diff_hunk: Option<String>,
    #[serde(default)]
    pub position: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceLabel {
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMilestone {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub state: EntityState,
    #[serde(default)]
    pub due_on: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceAsset {
    pub name: String,
    pub size: u64,
    pub browser_download_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRelease {
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub assets: Vec<SourceAsset>,
}

impl SourceRelease {
    /// Release title, falling back to the tag.
    pub fn title(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.tag_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRepository {
    #[serde(default)]
    pub has_wiki: bool,
    #[serde(default)]
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// Destination (Gitea)
// ---------------------------------------------------------------------------

/// Issue on the destination; mirrored pull requests are issues too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationIssue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub state: EntityState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationComment {
    pub id: u64,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationLabel {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationMilestone {
    pub id: u64,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationAsset {
    pub id: u64,
    pub name: String,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationRelease {
    pub id: u64,
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<DestinationAsset>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationOwner {
    pub login: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationRepository {
    pub name: String,
    pub owner: DestinationOwner,
    #[serde(default)]
    pub mirror: bool,
    #[serde(default)]
    pub original_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl DestinationRepository {
    pub fn repo_ref(&self) -> RepoRef {
        RepoRef::new(&self.owner.login, &self.name)
    }

    /// Source repository this destination pull-mirrors, if it mirrors GitHub.
    pub fn github_source(&self) -> Option<RepoRef> {
        if !self.mirror {
            return None;
        }
        let url = self.original_url.as_deref()?;
        if !url.starts_with("https://github.com/") {
            return None;
        }
        RepoRef::parse(url).ok()
    }
}

// ---------------------------------------------------------------------------
// Write payloads
// ---------------------------------------------------------------------------

/// Body of an issue create (POST) or update (PATCH).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueDraft {
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<EntityState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelDraft {
    pub name: String,
    pub color: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MilestoneDraft {
    pub title: String,
    pub description: String,
    pub state: EntityState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_on: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseDraft {
    pub tag_name: String,
    pub name: String,
    pub body: String,
    pub draft: bool,
    pub prerelease: bool,
}

impl From<&SourceRelease> for ReleaseDraft {
    fn from(release: &SourceRelease) -> Self {
        Self {
            tag_name: release.tag_name.clone(),
            name: release.title().to_string(),
            body: release.body.clone().unwrap_or_default(),
            draft: release.draft,
            prerelease: release.prerelease,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryDraft {
    pub name: String,
    pub description: String,
    pub private: bool,
    pub auto_init: bool,
}

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

/// Outcome counters of one synchronizer pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCounts {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
}

impl SyncCounts {
    pub fn total(&self) -> usize {
        self.created + self.updated + self.skipped
    }
}

impl std::fmt::Display for SyncCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} skipped",
            self.created, self.updated, self.skipped
        )
    }
}

/// Outcome counters of comment mirroring. `skipped` counts comments already
/// present, `failed` counts comments whose creation was rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentCounts {
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl std::ops::AddAssign for CommentCounts {
    fn add_assign(&mut self, other: Self) {
        self.created += other.created;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

impl std::fmt::Display for CommentCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} created, {} skipped, {} failed",
            self.created, self.skipped, self.failed
        )
    }
}
