//! Comment, review and review-comment mirroring.
//!
//! Comments carry no identity marker. A mirrored comment is recognised by a
//! fingerprint of its author and the first 50 characters of its processed
//! content. Two different comments by the same author that share those 50
//! characters are indistinguishable, and the second one is skipped. That is
//! a known false positive of fingerprint deduplication.

use std::collections::HashSet;
use std::fmt::Write as _;

use tracing::{debug, info, warn};

use super::SyncContext;
use crate::error::Result;
use crate::pagination::{fetch_all, DESTINATION_PAGE_SIZE, SOURCE_PAGE_SIZE};
use crate::types::{
    format_timestamp, CommentCounts, DestinationComment, SourceComment, SourceReview,
    SourceReviewComment,
};

/// Characters of processed content that take part in a fingerprint.
pub const FINGERPRINT_PREFIX_CHARS: usize = 50;

const SENTINEL_START: &str = "*Mirrored from GitHub ";
const SEPARATOR: &str = "---";

/// `(author, content prefix)` identity of a comment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub author: String,
    pub prefix: String,
}

impl Fingerprint {
    /// Fingerprint of already processed content.
    pub fn new(author: &str, content: &str) -> Self {
        Self {
            author: author.to_string(),
            prefix: content.chars().take(FINGERPRINT_PREFIX_CHARS).collect(),
        }
    }
}

/// Kind of mirrored comment, as named in its sentinel line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentKind {
    Comment,
    Review,
    ReviewComment,
}

impl CommentKind {
    fn label(self) -> &'static str {
        match self {
            Self::Comment => "comment",
            Self::Review => "review",
            Self::ReviewComment => "review comment",
        }
    }

    pub fn sentinel(self, author: &str) -> String {
        format!("{SENTINEL_START}{} by @{author}*", self.label())
    }
}

/// Normalise line endings to `\n` and make sure block quotes render.
pub fn process_content(raw: &str) -> String {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");
    normalized
        .split('\n')
        .map(|line| match line.strip_prefix('>') {
            Some(rest) if !rest.is_empty() && !rest.starts_with(' ') => format!("> {rest}"),
            _ => line.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_sentinel(line: &str) -> Option<(CommentKind, &str)> {
    let rest = line.trim().strip_prefix(SENTINEL_START)?;
    let (kind, rest) = if let Some(r) = rest.strip_prefix("review comment by @") {
        (CommentKind::ReviewComment, r)
    } else if let Some(r) = rest.strip_prefix("review by @") {
        (CommentKind::Review, r)
    } else if let Some(r) = rest.strip_prefix("comment by @") {
        (CommentKind::Comment, r)
    } else {
        return None;
    };
    let author = rest.strip_suffix('*')?;
    (!author.is_empty()).then_some((kind, author))
}

/// Kind and fingerprint of a comment previously written by this engine.
///
/// The first line must be a mirror sentinel. The content starts after the
/// first `---` line that is not inside a fenced code block.
pub fn parse_mirrored_comment(body: &str) -> Option<(CommentKind, Fingerprint)> {
    let mut lines = body.split('\n');
    let (kind, author) = parse_sentinel(lines.next()?)?;

    let mut in_fence = false;
    for line in lines.by_ref() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") {
            in_fence = !in_fence;
        } else if !in_fence && trimmed == SEPARATOR {
            let rest = lines.collect::<Vec<_>>().join("\n");
            let content = rest.strip_prefix('\n').unwrap_or(&rest);
            return Some((kind, Fingerprint::new(author, content)));
        }
    }
    None
}

fn finish_body(mut header: String, content: &str) -> String {
    header.push_str(SEPARATOR);
    header.push_str("\n\n");
    header.push_str(content);
    header
}

pub fn comment_body(comment: &SourceComment, content: &str) -> String {
    let mut body = CommentKind::Comment.sentinel(&comment.user.login);
    let _ = write!(
        body,
        "\n\n**Created at: {}**\n\n",
        format_timestamp(&comment.created_at)
    );
    finish_body(body, content)
}

pub fn review_body(review: &SourceReview, content: &str) -> String {
    let submitted = review
        .submitted_at
        .as_ref()
        .map(format_timestamp)
        .unwrap_or_else(|| "unknown time".to_string());
    let mut body = CommentKind::Review.sentinel(&review.user.login);
    let _ = write!(
        body,
        "\n\n**Review state: {}**\n\n**Created at: {submitted}**\n\n",
        review.state.to_uppercase()
    );
    finish_body(body, content)
}

pub fn review_comment_body(comment: &SourceReviewComment, content: &str) -> String {
    let mut body = CommentKind::ReviewComment.sentinel(&comment.user.login);
    let _ = write!(
        body,
        "\n\n**Created at: {}**\n\n**File: `{}`**\n\n",
        format_timestamp(&comment.created_at),
        comment.path
    );
    if let Some(position) = comment.position {
        let _ = write!(body, "**Position: {position}**\n\n");
    }
    if let Some(hunk) = comment.diff_hunk.as_deref().filter(|h| !h.is_empty()) {
        let _ = write!(body, "**Code context:**\n```diff\n{hunk}\n```\n\n");
    }
    finish_body(body, content)
}

/// Fingerprints of every mirrored comment in `comments`.
pub fn fingerprints_of(comments: &[DestinationComment]) -> HashSet<Fingerprint> {
    comments
        .iter()
        .filter_map(|c| c.body.as_deref())
        .filter_map(parse_mirrored_comment)
        .map(|(_, fingerprint)| fingerprint)
        .collect()
}

/// Mirrors comment threads onto one destination issue at a time.
pub struct CommentSynchronizer<'a> {
    ctx: SyncContext<'a>,
}

impl<'a> CommentSynchronizer<'a> {
    pub fn new(ctx: SyncContext<'a>) -> Self {
        Self { ctx }
    }

    /// Seen set for `parent`, rebuilt from its current comments.
    pub async fn existing_fingerprints(&self, parent: u64) -> Result<HashSet<Fingerprint>> {
        let destination = self.ctx.destination;
        let repo = self.ctx.dest_repo;
        let comments = fetch_all(DESTINATION_PAGE_SIZE, move |page| {
            destination.list_comments(repo, parent, page, DESTINATION_PAGE_SIZE)
        })
        .await?;
        let seen = fingerprints_of(&comments);
        debug!(parent, existing = comments.len(), mirrored = seen.len(), "Loaded comment fingerprints");
        Ok(seen)
    }

    /// Conversation comments of source item `source_number`.
    pub async fn sync_comments(
        &self,
        source_number: u64,
        parent: u64,
        seen: &mut HashSet<Fingerprint>,
    ) -> Result<CommentCounts> {
        let source = self.ctx.source;
        let repo = self.ctx.source_repo;
        let comments = fetch_all(SOURCE_PAGE_SIZE, move |page| {
            source.list_issue_comments(repo, source_number, page, SOURCE_PAGE_SIZE)
        })
        .await?;

        let mut counts = CommentCounts::default();
        for comment in &comments {
            let content = process_content(comment.body.as_deref().unwrap_or_default());
            let fingerprint = Fingerprint::new(&comment.user.login, &content);
            let body = comment_body(comment, &content);
            self.post_if_new(parent, fingerprint, &body, seen, &mut counts)
                .await;
        }
        Ok(counts)
    }

    /// Top-level reviews of a pull request. Reviews without a body are ignored.
    pub async fn sync_reviews(
        &self,
        source_number: u64,
        parent: u64,
        seen: &mut HashSet<Fingerprint>,
    ) -> Result<CommentCounts> {
        let source = self.ctx.source;
        let repo = self.ctx.source_repo;
        let reviews = fetch_all(SOURCE_PAGE_SIZE, move |page| {
            source.list_reviews(repo, source_number, page, SOURCE_PAGE_SIZE)
        })
        .await?;

        let mut counts = CommentCounts::default();
        for review in &reviews {
            let Some(text) = review.body.as_deref().filter(|b| !b.is_empty()) else {
                continue;
            };
            let content = process_content(text);
            let fingerprint = Fingerprint::new(&review.user.login, &content);
            let body = review_body(review, &content);
            self.post_if_new(parent, fingerprint, &body, seen, &mut counts)
                .await;
        }
        Ok(counts)
    }

    /// Inline diff comments of a pull request.
    pub async fn sync_review_comments(
        &self,
        source_number: u64,
        parent: u64,
        seen: &mut HashSet<Fingerprint>,
    ) -> Result<CommentCounts> {
        let source = self.ctx.source;
        let repo = self.ctx.source_repo;
        let comments = fetch_all(SOURCE_PAGE_SIZE, move |page| {
            source.list_review_comments(repo, source_number, page, SOURCE_PAGE_SIZE)
        })
        .await?;

        let mut counts = CommentCounts::default();
        for comment in &comments {
            let content = process_content(comment.body.as_deref().unwrap_or_default());
            let fingerprint = Fingerprint::new(&comment.user.login, &content);
            let body = review_comment_body(comment, &content);
            self.post_if_new(parent, fingerprint, &body, seen, &mut counts)
                .await;
        }
        Ok(counts)
    }

    /// Mirror the conversation of an issue.
    pub async fn sync_issue_thread(&self, source_number: u64, parent: u64) -> Result<CommentCounts> {
        let mut seen = self.existing_fingerprints(parent).await?;
        let counts = self.sync_comments(source_number, parent, &mut seen).await?;
        info!(source_number, parent, %counts, "Mirrored issue comments");
        Ok(counts)
    }

    /// Mirror comments, then reviews, then inline review comments of a pull
    /// request, all against one seen set.
    pub async fn sync_pull_request_thread(
        &self,
        source_number: u64,
        parent: u64,
    ) -> Result<CommentCounts> {
        let mut seen = self.existing_fingerprints(parent).await?;
        let mut counts = self.sync_comments(source_number, parent, &mut seen).await?;
        counts += self.sync_reviews(source_number, parent, &mut seen).await?;
        counts += self
            .sync_review_comments(source_number, parent, &mut seen)
            .await?;
        info!(source_number, parent, %counts, "Mirrored pull request comments");
        Ok(counts)
    }

    async fn post_if_new(
        &self,
        parent: u64,
        fingerprint: Fingerprint,
        body: &str,
        seen: &mut HashSet<Fingerprint>,
        counts: &mut CommentCounts,
    ) {
        if seen.contains(&fingerprint) {
            debug!(parent, author = %fingerprint.author, "Comment already mirrored");
            counts.skipped += 1;
            return;
        }

        match self
            .ctx
            .destination
            .create_comment(self.ctx.dest_repo, parent, body)
            .await
        {
            Ok(_) => {
                counts.created += 1;
                seen.insert(fingerprint);
            }
            Err(e) => {
                warn!(parent, author = %fingerprint.author, error = %e, "Failed to create comment");
                counts.failed += 1;
            }
        }
    }
}
