//! Deterministic titles and bodies for mirrored issues and pull requests.
//!
//! The same source item always renders to the same text, so an unchanged item
//! produces an identical PATCH on every run.

use std::fmt::Write as _;

use crate::identity::MarkerKind;
use crate::types::{
    format_timestamp, EntityState, LabelRef, MilestoneRef, SourceChangedFile, SourceCommit,
    SourceIssue, SourcePullRequest, User,
};

/// Commits listed in a pull request body.
pub const MAX_COMMITS: usize = 10;
/// Changed files listed in a pull request body.
pub const MAX_FILES: usize = 15;
/// Diffs inlined in a pull request body.
pub const MAX_DIFFS: usize = 5;

pub fn issue_title(issue: &SourceIssue) -> String {
    format!(
        "{} {}",
        MarkerKind::Issue.title_marker(issue.number),
        issue.title
    )
}

pub fn issue_body(issue: &SourceIssue) -> String {
    let mut body = String::new();
    push_header(
        &mut body,
        MarkerKind::Issue.body_sentinel(issue.number, &issue.html_url),
        &issue.user,
        &format_timestamp(&issue.created_at),
    );
    push_references(
        &mut body,
        &issue.labels,
        issue.milestone.as_ref(),
        &issue.assignees,
    );
    push_description(&mut body, issue.body.as_deref());
    body
}

pub fn pull_request_title(pr: &SourcePullRequest) -> String {
    let status = if pr.is_merged() {
        "[MERGED] "
    } else if pr.state == EntityState::Closed {
        "[CLOSED] "
    } else {
        ""
    };
    format!(
        "{} {status}{}",
        MarkerKind::PullRequest.title_marker(pr.number),
        pr.title
    )
}

/// Body of a mirrored pull request. `commits` and `files` are `None` when
/// they could not be fetched; the section is then left out.
pub fn pull_request_body(
    pr: &SourcePullRequest,
    commits: Option<&[SourceCommit]>,
    files: Option<&[SourceChangedFile]>,
) -> String {
    let mut body = String::new();
    push_header(
        &mut body,
        MarkerKind::PullRequest.body_sentinel(pr.number, &pr.html_url),
        &pr.user,
        &format_timestamp(&pr.created_at),
    );
    push_references(&mut body, &pr.labels, pr.milestone.as_ref(), &pr.assignees);

    let _ = write!(body, "**Status: {}**\n\n", pr.state.to_string().to_uppercase());
    if pr.is_merged() {
        let merged_at = pr
            .merged_at
            .as_ref()
            .map(format_timestamp)
            .unwrap_or_else(|| "unknown time".to_string());
        let _ = write!(body, "**Merged: YES (at {merged_at})**\n\n");
        if let Some(sha) = pr.merge_commit_sha.as_deref() {
            let _ = write!(
                body,
                "**Merge commit: [{}]({}/commits/{sha})**\n\n",
                short_sha(sha),
                pr.html_url
            );
        }
    } else if pr.state == EntityState::Closed {
        let closed_at = pr
            .closed_at
            .as_ref()
            .map(format_timestamp)
            .unwrap_or_else(|| "unknown time".to_string());
        let _ = write!(body, "**Merged: NO (closed at {closed_at})**\n\n");
    }

    let _ = write!(body, "**Source branch: {}**\n\n", pr.head.label);
    let _ = write!(body, "**Target branch: {}**\n\n", pr.base.label);

    if let Some(commits) = commits.filter(|c| !c.is_empty()) {
        push_commits(&mut body, pr, commits);
    }

    push_description(&mut body, pr.body.as_deref());

    if let Some(files) = files.filter(|f| !f.is_empty()) {
        push_changes(&mut body, files);
    }

    body
}

fn push_header(body: &mut String, sentinel: String, author: &User, created_at: &str) {
    body.push_str(&sentinel);
    body.push_str("\n\n");
    let _ = write!(body, "**Original author: @{}**\n\n", author.login);
    let _ = write!(body, "**Created at: {created_at}**\n\n");
}

fn push_references(
    body: &mut String,
    labels: &[LabelRef],
    milestone: Option<&MilestoneRef>,
    assignees: &[User],
) {
    if !labels.is_empty() {
        body.push_str("**Labels:** ");
        for label in labels {
            let _ = write!(body, "`{}` ", label.name);
        }
        body.push_str("\n\n");
    }

    if let Some(milestone) = milestone {
        let _ = write!(body, "**Milestone:** {}\n\n", milestone.title);
    }

    if !assignees.is_empty() {
        body.push_str("**Assignees:** ");
        for assignee in assignees {
            let _ = write!(body, "@{} ", assignee.login);
        }
        body.push_str("\n\n");
    }
}

fn push_description(body: &mut String, description: Option<&str>) {
    if let Some(text) = description.filter(|t| !t.is_empty()) {
        let _ = write!(body, "## Description\n\n{text}\n\n");
    }
}

fn push_commits(body: &mut String, pr: &SourcePullRequest, commits: &[SourceCommit]) {
    let _ = write!(body, "## Commits ({})\n\n", commits.len());
    for commit in commits.iter().take(MAX_COMMITS) {
        let summary = commit.commit.message.lines().next().unwrap_or_default();
        let author = commit
            .commit
            .author
            .as_ref()
            .map(|a| a.name.as_str())
            .unwrap_or("Unknown");
        let _ = writeln!(
            body,
            "* [`{}`]({}/commits/{}) {summary} - {author}",
            short_sha(&commit.sha),
            pr.html_url,
            commit.sha
        );
    }
    if commits.len() > MAX_COMMITS {
        let _ = writeln!(
            body,
            "\n*... and {} more commits*",
            commits.len() - MAX_COMMITS
        );
    }
    body.push('\n');
}

fn push_changes(body: &mut String, files: &[SourceChangedFile]) {
    let additions: u64 = files.iter().map(|f| f.additions).sum();
    let deletions: u64 = files.iter().map(|f| f.deletions).sum();

    body.push_str("## Changes\n\n");
    let _ = writeln!(body, "**Files changed:** {}", files.len());
    let _ = writeln!(body, "**Lines added:** +{additions}");
    let _ = write!(body, "**Lines removed:** -{deletions}\n\n");

    body.push_str("**Modified files:**\n");
    for file in files.iter().take(MAX_FILES) {
        let _ = writeln!(
            body,
            "* {}: `{}` (+{}/-{})",
            file.status, file.filename, file.additions, file.deletions
        );
    }
    if files.len() > MAX_FILES {
        let _ = write!(
            body,
            "\n*... and {} more files*\n\n",
            files.len() - MAX_FILES
        );
    } else {
        body.push('\n');
    }

    let mut shown = 0;
    for file in files {
        if shown >= MAX_DIFFS {
            break;
        }
        if let Some(patch) = file.patch.as_deref() {
            let _ = write!(
                body,
                "**Diff for `{}`:**\n```diff\n{patch}\n```\n\n",
                file.filename
            );
            shown += 1;
        }
    }
    if shown < files.len() {
        let _ = write!(
            body,
            "*Diffs for {} more files are not shown*\n\n",
            files.len() - shown
        );
    }
}

fn short_sha(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}
