//! Identity markers and the per-run identity map.
//!
//! Nothing links a source item to its destination copy except the markers the
//! engine writes into the destination title and body. Every run rebuilds the
//! map from those markers.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::{Result, SyncError};
use crate::types::DestinationIssue;

/// Marker namespace. Issue and pull request numbers never cross-match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    Issue,
    PullRequest,
}

impl MarkerKind {
    fn sentinel_phrase(self) -> &'static str {
        match self {
            Self::Issue => "*Mirrored from GitHub issue",
            Self::PullRequest => "*Mirrored from GitHub Pull Request",
        }
    }

    fn title_prefix(self) -> &'static str {
        match self {
            Self::Issue => "[GH-",
            Self::PullRequest => "[GH-PR-",
        }
    }

    /// Title marker, e.g. `[GH-12]` or `[GH-PR-12]`.
    pub fn title_marker(self, number: u64) -> String {
        format!("{}{number}]", self.title_prefix())
    }

    /// First body line of a mirrored item.
    pub fn body_sentinel(self, number: u64, url: &str) -> String {
        format!("{} [#{number}]({url})*", self.sentinel_phrase())
    }
}

impl std::fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Issue => write!(f, "issue"),
            Self::PullRequest => write!(f, "pull request"),
        }
    }
}

/// Number following `#` up to the next `]` or `*`.
fn number_after_hash(line: &str) -> Result<u64> {
    let (_, rest) = line
        .split_once('#')
        .ok_or_else(|| SyncError::MarkerParse(line.to_string()))?;
    let end = rest.find(|c| c == ']' || c == '*').unwrap_or(rest.len());
    rest[..end]
        .trim()
        .parse()
        .map_err(|_| SyncError::MarkerParse(line.to_string()))
}

/// Source number from the body sentinel.
///
/// Only the first non-empty line is a sentinel. Text further down is quoted
/// content and never identifies the item. Returns `Ok(None)` when that line
/// carries no sentinel of `kind`, and an error when it is malformed.
pub fn parse_body_marker(kind: MarkerKind, body: &str) -> Result<Option<u64>> {
    let Some(first) = body.lines().map(str::trim).find(|line| !line.is_empty()) else {
        return Ok(None);
    };
    if !first.starts_with(kind.sentinel_phrase()) {
        return Ok(None);
    }
    number_after_hash(first).map(Some)
}

/// Source number from a bracketed title prefix.
pub fn parse_title_marker(kind: MarkerKind, title: &str) -> Result<Option<u64>> {
    let prefix = kind.title_prefix();
    let Some(start) = title.find(prefix) else {
        return Ok(None);
    };
    let rest = &title[start + prefix.len()..];

    // `[GH-PR-n]` also starts with `[GH-`, but belongs to the other namespace.
    if kind == MarkerKind::Issue && rest.starts_with("PR-") {
        return Ok(None);
    }

    let end = rest
        .find(']')
        .ok_or_else(|| SyncError::MarkerParse(title.to_string()))?;
    rest[..end]
        .parse()
        .map(Some)
        .map_err(|_| SyncError::MarkerParse(title.to_string()))
}

/// Source number recorded in a destination issue, body marker first.
///
/// A body marker that disagrees with the title marker is ambiguous and
/// reported as an error.
pub fn marker_number(kind: MarkerKind, issue: &DestinationIssue) -> Result<Option<u64>> {
    let body = match issue.body.as_deref().map(|b| parse_body_marker(kind, b)) {
        Some(Ok(number)) => number,
        Some(Err(e)) => {
            warn!(number = issue.number, error = %e, "Ignoring malformed body marker");
            None
        }
        None => None,
    };

    let title = match parse_title_marker(kind, &issue.title) {
        Ok(number) => number,
        Err(e) => {
            warn!(number = issue.number, error = %e, "Ignoring malformed title marker");
            None
        }
    };

    match (body, title) {
        (Some(b), Some(t)) if b != t => Err(SyncError::MarkerParse(format!(
            "destination #{} has body marker #{b} but title marker #{t}",
            issue.number
        ))),
        (Some(n), _) | (None, Some(n)) => Ok(Some(n)),
        (None, None) => Ok(None),
    }
}

/// Source number to destination number map for one namespace.
#[derive(Debug)]
pub struct IdentityMap {
    kind: MarkerKind,
    by_source: HashMap<u64, u64>,
    claimed: HashMap<u64, u64>,
    titles: Vec<(String, u64)>,
}

impl IdentityMap {
    /// Empty map for `kind`.
    pub fn new(kind: MarkerKind) -> Self {
        Self {
            kind,
            by_source: HashMap::new(),
            claimed: HashMap::new(),
            titles: Vec::new(),
        }
    }

    /// Build the map from the destination's current issues.
    pub fn resolve(kind: MarkerKind, issues: &[DestinationIssue]) -> Self {
        let mut map = Self::new(kind);

        for issue in issues {
            match marker_number(kind, issue) {
                Ok(Some(source)) => {
                    map.register(source, issue.number);
                    map.record_title(&issue.title, issue.number);
                }
                Ok(None) => map.record_title(&issue.title, issue.number),
                Err(e) => warn!(%kind, number = issue.number, error = %e, "Excluding ambiguous issue"),
            }
        }

        debug!(%kind, mapped = map.len(), "Resolved identity map");
        map
    }

    pub fn kind(&self) -> MarkerKind {
        self.kind
    }

    /// Destination number mirrored from `source`.
    pub fn get(&self, source: u64) -> Option<u64> {
        self.by_source.get(&source).copied()
    }

    /// Map `source` to `destination`.
    ///
    /// The first mapping wins on both sides; returns `false` and logs when
    /// either number is already taken by a different partner.
    pub fn register(&mut self, source: u64, destination: u64) -> bool {
        if let Some(&existing) = self.by_source.get(&source) {
            if existing != destination {
                warn!(
                    kind = %self.kind,
                    source,
                    kept = existing,
                    ignored = destination,
                    "Duplicate mirror for source item"
                );
            }
            return existing == destination;
        }
        if let Some(&owner) = self.claimed.get(&destination) {
            warn!(
                kind = %self.kind,
                destination,
                kept = owner,
                ignored = source,
                "Destination item already claimed"
            );
            return false;
        }

        self.by_source.insert(source, destination);
        self.claimed.insert(destination, source);
        true
    }

    /// Remember a destination title for the marker-substring fallback.
    pub fn record_title(&mut self, title: &str, destination: u64) {
        self.titles.push((title.to_string(), destination));
    }

    /// First unclaimed destination whose title contains the exact marker of
    /// `source`.
    pub fn find_by_title_marker(&self, source: u64) -> Option<u64> {
        let marker = self.kind.title_marker(source);
        self.titles
            .iter()
            .filter(|(title, _)| title.contains(&marker))
            .map(|(_, number)| *number)
            .find(|number| match self.claimed.get(number) {
                Some(&owner) => owner == source,
                None => true,
            })
    }

    pub fn len(&self) -> usize {
        self.by_source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_source.is_empty()
    }
}
