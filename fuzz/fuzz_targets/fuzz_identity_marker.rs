//! Fuzz target for identity marker parsing.
//!
//! Arbitrary titles and bodies must never panic, and a number parsed from a
//! body sentinel must round-trip through the sentinel builder.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use mirrorsync_engine::identity::{marker_number, parse_body_marker, parse_title_marker};
use mirrorsync_engine::types::{DestinationIssue, EntityState};
use mirrorsync_engine::MarkerKind;

#[derive(Debug, Arbitrary)]
struct Input {
    pull_request: bool,
    title: String,
    body: Option<String>,
}

fuzz_target!(|input: Input| {
    let kind = if input.pull_request {
        MarkerKind::PullRequest
    } else {
        MarkerKind::Issue
    };

    let _ = parse_title_marker(kind, &input.title);
    if let Some(body) = &input.body {
        if let Ok(Some(number)) = parse_body_marker(kind, body) {
            let sentinel = kind.body_sentinel(number, "https://github.com/o/r/issues/1");
            assert_eq!(parse_body_marker(kind, &sentinel).ok().flatten(), Some(number));
        }
    }

    let issue = DestinationIssue {
        number: 1,
        title: input.title,
        body: input.body,
        state: EntityState::Open,
    };
    let _ = marker_number(kind, &issue);
});
