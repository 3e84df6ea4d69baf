//! Fuzz target for mirrored comment parsing.
//!
//! Tests that comment bodies of any shape parse without panicking, and that a
//! rendered comment always yields the fingerprint of its content.

#![no_main]

use libfuzzer_sys::fuzz_target;
use mirrorsync_engine::sync::comments::{
    comment_body, parse_mirrored_comment, process_content, Fingerprint,
};
use mirrorsync_engine::types::{SourceComment, User};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let _ = parse_mirrored_comment(text);

    let comment = SourceComment {
        user: User {
            login: "fuzzer".to_string(),
        },
        body: Some(text.to_string()),
        created_at: chrono::DateTime::<chrono::Utc>::UNIX_EPOCH,
    };
    let content = process_content(text);
    let body = comment_body(&comment, &content);
    if let Some((_, fingerprint)) = parse_mirrored_comment(&body) {
        assert_eq!(fingerprint, Fingerprint::new("fuzzer", &content));
    }
});
