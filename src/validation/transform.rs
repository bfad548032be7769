//! String sanitisation and transformations.
//!
//! Both run only on values that already passed every constraint, so they
//! never need to report errors.

use std::sync::LazyLock;

use aho_corasick::{AhoCorasick, MatchKind};
use regex::Regex;

use crate::schema::Transform;

static SCRIPT_OR_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>")
        .expect("script/style regex is valid")
});

static EVENT_HANDLER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\son[a-z]+\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#)
        .expect("event handler regex is valid")
});

// Only tag-shaped text: `<` followed by a name, `/` or `!`. A bare `2 < 3` stays.
static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->|</?[A-Za-z!][^>]*>").expect("tag regex is valid"));

/// URI schemes that execute code when rendered.
const DANGEROUS_SCHEMES: [&str; 3] = ["javascript:", "vbscript:", "data:text/html"];

static SCHEME_MATCHER: LazyLock<AhoCorasick> = LazyLock::new(|| {
    AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .match_kind(MatchKind::LeftmostLongest)
        .build(DANGEROUS_SCHEMES)
        .expect("scheme patterns are valid")
});

/// Passes before giving up on reaching a fixed point.
const MAX_SANITIZE_PASSES: usize = 8;

/// Strip markup, script bodies, event handlers, executable URI schemes,
/// and control characters.
///
/// Removal can splice fragments back into something dangerous
/// (`<<b>script>`), so passes repeat until the text stops changing. Input
/// still changing after the last pass gets its angle brackets escaped.
pub fn sanitize(input: &str) -> String {
    let mut current = input.to_string();
    for _ in 0..MAX_SANITIZE_PASSES {
        let next = sanitize_pass(&current);
        if next == current {
            return next;
        }
        current = next;
    }
    let mut escaped = current.replace('<', "&lt;").replace('>', "&gt;");
    // Each removal shortens the text, so this terminates.
    while SCHEME_MATCHER.is_match(&escaped) {
        escaped = SCHEME_MATCHER.replace_all(&escaped, &["", "", ""]);
    }
    escaped
}

fn sanitize_pass(input: &str) -> String {
    let without_blocks = SCRIPT_OR_STYLE.replace_all(input, "");
    let without_handlers = EVENT_HANDLER.replace_all(&without_blocks, "");
    let without_tags = TAG.replace_all(&without_handlers, "");
    let without_schemes = SCHEME_MATCHER.replace_all(&without_tags, &["", "", ""]);
    strip_control(&without_schemes)
}

/// Apply a single transformation.
pub fn apply(transform: Transform, input: &str) -> String {
    match transform {
        Transform::Trim => input.trim().to_string(),
        Transform::Lowercase => input.to_lowercase(),
        Transform::Uppercase => input.to_uppercase(),
        Transform::CollapseWhitespace => input.split_whitespace().collect::<Vec<_>>().join(" "),
        Transform::Capitalize => {
            let mut chars = input.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
        Transform::StripControl => strip_control(input),
    }
}

/// Apply transformations in order.
pub fn apply_all(transforms: &[Transform], input: &str) -> String {
    transforms
        .iter()
        .fold(input.to_string(), |acc, t| apply(*t, &acc))
}

// Newlines and tabs are content, not control noise.
fn strip_control(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t' | '\r'))
        .collect()
}
