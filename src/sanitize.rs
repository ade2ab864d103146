//! Removes markdown decoration the model emits despite being told not to.

use regex::Regex;
use std::sync::LazyLock;

static EMPHASIS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*+").expect("valid regex"));

// A `#` run at the start of a line or after whitespace, plus trailing spaces
static HEADER_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)(^|\s)#+[ \t]*").expect("valid regex"));

static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)+").expect("valid regex"));

/// Strip emphasis stars, header markers and link targets, then trim.
///
/// Passes repeat until nothing changes, so `sanitize(sanitize(s)) == sanitize(s)`.
pub fn sanitize(text: &str) -> String {
    let mut current = sanitize_once(text);
    loop {
        let next = sanitize_once(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn sanitize_once(text: &str) -> String {
    let text = EMPHASIS.replace_all(text, "");
    let text = HEADER_MARKER.replace_all(&text, "${1}");
    let text = LINK.replace_all(&text, "${1}");
    text.trim().to_string()
}
