use std::sync::LazyLock;

use regex::Regex;

/// Clean HTML content using the ammonia library.
///
/// Whitelist-based: safe tags (like <b>, <p>) are kept, dangerous tags
/// (like <script>, <iframe>) and event-handler attributes are stripped.
/// A <script> element is removed together with its content.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

static NON_SLUG_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("static slug regex"));

/// Lowercase, ASCII-only, hyphen separated. Returns an empty string when the
/// input has no usable characters.
pub fn slugify(input: &str) -> String {
    let lowered = input.to_lowercase();
    NON_SLUG_CHARS
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

/// Strips tags and truncates to `max_chars` characters, for list excerpts.
pub fn excerpt(html: &str, max_chars: usize) -> String {
    let text = ammonia::Builder::empty().clean(html).to_string();
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    let mut cut: String = collapsed.chars().take(max_chars).collect();
    cut.push('…');
    cut
}
