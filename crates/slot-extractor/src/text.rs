//! Small string helpers shared by the extraction stages.
//!
//! Matching is ASCII case-insensitive so byte offsets found in the lowered
//! copy stay valid in the original string.

pub(crate) fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x3400..=0x4DBF
        | 0x4E00..=0x9FFF
        | 0xF900..=0xFAFF
        | 0x3040..=0x30FF
        | 0xAC00..=0xD7AF)
}

pub(crate) fn has_cjk(text: &str) -> bool {
    text.chars().any(is_cjk)
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Byte offsets of every occurrence of `needle` in `haystack`.
///
/// ASCII needles must sit on word boundaries so `check` never matches inside
/// `checkbox`.
pub(crate) fn find_all(haystack: &str, needle: &str) -> Vec<usize> {
    if needle.is_empty() {
        return Vec::new();
    }
    let lowered = haystack.to_ascii_lowercase();
    let needle = needle.to_ascii_lowercase();
    let bounded = needle.is_ascii();
    lowered
        .match_indices(needle.as_str())
        .map(|(idx, _)| idx)
        .filter(|&idx| {
            if !bounded {
                return true;
            }
            let before = lowered[..idx].chars().next_back();
            let after = lowered[idx + needle.len()..].chars().next();
            !before.map(is_word_char).unwrap_or(false) && !after.map(is_word_char).unwrap_or(false)
        })
        .collect()
}

pub(crate) fn contains(haystack: &str, needle: &str) -> bool {
    !find_all(haystack, needle).is_empty()
}

/// Remove every bounded occurrence of `needle`.
pub(crate) fn remove_all(text: &str, needle: &str) -> String {
    let hits = find_all(text, needle);
    if hits.is_empty() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for idx in hits {
        out.push_str(&text[cursor..idx]);
        out.push(' ');
        cursor = idx + needle.len();
    }
    out.push_str(&text[cursor..]);
    out
}

/// Collapse whitespace runs and drop spaces between CJK characters.
pub(crate) fn normalize_spaces(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            let prev_cjk = out.chars().next_back().map(is_cjk).unwrap_or(false);
            if !(prev_cjk && is_cjk(c)) {
                out.push(' ');
            }
            pending_space = false;
        }
        out.push(c);
    }
    out
}

/// Trim punctuation and whitespace from both ends.
pub(crate) fn trim_edges(text: &str) -> &str {
    text.trim_matches(|c: char| {
        c.is_whitespace()
            || matches!(
                c,
                ',' | '.' | '!' | '?' | ':' | ';' | '，' | '。' | '！' | '？' | '：' | '；' | '、'
            )
    })
}

pub(crate) fn char_len(text: &str) -> usize {
    text.chars().count()
}
