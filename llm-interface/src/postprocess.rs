//! Cleanup and length enforcement for generated text.

pub const MAX_POST_LENGTH: usize = 280;
pub const ELLIPSIS: &str = "...";

/// Provider output longer than this multiple of the cap is treated as runaway.
const OVERSIZE_FACTOR: f64 = 1.2;

/// A word-boundary cut is only taken if it keeps at least this share of the cap.
const MIN_BOUNDARY_RATIO: f64 = 0.7;

/// Phrases that show the model echoed its instructions back.
const LEAKAGE_PHRASES: &[&str] = &[
    "generate",
    "write",
    "maximum length:",
    "max length:",
    "characters or less",
    "tone:",
    "topic:",
    "context:",
    "instructions:",
    "you are a",
];

const ROLE_PREFIXES: &[&str] = &[
    "reply:",
    "response:",
    "tweet:",
    "post:",
    "thread:",
    "meme:",
    "answer:",
    "assistant:",
];

const QUOTE_CHARS: &[char] = &['"', '\'', '“', '”', '‘', '’', '`'];

pub fn effective_cap(max_length: usize) -> usize {
    max_length.min(MAX_POST_LENGTH)
}

pub fn leaks_instructions(text: &str) -> bool {
    let lower = text.to_lowercase();
    LEAKAGE_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

pub fn is_oversized(text: &str, max_length: usize) -> bool {
    text.chars().count() as f64 > effective_cap(max_length) as f64 * OVERSIZE_FACTOR
}

/// Cleans primary-provider output. `None` means the text must be discarded in
/// favour of a template, either because it echoes the prompt, is far too long,
/// or is empty once cleaned.
pub fn clean_primary_output(raw: &str, max_length: usize) -> Option<String> {
    if leaks_instructions(raw) || is_oversized(raw, max_length) {
        return None;
    }

    let text = strip_role_prefix(raw.trim());
    let text = text.trim().trim_matches(QUOTE_CHARS).trim();
    if text.is_empty() {
        return None;
    }
    Some(enforce_length(text, max_length))
}

fn strip_role_prefix(text: &str) -> &str {
    for prefix in ROLE_PREFIXES {
        let matches = text
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix));
        if matches {
            return &text[prefix.len()..];
        }
    }
    text
}

/// Fits `text` into `min(max_length, 280)` characters, preferring a word
/// boundary, and never returns more than `max_length` characters.
pub fn enforce_length(text: &str, max_length: usize) -> String {
    let cap = effective_cap(max_length);
    let text = text.trim();
    let chars: Vec<char> = text.chars().collect();

    let mut out = if chars.len() > cap {
        let limit = cap.saturating_sub(ELLIPSIS.len());
        let boundary = (0..=limit).rev().find(|&i| chars[i].is_whitespace());
        let cut = match boundary {
            Some(i) if i as f64 >= cap as f64 * MIN_BOUNDARY_RATIO => i,
            _ => limit,
        };
        let mut truncated: String = chars[..cut].iter().collect();
        truncated.truncate(truncated.trim_end().len());
        truncated.push_str(ELLIPSIS);
        truncated
    } else {
        text.to_string()
    };

    if out.chars().count() > max_length {
        out = out.chars().take(max_length).collect();
    }
    out
}
