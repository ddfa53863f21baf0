//! Placeholder protection.
//!
//! A finalised fragment is hidden from later rules by encoding its UTF-8 bytes
//! as private-use run characters U+E000 to U+E0FF, bracketed by the marker
//! U+F8FF. Unprotection decodes every such placeholder back into its text.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::warn;

/// Character bracketing every placeholder.
pub const MARKER: char = '\u{F8FF}';

const RUN_CHARACTER_MIN: u32 = 0xE000;

static PLACEHOLDER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("\u{F8FF}(?P<run_characters>[\u{E000}-\u{E100}]*)\u{F8FF}").unwrap()
});

/// Encode `text` as a single placeholder.
///
/// Existing placeholders inside `text` are decoded first, so protecting twice
/// yields the same placeholder as protecting once.
#[must_use]
pub fn protect(text: &str) -> String {
    let text = unprotect(text);
    let mut placeholder = String::with_capacity(3 * text.len() + 6);
    placeholder.push(MARKER);
    placeholder.extend(text.bytes().map(|byte| {
        char::from_u32(RUN_CHARACTER_MIN + u32::from(byte)).unwrap_or(char::REPLACEMENT_CHARACTER)
    }));
    placeholder.push(MARKER);
    placeholder
}

/// Decode every placeholder in `text`.
#[must_use]
pub fn unprotect(text: &str) -> String {
    PLACEHOLDER_REGEX
        .replace_all(text, |captures: &Captures<'_>| decode_run(&captures["run_characters"]))
        .into_owned()
}

/// Protect stray occurrences of the marker so they cannot pair into a placeholder.
#[must_use]
pub fn replace_marker_occurrences(text: &str) -> String {
    text.replace(MARKER, &protect(&MARKER.to_string()))
}

fn decode_run(run_characters: &str) -> String {
    let bytes: Option<Vec<u8>> = run_characters
        .chars()
        .map(|character| u8::try_from(u32::from(character) - RUN_CHARACTER_MIN).ok())
        .collect();

    match bytes.map(String::from_utf8) {
        Some(Ok(decoded)) => decoded,
        _ => {
            warn!(
                run_characters = %run_characters.escape_unicode(),
                "placeholder encountered with run characters representing invalid byte \
                 sequence; substituted with U+FFFD REPLACEMENT CHARACTER. Possible causes: \
                 stray U+F8FF in the source, or a rule that splits a placeholder"
            );
            char::REPLACEMENT_CHARACTER.to_string()
        }
    }
}
