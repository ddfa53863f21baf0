//! Attribute specification parsing.
//!
//! Attribute specifications are the space-separated tokens written inside
//! braces, for example `{#top .wide lang=en -title hidden}`. They are turned
//! into an HTML attribute sequence such as ` id="top" class="wide" lang="en"
//! hidden`.

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::{Captures, Regex};

use crate::pattern;
use crate::placeholder;

static ATTRIBUTE_SPECIFICATION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    pattern::fixed(
        r#"
            [\s]*
            (?:
                (?P<name> [^\s=]+ ) =
                (?:
                    "(?P<double_quoted_value> [\s\S]*? )"
                        |
                    '(?P<single_quoted_value> [\s\S]*? )'
                        |
                    (?P<bare_value> [\S]* )
                )
                    |
                [#] (?P<id_> [^\s"]+ )
                    |
                [.] (?P<class_> [^\s"]+ )
                    |
                [r] (?P<rowspan> [0-9]+ )
                    |
                [c] (?P<colspan> [0-9]+ )
                    |
                [w] (?P<width> [0-9]+ )
                    |
                [h] (?P<height> [0-9]+ )
                    |
                [-] (?P<delete_name> [\S]+ )
                    |
                (?P<boolean_name> [\S]+ )
            ) ?
            [\s]*
        "#,
    )
});

static AMPERSAND_NOT_STARTING_REFERENCE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    // `regex` has no lookahead, so the reference is captured and kept.
    pattern::fixed(
        r"
            [&]
            (?P<reference>
                (?: [a-zA-Z]{1,31} | [#] (?: [0-9]{1,7} | [xX] [0-9a-fA-F]{1,6} ) ) [;]
            )?
        ",
    )
});

/// One parsed attribute specification.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Specification {
    Value(String, String),
    Boolean(String),
    Delete(String),
}

fn expand_abbreviation(name: &str) -> &str {
    match name {
        "#" => "id",
        "." => "class",
        "l" => "lang",
        "r" => "rowspan",
        "c" => "colspan",
        "w" => "width",
        "h" => "height",
        "s" => "style",
        _ => name,
    }
}

fn extract_specification(captures: &Captures<'_>) -> Option<Specification> {
    let value = |group: &str| captures.name(group).map(|m| m.as_str().to_owned());

    if let Some(name) = captures.name("name") {
        let name = expand_abbreviation(name.as_str()).to_owned();
        let value = value("double_quoted_value")
            .or_else(|| value("single_quoted_value"))
            .or_else(|| value("bare_value"))
            .unwrap_or_default();
        return Some(Specification::Value(name, value));
    }

    for (group, name) in [
        ("id_", "id"),
        ("class_", "class"),
        ("rowspan", "rowspan"),
        ("colspan", "colspan"),
        ("width", "width"),
        ("height", "height"),
    ] {
        if let Some(value) = value(group) {
            return Some(Specification::Value(name.to_owned(), value));
        }
    }

    if let Some(name) = value("delete_name") {
        return Some(Specification::Delete(name));
    }
    value("boolean_name").map(Specification::Boolean)
}

/// Escape an attribute value to be delimited by double quotes.
///
/// Entity and numeric character references are left alone.
#[must_use]
pub fn escape_attribute_value_html(value: &str) -> String {
    let value = AMPERSAND_NOT_STARTING_REFERENCE_REGEX.replace_all(value, |captures: &Captures<'_>| {
        match captures.name("reference") {
            Some(reference) => format!("&{}", reference.as_str()),
            None => "&amp;".to_owned(),
        }
    });
    value
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Convert attribute specifications to an HTML attribute sequence.
///
/// A later specification of the same attribute wins, except that `class`
/// values accumulate. `-name` removes an attribute specified earlier.
#[must_use]
pub fn build_attributes_sequence(attribute_specifications: &str, use_protection: bool) -> String {
    let mut value_from_name: IndexMap<String, Option<String>> = IndexMap::new();

    for captures in ATTRIBUTE_SPECIFICATION_REGEX.captures_iter(attribute_specifications) {
        match extract_specification(&captures) {
            Some(Specification::Value(name, value)) => {
                if name == "class" {
                    if let Some(Some(existing)) = value_from_name.get_mut("class") {
                        existing.push(' ');
                        existing.push_str(&value);
                        continue;
                    }
                }
                value_from_name.insert(name, Some(value));
            }
            Some(Specification::Boolean(name)) => {
                value_from_name.insert(name, None);
            }
            Some(Specification::Delete(name)) => {
                value_from_name.shift_remove(&name);
            }
            None => {}
        }
    }

    let mut sequence = String::new();
    for (name, value) in &value_from_name {
        sequence.push(' ');
        sequence.push_str(name);
        if let Some(value) = value {
            let value = escape_attribute_value_html(&placeholder::unprotect(value));
            sequence.push_str("=\"");
            sequence.push_str(&value);
            sequence.push('"');
        }
    }

    if use_protection {
        placeholder::protect(&sequence)
    } else {
        sequence
    }
}
