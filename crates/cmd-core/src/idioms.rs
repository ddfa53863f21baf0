//! Pattern fragments shared by the rule compilers.
//!
//! Every fragment is written in the free-spacing rule dialect and is meant to
//! be concatenated before compilation with [`crate::pattern::compile`].

use std::collections::BTreeSet;

use indexmap::IndexMap;

use crate::pattern::escape;
use crate::placeholder::MARKER;

const BLOCK_TAG_NAMES: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "dd",
    "details",
    "dialog",
    "div",
    "dl",
    "dt",
    "fieldset",
    "figcaption",
    "figure",
    "footer",
    "form",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hgroup",
    "hr",
    "li",
    "main",
    "nav",
    "ol",
    "p",
    "pre",
    "section",
    "table",
    "tbody",
    "td",
    "tfoot",
    "th",
    "thead",
    "ul",
];

/// Opening or closing tag of an HTML block element.
pub(crate) fn block_tag(require_anchoring: bool) -> String {
    let names = BLOCK_TAG_NAMES.join("|");
    let tag = format!(r"[<] [/]? (?: {names} ) [\s{MARKER}>]");
    if require_anchoring {
        format!("{}{tag}", block_anchoring(true, false))
    } else {
        tag
    }
}

pub(crate) fn block_anchoring(syntax_type_is_block: bool, capture_anchoring_whitespace: bool) -> &'static str {
    match (syntax_type_is_block, capture_anchoring_whitespace) {
        (false, _) => "",
        (true, false) => r"^ [^\S\n]*",
        (true, true) => r"^ (?P<anchoring_whitespace> [^\S\n]* )",
    }
}

/// Optional line break onto a line indented deeper than the anchoring line.
pub(crate) const MAYBE_HANGING_WHITESPACE: &str = r"[^\S\n]* (?: \n (?P=anchoring_whitespace) [^\S\n]+ )?";

pub(crate) const EXTENSIBLE_DELIMITER_CLOSING: &str = "(?P=extensible_delimiter)";

pub(crate) const TITLE: &str = r#"(?: "(?P<double_quoted_title> [^"]*? )" | '(?P<single_quoted_title> [^']*? )' )"#;

pub(crate) fn flags(flag_name_from_letter: &IndexMap<char, String>) -> String {
    if flag_name_from_letter.is_empty() {
        return String::new();
    }
    let letters: String = flag_name_from_letter
        .keys()
        .map(|letter| escape(&letter.to_string()))
        .collect();
    format!("(?P<flags> [{letters}]* )")
}

pub(crate) fn extensible_delimiter_opening(character: char, min_length: usize) -> String {
    format!(
        "(?P<extensible_delimiter> {}{{{min_length},}} )",
        escape(&character.to_string())
    )
}

/// Braced attribute specifications, plus a newline for block syntax.
pub(crate) fn attribute_specifications(
    attribute_specifications: Option<&str>,
    require_newline: bool,
    capture: bool,
    allow_omission: bool,
) -> String {
    let mut fragment = String::new();
    if attribute_specifications.is_some() {
        let braced = if capture {
            r"\{ (?P<attribute_specifications> [^}]*? ) \}"
        } else {
            r"\{ [^}]*? \}"
        };
        if allow_omission {
            fragment = format!("(?: {braced} )?");
        } else {
            fragment.push_str(braced);
        }
    }
    if require_newline {
        fragment.push_str(r"\n");
    }
    fragment
}

/// Class of the given characters, or `None` when there are none.
pub(crate) fn character_class(characters: &BTreeSet<char>) -> Option<String> {
    if characters.is_empty() {
        return None;
    }
    let escaped: String = characters
        .iter()
        .map(|character| escape(&character.to_string()))
        .collect();
    Some(format!("[{escaped}]"))
}

/// Lazily repeated content, never running into `prohibited`.
pub(crate) fn content(
    prohibited: Option<&str>,
    permitted: &str,
    permit_empty: bool,
    capture_group_name: &str,
) -> String {
    let atom = match prohibited {
        Some(prohibited) => format!("(?: (?! {prohibited} ) {permitted} )"),
        None => permitted.to_owned(),
    };
    let repetition = if permit_empty { '*' } else { '+' };
    format!("(?P<{capture_group_name}> {atom}{repetition}? )")
}

pub(crate) const ANY_CHARACTER: &str = r"[\s\S]";

pub(crate) fn uri(be_greedy: bool) -> String {
    let greed = if be_greedy { "" } else { "?" };
    format!(r"(?: [<] (?P<angle_bracketed_uri> [^>]*? ) [>] | (?P<bare_uri> [\S]+{greed} ) )")
}
