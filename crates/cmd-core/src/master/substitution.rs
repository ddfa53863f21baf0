//! Parsing of `pattern --> substitute` declarations.

use std::sync::LazyLock;

use regex::Regex;

use crate::CMD_VERSION;
use crate::document::{extract_basename, make_clean_url};
use crate::error::LegislateErrorKind;
use crate::utilities::{escape_regex_substitute, trim};

static DELIMITER_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-{2,}>").unwrap());

/// Who consumes the parsed substitute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum SubstituteKind {
    Literal,
    /// Keyword expansions are escaped so they survive template parsing.
    RegexTemplate,
}

#[derive(Debug, PartialEq, Eq)]
pub(super) struct Substitution {
    pub(super) pattern: String,
    pub(super) substitute: String,
}

/// Contents of `value` if it is quoted with `quote` on both ends.
fn unquote(value: &str, quote: char) -> Option<&str> {
    (value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote)).then(|| &value[1..value.len() - 1])
}

/// Split a substitution at its longest `-->` delimiter.
///
/// The pattern ends at the first delimiter occurrence that leaves a quoted
/// pattern (double quotes first, then single quotes) before it, or else at the
/// first occurrence. The substitute is either a keyword, a quoted value or a
/// bare value.
pub(super) fn parse(
    substitution: &str,
    cmd_name: &str,
    kind: SubstituteKind,
) -> Result<Substitution, LegislateErrorKind> {
    let delimiter = DELIMITER_REGEX
        .find_iter(substitution)
        .map(|m| m.as_str())
        .reduce(|longest, candidate| if candidate.len() > longest.len() { candidate } else { longest })
        .ok_or_else(|| LegislateErrorKind::MissingDelimiter(substitution.to_owned()))?;

    let positions: Vec<usize> = substitution.match_indices(delimiter).map(|(index, _)| index).collect();
    let prefix = |index: usize| trim(&substitution[..index]);

    let quoted = ['"', '\''].into_iter().find_map(|quote| {
        positions
            .iter()
            .find_map(|&index| unquote(prefix(index), quote).map(|pattern| (index, pattern)))
    });
    let (index, pattern) = match quoted {
        Some(found) => found,
        None => {
            let index = positions[0];
            (index, prefix(index))
        }
    };

    let rest = trim(&substitution[index + delimiter.len()..]);
    let keyword = match rest {
        "CMD_VERSION" => Some(CMD_VERSION.to_owned()),
        "CMD_NAME" => Some(cmd_name.to_owned()),
        "CMD_BASENAME" => Some(extract_basename(cmd_name).to_owned()),
        "CLEAN_URL" => Some(make_clean_url(cmd_name)),
        _ => None,
    };
    let substitute = match keyword {
        Some(expansion) if kind == SubstituteKind::RegexTemplate => escape_regex_substitute(&expansion),
        Some(expansion) => expansion,
        None => unquote(rest, '"')
            .or_else(|| unquote(rest, '\''))
            .unwrap_or(rest)
            .to_owned(),
    };

    Ok(Substitution {
        pattern: pattern.to_owned(),
        substitute,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn literal(substitution: &str) -> (String, String) {
        let parsed = parse(substitution, "path/to/page", SubstituteKind::Literal).unwrap();
        (parsed.pattern, parsed.substitute)
    }

    #[test]
    fn test_bare_and_quoted_parts() {
        assert_eq!(literal(" a  -->  b "), ("a".to_owned(), "b".to_owned()));
        assert_eq!(literal(r#""  a " --> ' b '"#), ("  a ".to_owned(), " b ".to_owned()));
        assert_eq!(literal("a -->"), ("a".to_owned(), String::new()));
    }

    #[test]
    fn test_quoted_pattern_may_contain_delimiter() {
        assert_eq!(
            literal(r#""x --> y" --> z"#),
            ("x --> y".to_owned(), "z".to_owned())
        );
        assert_eq!(literal("x --> y --> z"), ("x".to_owned(), "y --> z".to_owned()));
    }

    #[test]
    fn test_longest_delimiter_wins() {
        assert_eq!(literal("<!-- --> ---> end"), ("<!-- -->".to_owned(), "end".to_owned()));
    }

    #[test]
    fn test_keywords() {
        assert_eq!(literal("%name --> CMD_NAME").1, "path/to/page");
        assert_eq!(literal("%base --> CMD_BASENAME").1, "page");
        assert_eq!(literal("%url --> CLEAN_URL").1, "path/to/page");
        assert_eq!(literal("%version --> CMD_VERSION").1, CMD_VERSION);
        assert_eq!(literal("%quoted --> 'CMD_NAME'").1, "CMD_NAME");
    }

    #[test]
    fn test_regex_keywords_are_escaped() {
        let parsed = parse(r"x --> CMD_NAME", r"a\b", SubstituteKind::RegexTemplate).unwrap();
        assert_eq!(parsed.substitute, r"a\\b");
    }

    #[test]
    fn test_missing_delimiter() {
        let err = parse("a -> b", "", SubstituteKind::Literal).unwrap_err();
        assert!(
            matches!(err, LegislateErrorKind::MissingDelimiter(ref s) if s == "a -> b"),
            "Expected MissingDelimiter, got {err:?}"
        );
    }
}
