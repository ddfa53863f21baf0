//! Classification of rules file lines.

use std::sync::LazyLock;

use regex::Regex;

use crate::utilities::is_whitespace_only;

static INCLUSION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\A< (?:/(?P<working_relative>[^\t\n\x0B\x0C\r ][\s\S]*?)|(?P<file_relative>[^\t\n\x0B\x0C\r ][\s\S]*?))[\t\n\x0B\x0C\r ]*\z",
    )
    .unwrap()
});

static CLASS_DECLARATION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\A(?P<class_name>[A-Za-z]+):[\t\n\x0B\x0C\r ]+#(?P<id>[a-z0-9.-]+)\z").unwrap()
});

static ATTRIBUTE_DECLARATION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A- (?P<name>[a-z_]+):(?P<partial_value>[\s\S]*)\z").unwrap());

static SUBSTITUTION_DECLARATION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A\* (?P<partial_substitution>[\s\S]*)\z").unwrap());

static CONTINUATION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A[\t\n\x0B\x0C\r ]+[^\t\n\x0B\x0C\r ][\s\S]*\z").unwrap());

/// Where an included file name is resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum InclusionBase {
    /// Written with a leading slash.
    WorkingDirectory,
    IncludingFile,
}

#[derive(Debug, PartialEq, Eq)]
pub(super) enum Line<'a> {
    WhitespaceOnly,
    Comment,
    Inclusion { name: &'a str, base: InclusionBase },
    ClassDeclaration { class_name: &'a str, id: &'a str },
    AttributeDeclaration { name: &'a str, partial_value: &'a str },
    SubstitutionDeclaration(&'a str),
    Continuation(&'a str),
    Invalid,
}

impl<'a> Line<'a> {
    pub(super) fn classify(line: &'a str) -> Self {
        if is_whitespace_only(line) {
            return Self::WhitespaceOnly;
        }
        if line.starts_with('#') {
            return Self::Comment;
        }
        if let Some(captures) = INCLUSION_REGEX.captures(line) {
            let (name, base) = match captures.name("working_relative") {
                Some(name) => (name, InclusionBase::WorkingDirectory),
                None => match captures.name("file_relative") {
                    Some(name) => (name, InclusionBase::IncludingFile),
                    None => return Self::Invalid,
                },
            };
            return Self::Inclusion {
                name: name.as_str(),
                base,
            };
        }
        if let Some(captures) = CLASS_DECLARATION_REGEX.captures(line) {
            return Self::ClassDeclaration {
                class_name: captures.name("class_name").map_or("", |m| m.as_str()),
                id: captures.name("id").map_or("", |m| m.as_str()),
            };
        }
        if let Some(captures) = ATTRIBUTE_DECLARATION_REGEX.captures(line) {
            return Self::AttributeDeclaration {
                name: captures.name("name").map_or("", |m| m.as_str()),
                partial_value: captures.name("partial_value").map_or("", |m| m.as_str()),
            };
        }
        if let Some(captures) = SUBSTITUTION_DECLARATION_REGEX.captures(line) {
            return Self::SubstitutionDeclaration(captures.name("partial_substitution").map_or("", |m| m.as_str()));
        }
        if CONTINUATION_REGEX.is_match(line) {
            return Self::Continuation(line);
        }
        Self::Invalid
    }
}
