//! Error types for rule compilation and document conversion.

use std::fmt;

use crate::master::SYNTAX_HELP;
use crate::pattern::PatternError;

/// Line span of a declaration inside a rules file.
///
/// `end` is exclusive; a missing end denotes a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: usize,
    pub end: Option<usize>,
}

impl LineRange {
    #[must_use]
    pub fn line(number: usize) -> Self {
        Self {
            start: number,
            end: None,
        }
    }

    #[must_use]
    pub fn span(start: usize, end: usize) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }
}

impl fmt::Display for LineRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) if end > self.start + 1 => write!(f, "lines {} to {}", self.start, end - 1),
            _ => write!(f, "line {}", self.start),
        }
    }
}

/// What went wrong while compiling rules.
#[derive(Debug, thiserror::Error)]
pub enum LegislateErrorKind {
    #[error("unrecognised replacement class `{0}`")]
    UnrecognisedClass(String),

    #[error("replacement already declared with id `{0}`")]
    DuplicateId(String),

    #[error("attribute declaration without an active class declaration")]
    AttributeWithoutClass,

    #[error("unrecognised attribute `{attribute}` for `{class}`")]
    UnrecognisedAttribute {
        attribute: String,
        class: &'static str,
    },

    #[error("substitution declaration without an active class declaration")]
    SubstitutionWithoutClass,

    #[error("continuation only allowed for attribute or substitution declarations")]
    OrphanContinuation,

    #[error("invalid syntax\n\n{}", SYNTAX_HELP)]
    InvalidSyntax,

    #[error("invalid specification `{specification}` for attribute `{attribute}`")]
    InvalidSpecification {
        specification: String,
        attribute: &'static str,
    },

    #[error("invalid value `{value}` for attribute `{attribute}`")]
    InvalidValue {
        value: String,
        attribute: &'static str,
    },

    #[error("invalid value `{0}` not a character repeated for attribute `extensible_delimiter`")]
    InvalidExtensibleDelimiter(String),

    #[error("undefined replacement `#{0}`")]
    UndefinedReplacement(String),

    #[error("root replacement already declared (`#{0}`)")]
    DuplicateRoot(String),

    #[error("self-referential `queue_position`")]
    SelfReferentialQueuePosition,

    #[error("replacement `#{0}` not in queue")]
    NotInQueue(String),

    #[error("bad regex pattern `{pattern}`")]
    BadPattern {
        pattern: String,
        #[source]
        source: PatternError,
    },

    #[error("named capture groups not allowed in `{0}`")]
    NamedCaptureGroups(&'static str),

    #[error("missing delimiter `-->` in substitution `{0}`")]
    MissingDelimiter(String),

    #[error("bad regex substitute `{substitute}` for pattern `{pattern}`")]
    BadSubstitute {
        substitute: String,
        pattern: String,
        #[source]
        source: PatternError,
    },

    #[error("class `{0}` does not allow substitutions")]
    SubstitutionsNotAllowed(&'static str),

    #[error("missing attribute `{attribute}` for {class}")]
    MissingAttribute {
        attribute: &'static str,
        class: &'static str,
    },

    #[error("cannot compile replacement `#{id}`")]
    UncompilableRule {
        id: String,
        #[source]
        source: PatternError,
    },

    #[error("recursive inclusion: {0}")]
    RecursiveInclusion(String),

    #[error("file `{0}` (relative to terminal) not found")]
    IncludedFileNotFound(String),

    #[error("cannot read file `{file}`")]
    UnreadableFile {
        file: String,
        #[source]
        source: std::io::Error,
    },
}

/// Rule compilation failure, located in a rules file.
#[derive(Debug)]
pub struct LegislateError {
    pub file: String,
    pub lines: LineRange,
    pub kind: LegislateErrorKind,
}

impl LegislateError {
    pub(crate) fn new(file: &str, lines: LineRange, kind: LegislateErrorKind) -> Self {
        Self {
            file: file.to_owned(),
            lines,
            kind,
        }
    }
}

impl fmt::Display for LegislateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}`, {}: {}", self.file, self.lines, self.kind)
    }
}

impl std::error::Error for LegislateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&self.kind)
    }
}

/// Regex engine failure while applying a committed rule.
#[derive(Debug, thiserror::Error)]
#[error("replacement `#{rule_id}` could not be applied")]
pub struct ApplyError {
    pub rule_id: String,
    #[source]
    pub source: Box<fancy_regex::Error>,
}

impl ApplyError {
    pub(crate) fn new(rule_id: &str, source: fancy_regex::Error) -> Self {
        Self {
            rule_id: rule_id.to_owned(),
            source: Box::new(source),
        }
    }
}

/// Error returned by document conversion.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error(transparent)]
    Legislate(#[from] LegislateError),

    #[error(transparent)]
    Apply(#[from] ApplyError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_range_display() {
        assert_eq!(LineRange::line(3).to_string(), "line 3");
        assert_eq!(LineRange::span(3, 4).to_string(), "line 3");
        assert_eq!(LineRange::span(3, 6).to_string(), "lines 3 to 5");
    }

    #[test]
    fn test_legislate_error_display() {
        let err = LegislateError::new(
            "rules.cmdr",
            LineRange::line(7),
            LegislateErrorKind::UndefinedReplacement("nope".to_owned()),
        );
        assert_eq!(
            err.to_string(),
            "`rules.cmdr`, line 7: undefined replacement `#nope`"
        );
    }
}
