//! Rule pattern dialect.
//!
//! Replacement rules write their patterns in free-spacing form: unescaped
//! whitespace and `#` comments outside character classes are ignored, and the
//! shorthand classes `\s`, `\d` and `\w` are ASCII-only. Named groups use
//! `(?P<name>...)`, backreferences `(?P=name)`, and `\Z` anchors the very end
//! of the text. This module lowers that dialect onto plain `fancy-regex`
//! syntax, parses substitute templates against a compiled pattern, and runs
//! global substitutions.

use std::fmt::Write as _;

use fancy_regex::{Captures, Regex, RegexBuilder};

use crate::error::ApplyError;

/// Backtracking budget per search; rule patterns routinely scan whole documents.
const BACKTRACK_LIMIT: usize = 100_000_000;

/// ASCII whitespace as seen by the rule dialect.
const SPACE_MEMBERS: &str = r"\t\n\x0B\x0C\r\x20";
const DIGIT_MEMBERS: &str = "0-9";
const WORD_MEMBERS: &str = "0-9A-Za-z_";
const NON_SPACE_MEMBERS: &str = r"\x{0}-\x{8}\x{E}-\x{1F}\x{21}-\x{10FFFF}";
const NON_DIGIT_MEMBERS: &str = r"\x{0}-\x{2F}\x{3A}-\x{10FFFF}";
const NON_WORD_MEMBERS: &str = r"\x{0}-\x{2F}\x{3A}-\x{40}\x{5B}-\x{5E}\x{60}\x{7B}-\x{10FFFF}";
/// `\b` over the ASCII word class.
const WORD_BOUNDARY: &str = "(?:(?<=[0-9A-Za-z_])(?![0-9A-Za-z_])|(?<![0-9A-Za-z_])(?=[0-9A-Za-z_]))";
/// `\B` over the ASCII word class.
const NON_WORD_BOUNDARY: &str = "(?:(?<=[0-9A-Za-z_])(?=[0-9A-Za-z_])|(?<![0-9A-Za-z_])(?![0-9A-Za-z_]))";

/// Error raised while turning dialect text into a regex or template.
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    /// The dialect text itself is malformed.
    #[error("{0}")]
    Syntax(String),
    /// The lowered pattern was rejected by the regex engine.
    #[error("{0}")]
    Regex(#[from] Box<fancy_regex::Error>),
}

fn syntax_error(message: impl Into<String>) -> PatternError {
    PatternError::Syntax(message.into())
}

/// Whitespace skipped by free-spacing mode.
fn is_free_space(character: char) -> bool {
    matches!(character, ' ' | '\t' | '\n' | '\r' | '\x0B' | '\x0C')
}

/// Compile a dialect pattern.
///
/// `multiline` makes `^` and `$` match at line boundaries.
///
/// # Errors
///
/// Returns [`PatternError`] if the pattern is malformed.
pub fn compile(source: &str, multiline: bool) -> Result<Regex, PatternError> {
    let lowered = lower(source)?;
    let full = if multiline {
        format!("(?m){lowered}")
    } else {
        lowered
    };
    RegexBuilder::new(&full)
        .backtrack_limit(BACKTRACK_LIMIT)
        .build()
        .map_err(|err| PatternError::Regex(Box::new(err)))
}

/// Compile a fixed pattern used by the compiler itself.
///
/// Such patterns never need backtracking features, so they run on `regex`.
///
/// # Panics
///
/// Panics if the pattern is malformed.
pub(crate) fn fixed(source: &str) -> regex::Regex {
    let lowered = lower(source).unwrap_or_else(|err| panic!("malformed pattern {source:?}: {err}"));
    regex::Regex::new(&lowered).unwrap_or_else(|err| panic!("malformed pattern {source:?}: {err}"))
}

/// Escape literal text for use inside a dialect pattern.
///
/// Whitespace is escaped too, so the result survives free-spacing mode.
#[must_use]
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for character in text.chars() {
        if "()[]{}?*+-|^$\\.&~# \t\n\r\x0B\x0C".contains(character) {
            escaped.push('\\');
        }
        escaped.push(character);
    }
    escaped
}

/// Lower dialect text onto `fancy-regex` syntax.
///
/// # Errors
///
/// Returns [`PatternError::Syntax`] for bad escapes and unterminated classes.
pub fn lower(source: &str) -> Result<String, PatternError> {
    Lowering {
        characters: source.chars().collect(),
        position: 0,
        output: String::with_capacity(source.len() + 16),
    }
    .run()
}

struct Lowering {
    characters: Vec<char>,
    position: usize,
    output: String,
}

impl Lowering {
    fn peek(&self, offset: usize) -> Option<char> {
        self.characters.get(self.position + offset).copied()
    }

    fn run(mut self) -> Result<String, PatternError> {
        while let Some(character) = self.peek(0) {
            match character {
                c if is_free_space(c) => self.position += 1,
                '#' => self.skip_comment(),
                '\\' => self.escape_sequence(false)?,
                '[' => self.character_class()?,
                '{' => self.brace(),
                '}' => {
                    self.output.push_str(r"\x{7D}");
                    self.position += 1;
                }
                '(' => self.group_opening()?,
                c => {
                    self.output.push(c);
                    self.position += 1;
                }
            }
        }
        Ok(self.output)
    }

    fn skip_comment(&mut self) {
        while let Some(character) = self.peek(0) {
            self.position += 1;
            if character == '\n' {
                break;
            }
        }
    }

    fn rest_starts_with(&self, prefix: &str) -> bool {
        prefix
            .chars()
            .enumerate()
            .all(|(offset, expected)| self.peek(offset) == Some(expected))
    }

    fn group_opening(&mut self) -> Result<(), PatternError> {
        if self.rest_starts_with("(?P=") {
            self.position += 4;
            let name = self.take_until(')', "missing ), unterminated name")?;
            write!(self.output, r"\k<{name}>").ok();
        } else if self.rest_starts_with("(?#") {
            self.position += 3;
            self.take_until(')', "missing ), unterminated comment")?;
        } else {
            self.output.push('(');
            self.position += 1;
        }
        Ok(())
    }

    /// Consume up to and including `terminator`, returning what came before.
    fn take_until(&mut self, terminator: char, message: &str) -> Result<String, PatternError> {
        let mut taken = String::new();
        loop {
            match self.peek(0) {
                Some(c) if c == terminator => {
                    self.position += 1;
                    return Ok(taken);
                }
                Some(c) => {
                    taken.push(c);
                    self.position += 1;
                }
                None => return Err(syntax_error(message)),
            }
        }
    }

    /// A `{` is a repetition only when it reads `{m}`, `{m,}`, `{,n}` or `{m,n}`.
    fn brace(&mut self) {
        let mut offset = 1;
        let mut low = String::new();
        while let Some(c) = self.peek(offset).filter(char::is_ascii_digit) {
            low.push(c);
            offset += 1;
        }
        let mut high = None;
        if self.peek(offset) == Some(',') {
            offset += 1;
            let mut digits = String::new();
            while let Some(c) = self.peek(offset).filter(char::is_ascii_digit) {
                digits.push(c);
                offset += 1;
            }
            high = Some(digits);
        }
        let is_repetition = self.peek(offset) == Some('}') && offset > 1;
        if !is_repetition {
            self.output.push_str(r"\x{7B}");
            self.position += 1;
            return;
        }
        let low = if low.is_empty() { "0".to_owned() } else { low };
        match high {
            None => write!(self.output, "{{{low}}}").ok(),
            Some(high) => write!(self.output, "{{{low},{high}}}").ok(),
        };
        self.position += offset + 1;
    }

    fn character_class(&mut self) -> Result<(), PatternError> {
        self.output.push('[');
        self.position += 1;
        if self.peek(0) == Some('^') {
            self.output.push('^');
            self.position += 1;
        }
        if self.peek(0) == Some(']') {
            self.output.push_str(r"\x{5D}");
            self.position += 1;
        }
        loop {
            match self.peek(0) {
                None => return Err(syntax_error("unterminated character set")),
                Some(']') => {
                    self.output.push(']');
                    self.position += 1;
                    return Ok(());
                }
                Some('\\') => self.escape_sequence(true)?,
                Some('[') => {
                    self.output.push_str(r"\x{5B}");
                    self.position += 1;
                }
                Some('&') => {
                    self.output.push_str(r"\x{26}");
                    self.position += 1;
                }
                Some('~') => {
                    self.output.push_str(r"\x{7E}");
                    self.position += 1;
                }
                Some(c) => {
                    self.output.push(c);
                    self.position += 1;
                }
            }
        }
    }

    fn take_hex(&mut self, count: usize, escape: char) -> Result<u32, PatternError> {
        let digits: String = (0..count).filter_map(|offset| self.peek(offset)).collect();
        if digits.chars().count() != count || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(syntax_error(format!("incomplete escape \\{escape}{digits}")));
        }
        self.position += count;
        u32::from_str_radix(&digits, 16).map_err(|_| syntax_error(format!("bad escape \\{escape}{digits}")))
    }

    fn push_code_point(&mut self, code_point: u32) {
        write!(self.output, r"\x{{{code_point:X}}}").ok();
    }

    fn push_shorthand(&mut self, members: &str, complement: &str, negated: bool, in_class: bool) {
        let members = if negated { complement } else { members };
        if in_class {
            self.output.push_str(members);
        } else {
            write!(self.output, "[{members}]").ok();
        }
    }

    fn escape_sequence(&mut self, in_class: bool) -> Result<(), PatternError> {
        let Some(escaped) = self.peek(1) else {
            return Err(syntax_error(r"bad escape (end of pattern)"));
        };
        self.position += 2;
        match escaped {
            'A' if !in_class => self.output.push_str(r"\A"),
            'Z' if !in_class => self.output.push_str(r"\z"),
            'b' if !in_class => self.output.push_str(WORD_BOUNDARY),
            'B' if !in_class => self.output.push_str(NON_WORD_BOUNDARY),
            'b' => self.push_code_point(0x08),
            'd' => self.push_shorthand(DIGIT_MEMBERS, NON_DIGIT_MEMBERS, false, in_class),
            'D' => self.push_shorthand(DIGIT_MEMBERS, NON_DIGIT_MEMBERS, true, in_class),
            's' => self.push_shorthand(SPACE_MEMBERS, NON_SPACE_MEMBERS, false, in_class),
            'S' => self.push_shorthand(SPACE_MEMBERS, NON_SPACE_MEMBERS, true, in_class),
            'w' => self.push_shorthand(WORD_MEMBERS, NON_WORD_MEMBERS, false, in_class),
            'W' => self.push_shorthand(WORD_MEMBERS, NON_WORD_MEMBERS, true, in_class),
            'n' => self.output.push_str(r"\n"),
            't' => self.output.push_str(r"\t"),
            'r' => self.output.push_str(r"\r"),
            'f' => self.push_code_point(0x0C),
            'v' => self.push_code_point(0x0B),
            'a' => self.push_code_point(0x07),
            'x' => {
                let code_point = self.take_hex(2, 'x')?;
                self.push_code_point(code_point);
            }
            'u' => {
                let code_point = self.take_hex(4, 'u')?;
                self.push_code_point(code_point);
            }
            'U' => {
                let code_point = self.take_hex(8, 'U')?;
                if char::from_u32(code_point).is_none() {
                    return Err(syntax_error(format!("bad escape \\U{code_point:08x}")));
                }
                self.push_code_point(code_point);
            }
            '0' => {
                let mut value = 0;
                for _ in 0..2 {
                    match self.peek(0).and_then(|c| c.to_digit(8)) {
                        Some(digit) => {
                            value = value * 8 + digit;
                            self.position += 1;
                        }
                        None => break,
                    }
                }
                self.push_code_point(value);
            }
            '1'..='9' if !in_class => {
                let mut group = String::from(escaped);
                if let Some(digit) = self.peek(0).filter(char::is_ascii_digit) {
                    group.push(digit);
                    self.position += 1;
                }
                write!(self.output, r"\{group}").ok();
            }
            c if c.is_ascii_alphanumeric() => {
                return Err(syntax_error(format!("bad escape \\{c}")));
            }
            c if c.is_ascii() => self.push_code_point(u32::from(c)),
            c => self.output.push(c),
        }
        Ok(())
    }
}

/// Piece of a parsed substitute template.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Group(usize),
}

/// Substitute template: literal text interleaved with group references.
///
/// Recognised references are `\g<name>`, `\g<number>` and `\1` to `\99`.
/// The escapes `\n`, `\t`, `\r`, `\f`, `\v`, `\a`, `\b` and `\\` stand for
/// their characters, `\0` starts an octal escape, any other escaped ASCII
/// letter is an error, and any other escaped character keeps its backslash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pieces: Vec<Piece>,
}

impl Template {
    /// Parse `source` against the groups of `regex`.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::Syntax`] for bad escapes and unknown groups.
    pub fn parse(source: &str, regex: &Regex) -> Result<Self, PatternError> {
        let group_count = regex.captures_len();
        let group_index = |name: &str| {
            regex
                .capture_names()
                .position(|candidate| candidate == Some(name))
        };

        let characters: Vec<char> = source.chars().collect();
        let mut pieces = Vec::new();
        let mut literal = String::new();
        let mut position = 0;

        let push_group = |literal: &mut String, pieces: &mut Vec<Piece>, index: usize| {
            if !literal.is_empty() {
                pieces.push(Piece::Literal(std::mem::take(literal)));
            }
            pieces.push(Piece::Group(index));
        };

        while let Some(&character) = characters.get(position) {
            position += 1;
            if character != '\\' {
                literal.push(character);
                continue;
            }
            let Some(&escaped) = characters.get(position) else {
                return Err(syntax_error(r"bad escape (end of template)"));
            };
            position += 1;
            match escaped {
                'g' => {
                    if characters.get(position) != Some(&'<') {
                        return Err(syntax_error("missing <"));
                    }
                    let name: String = characters[position + 1..]
                        .iter()
                        .take_while(|&&c| c != '>')
                        .collect();
                    let name_end = position + 1 + name.chars().count();
                    if characters.get(name_end) != Some(&'>') {
                        return Err(syntax_error("missing >, unterminated name"));
                    }
                    position = name_end + 1;
                    let index = if !name.is_empty() && name.chars().all(|c| c.is_ascii_digit()) {
                        name.parse::<usize>()
                            .map_err(|_| syntax_error(format!("invalid group reference {name}")))?
                    } else if is_identifier(&name) {
                        group_index(&name)
                            .ok_or_else(|| syntax_error(format!("unknown group name '{name}'")))?
                    } else {
                        return Err(syntax_error(format!("bad character in group name '{name}'")));
                    };
                    if index >= group_count {
                        return Err(syntax_error(format!("invalid group reference {index}")));
                    }
                    push_group(&mut literal, &mut pieces, index);
                }
                '0' => {
                    let mut value = 0;
                    for _ in 0..2 {
                        match characters.get(position).and_then(|c| c.to_digit(8)) {
                            Some(digit) => {
                                value = value * 8 + digit;
                                position += 1;
                            }
                            None => break,
                        }
                    }
                    literal.push(char::from_u32(value).unwrap_or(char::REPLACEMENT_CHARACTER));
                }
                '1'..='9' => {
                    let mut digits = String::from(escaped);
                    if let Some(&next) = characters.get(position).filter(|c| c.is_ascii_digit()) {
                        digits.push(next);
                        position += 1;
                        let third = characters.get(position).copied();
                        let octal = escaped < '8'
                            && next < '8'
                            && third.is_some_and(|c| ('0'..='7').contains(&c));
                        if let (true, Some(third)) = (octal, third) {
                            digits.push(third);
                            position += 1;
                            let value = u32::from_str_radix(&digits, 8)
                                .map_err(|_| syntax_error(format!("bad escape \\{digits}")))?;
                            if value > 0o377 {
                                return Err(syntax_error(format!(
                                    "octal escape value \\{digits} outside of range 0-0o377"
                                )));
                            }
                            literal.push(char::from_u32(value).unwrap_or(char::REPLACEMENT_CHARACTER));
                            continue;
                        }
                    }
                    let index: usize = digits
                        .parse()
                        .map_err(|_| syntax_error(format!("invalid group reference {digits}")))?;
                    if index >= group_count {
                        return Err(syntax_error(format!("invalid group reference {index}")));
                    }
                    push_group(&mut literal, &mut pieces, index);
                }
                'n' => literal.push('\n'),
                't' => literal.push('\t'),
                'r' => literal.push('\r'),
                'f' => literal.push('\x0C'),
                'v' => literal.push('\x0B'),
                'a' => literal.push('\x07'),
                'b' => literal.push('\x08'),
                '\\' => literal.push('\\'),
                c if c.is_ascii_alphabetic() => {
                    return Err(syntax_error(format!("bad escape \\{c}")));
                }
                c => {
                    literal.push('\\');
                    literal.push(c);
                }
            }
        }
        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }
        Ok(Self { pieces })
    }

    /// Expand the template for one match; unmatched groups expand to nothing.
    #[must_use]
    pub fn expand(&self, captures: &Captures<'_>) -> String {
        let mut expanded = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Literal(text) => expanded.push_str(text),
                Piece::Group(index) => {
                    if let Some(group) = captures.get(*index) {
                        expanded.push_str(group.as_str());
                    }
                }
            }
        }
        expanded
    }
}

fn is_identifier(name: &str) -> bool {
    let mut characters = name.chars();
    characters
        .next()
        .is_some_and(|first| first == '_' || first.is_alphabetic())
        && characters.all(|c| c == '_' || c.is_alphanumeric())
}

/// Replace every match of `regex` in `text` with the result of `substitute`.
///
/// An empty match is allowed right after a non-empty one, but never twice at
/// the same position.
pub(crate) fn replace_all<F>(
    regex: &Regex,
    text: &str,
    rule_id: &str,
    mut substitute: F,
) -> Result<String, ApplyError>
where
    F: FnMut(&Captures<'_>) -> Result<String, ApplyError>,
{
    let mut output = String::with_capacity(text.len());
    let mut last_end = 0;
    let mut position = 0;
    let mut must_advance = false;

    while position <= text.len() {
        let found = regex
            .captures_from_pos(text, position)
            .map_err(|err| ApplyError::new(rule_id, err))?;
        let Some(captures) = found else {
            break;
        };
        let Some(whole) = captures.get(0) else {
            break;
        };
        if must_advance && whole.start() == position && whole.end() == position {
            match text[position..].chars().next() {
                Some(next) => {
                    position += next.len_utf8();
                    must_advance = false;
                    continue;
                }
                None => break,
            }
        }
        output.push_str(&text[last_end..whole.start()]);
        output.push_str(&substitute(&captures)?);
        last_end = whole.end();
        must_advance = whole.start() == whole.end();
        position = whole.end();
    }

    output.push_str(&text[last_end..]);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn substitute(pattern: &str, template: &str, text: &str) -> String {
        let regex = compile(pattern, true).unwrap();
        let template = Template::parse(template, &regex).unwrap();
        replace_all(&regex, text, "test", |captures| Ok(template.expand(captures))).unwrap()
    }

    #[test]
    fn test_lower_strips_free_space_and_comments() {
        assert_eq!(lower("a b  # trailing\n c").unwrap(), "abc");
    }

    #[test]
    fn test_lower_keeps_class_contents() {
        assert_eq!(lower("[ #]").unwrap(), "[ #]");
        assert_eq!(
            lower(r"[^\S\n]").unwrap(),
            r"[^\x{0}-\x{8}\x{E}-\x{1F}\x{21}-\x{10FFFF}\n]"
        );
    }

    #[test]
    fn test_lower_translates_dialect_escapes() {
        assert_eq!(lower(r"\A \Z").unwrap(), r"\A\z");
        assert_eq!(lower(r"\s").unwrap(), r"[\t\n\x0B\x0C\r\x20]");
        assert_eq!(lower(r"(?P<x> a ) (?P=x)").unwrap(), r"(?P<x>a)\k<x>");
        assert_eq!(lower(r"\uF8FF").unwrap(), r"\x{F8FF}");
        assert_eq!(lower(r"\ ").unwrap(), r"\x{20}");
    }

    #[test]
    fn test_lower_braces() {
        assert_eq!(lower("a{2,}").unwrap(), "a{2,}");
        assert_eq!(lower("a{,3}").unwrap(), "a{0,3}");
        assert_eq!(lower(";{}").unwrap(), r";\x{7B}\x{7D}");
    }

    #[test]
    fn test_lower_rejects_bad_escape() {
        assert!(lower(r"\q").is_err());
        assert!(lower("[abc").is_err());
    }

    #[test]
    fn test_escape_survives_free_spacing() {
        let regex = compile(&escape("a b.c"), false).unwrap();
        assert!(regex.is_match("a b.c").unwrap());
        assert!(!regex.is_match("a bxc").unwrap());
    }

    #[test]
    fn test_ascii_whitespace_only() {
        let regex = compile(r"\A [\s]+ \Z", false).unwrap();
        assert!(regex.is_match(" \t\n").unwrap());
        assert!(!regex.is_match("\u{a0}").unwrap());
    }

    #[test]
    fn test_ascii_shorthands_reject_non_ascii() {
        let word = compile(r"\A \w+ \Z", false).unwrap();
        assert!(word.is_match("abc_9").unwrap());
        assert!(!word.is_match("é").unwrap());

        let digit = compile(r"\d", false).unwrap();
        assert!(digit.is_match("3").unwrap());
        assert!(!digit.is_match("\u{663}").unwrap());
    }

    #[test]
    fn test_word_boundaries_follow_ascii_word_class() {
        let boundary = compile(r"\b", false).unwrap();
        let positions: Vec<usize> = boundary.find_iter("café").map(|m| m.unwrap().start()).collect();
        assert_eq!(positions, vec![0, 3]);

        assert_eq!(
            substitute(r"\b (?P<w> \w+ ) \b", r"<\g<w>>", "café naïve abc"),
            "<caf>é <na>ï<ve> <abc>"
        );
        assert_eq!(substitute(r"\B", "-", "ab é"), "a-b -é-");
    }

    #[test]
    fn test_template_groups_and_escapes() {
        assert_eq!(substitute(r"(?P<x> [a-z]+ )", r"<\g<x>>", "ab cd"), "<ab> <cd>");
        assert_eq!(substitute("([a-z])([0-9])", r"\2\1", "a1"), "1a");
        assert_eq!(substitute("x", r"\n\\", "x"), "\n\\");
        assert_eq!(substitute("x", r"\{", "x"), r"\{");
    }

    #[test]
    fn test_template_unmatched_group_is_empty() {
        assert_eq!(substitute("(a)|(b)", r"[\1\2]", "ab"), "[a][b]");
    }

    #[test]
    fn test_template_rejects_unknown_group() {
        let regex = compile("(?P<x>a)", true).unwrap();
        assert!(Template::parse(r"\g<y>", &regex).is_err());
        assert!(Template::parse(r"\2", &regex).is_err());
        assert!(Template::parse(r"\q", &regex).is_err());
    }

    #[test]
    fn test_replace_all_empty_matches() {
        assert_eq!(substitute("x*", "-", "abxd"), "-a-b--d-");
        assert_eq!(substitute(r"\A", "<", "text"), "<text");
        assert_eq!(substitute(r"\Z", ">", "text"), "text>");
    }

    #[test]
    fn test_replace_all_multiline_anchors() {
        assert_eq!(substitute("^ [ ]+", "", "  a\n    b"), "a\nb");
    }
}
