//! Inline emphasis with assorted delimiter characters, such as `*em*`,
//! `**strong**` and `_i_`, converted by delimiter character and length.

use std::collections::{BTreeMap, BTreeSet};

use fancy_regex::Regex;

use super::{CompileError, Context, Rule, Settings, attributes_sequence, group, prohibited_fragment, whole_match};
use crate::error::ApplyError;
use crate::idioms;
use crate::pattern;

#[derive(Debug)]
pub(super) struct InlineAssortedDelimiters {
    regex: Regex,
    tag_name_from_delimiter: BTreeMap<char, BTreeMap<usize, String>>,
    attribute_specifications: Option<String>,
}

impl InlineAssortedDelimiters {
    pub(super) fn compile(settings: Settings) -> Result<Self, CompileError> {
        if settings.tag_name_from_delimiter.is_empty() {
            return Err(CompileError::MissingAttribute("delimiter_conversion"));
        }

        let mut single = BTreeSet::new();
        let mut either = BTreeSet::new();
        let mut double = BTreeSet::new();
        for (&character, tag_name_from_length) in &settings.tag_name_from_delimiter {
            let lengths: Vec<usize> = tag_name_from_length.keys().copied().collect();
            match lengths.as_slice() {
                [1] => single.insert(character),
                [1, 2] => either.insert(character),
                [2] => double.insert(character),
                _ => false,
            };
        }
        let all: BTreeSet<char> = single.iter().chain(&either).chain(&double).copied().collect();
        let all_class = idioms::character_class(&all).ok_or(CompileError::MissingAttribute("delimiter_conversion"))?;

        // A lookbehind on the character just read decides how long the delimiter may be.
        let repetitions: Vec<String> = [
            (&double, r"(?P=delimiter_character)"),
            (&either, r"(?P=delimiter_character)?"),
            (&single, ""),
        ]
        .into_iter()
        .filter_map(|(characters, repetition)| {
            idioms::character_class(characters).map(|class| format!("(?<= {class} ) {repetition}"))
        })
        .collect();
        let opening_delimiter = format!(
            "(?P<delimiter> (?P<delimiter_character> {all_class} ) (?: {} ) )",
            repetitions.join(" | ")
        );

        let prohibited = match prohibited_fragment(settings.prohibited_content) {
            Some(fragment) => format!(r"(?P=delimiter_character) | {fragment}"),
            None => r"(?P=delimiter_character)".to_owned(),
        };

        let source = format!(
            r"[|]? {opening_delimiter} (?! [\s] | [<][/] ) {} [\s]* {} (?<! [\s|] ) (?P=delimiter)",
            idioms::attribute_specifications(settings.attribute_specifications.as_deref(), false, true, true),
            idioms::content(Some(&prohibited), idioms::ANY_CHARACTER, false, "content"),
        );

        Ok(Self {
            regex: pattern::compile(&source, true)?,
            tag_name_from_delimiter: settings.tag_name_from_delimiter,
            attribute_specifications: settings.attribute_specifications,
        })
    }

    /// Replace to a fixed point, so that nested emphasis is converted.
    pub(super) fn apply(&self, context: &Context<'_>, rule: &Rule, text: &str) -> Result<String, ApplyError> {
        let mut text = text.to_owned();
        loop {
            let replaced = pattern::replace_all(&self.regex, &text, rule.id(), |captures| {
                let delimiter = group(captures, "delimiter");
                let tag_name = group(captures, "delimiter_character")
                    .chars()
                    .next()
                    .and_then(|character| self.tag_name_from_delimiter.get(&character))
                    .and_then(|tag_name_from_length| tag_name_from_length.get(&delimiter.chars().count()));
                let Some(tag_name) = tag_name else {
                    return Ok(whole_match(captures).to_owned());
                };

                let attributes_sequence = attributes_sequence(self.attribute_specifications.as_deref(), captures);
                let content = context.apply(rule.index(), group(captures, "content"), None)?;
                Ok(format!("<{tag_name}{attributes_sequence}>{content}</{tag_name}>"))
            })?;
            if replaced == text {
                return Ok(text);
            }
            text = replaced;
        }
    }
}
