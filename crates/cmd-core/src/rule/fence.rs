//! Delimited constructs: fixed delimiters such as `**strong**` and
//! extensible fences such as code blocks opened with three or more
//! backticks.

use fancy_regex::Regex;
use indexmap::IndexMap;

use super::{
    CompileError, Context, Rule, RuleId, Settings, attributes_sequence, enabled_flags, group, prohibited_fragment,
    required,
};
use crate::error::ApplyError;
use crate::idioms;
use crate::pattern;

#[derive(Debug)]
pub(super) struct Fence {
    regex: Regex,
    flag_name_from_letter: IndexMap<char, String>,
    attribute_specifications: Option<String>,
    tag_name: Option<String>,
    content_replacements: Vec<RuleId>,
    concluding_replacements: Vec<RuleId>,
}

impl Fence {
    pub(super) fn compile_fixed(settings: Settings) -> Result<Self, CompileError> {
        let is_block = required(settings.syntax_type, "syntax_type")?.is_block();
        let opening_delimiter = required(settings.opening_delimiter.as_deref(), "opening_delimiter")?;
        let closing_delimiter = required(settings.closing_delimiter.as_deref(), "closing_delimiter")?;

        let anchoring = idioms::block_anchoring(is_block, false);
        let parts: [&str; 7] = [
            anchoring,
            &idioms::flags(&settings.flag_name_from_letter),
            &pattern::escape(opening_delimiter),
            &idioms::attribute_specifications(settings.attribute_specifications.as_deref(), is_block, true, true),
            &content(&settings),
            anchoring,
            &pattern::escape(closing_delimiter),
        ];

        Self::new(&parts.concat(), settings)
    }

    pub(super) fn compile_extensible(settings: Settings) -> Result<Self, CompileError> {
        let is_block = required(settings.syntax_type, "syntax_type")?.is_block();
        let (character, min_length) = required(settings.extensible_delimiter, "extensible_delimiter")?;

        let anchoring = idioms::block_anchoring(is_block, false);
        let parts: [&str; 9] = [
            anchoring,
            &idioms::flags(&settings.flag_name_from_letter),
            &pattern::escape(settings.prologue_delimiter.as_deref().unwrap_or_default()),
            &idioms::extensible_delimiter_opening(character, min_length),
            &idioms::attribute_specifications(settings.attribute_specifications.as_deref(), is_block, true, true),
            &content(&settings),
            anchoring,
            idioms::EXTENSIBLE_DELIMITER_CLOSING,
            &pattern::escape(settings.epilogue_delimiter.as_deref().unwrap_or_default()),
        ];

        Self::new(&parts.concat(), settings)
    }

    fn new(source: &str, settings: Settings) -> Result<Self, CompileError> {
        Ok(Self {
            regex: pattern::compile(source, true)?,
            flag_name_from_letter: settings.flag_name_from_letter,
            attribute_specifications: settings.attribute_specifications,
            tag_name: settings.tag_name,
            content_replacements: settings.content_replacements,
            concluding_replacements: settings.concluding_replacements,
        })
    }

    pub(super) fn apply(&self, context: &Context<'_>, rule: &Rule, text: &str) -> Result<String, ApplyError> {
        pattern::replace_all(&self.regex, text, rule.id(), |captures| {
            let enabled_flags = enabled_flags(captures, &self.flag_name_from_letter);
            let attributes_sequence = attributes_sequence(self.attribute_specifications.as_deref(), captures);

            let content = context.apply_each(
                &self.content_replacements,
                group(captures, "content").to_owned(),
                Some(&enabled_flags),
            )?;
            let substitute = match &self.tag_name {
                Some(tag_name) => format!("<{tag_name}{attributes_sequence}>{content}</{tag_name}>"),
                None => content,
            };

            context.apply_each(&self.concluding_replacements, substitute, Some(&enabled_flags))
        })
    }
}

fn content(settings: &Settings) -> String {
    let prohibited = prohibited_fragment(settings.prohibited_content);
    idioms::content(prohibited.as_deref(), idioms::ANY_CHARACTER, true, "content")
}
