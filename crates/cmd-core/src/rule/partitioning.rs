//! Partitioning of text into items, such as list items or table cells,
//! each running from a starting pattern up to the next ending pattern.

use fancy_regex::Regex;

use super::{CompileError, Context, Rule, RuleId, Settings, attributes_sequence, group, required};
use crate::error::ApplyError;
use crate::idioms;
use crate::pattern;

#[derive(Debug)]
pub(super) struct Partitioning {
    regex: Regex,
    attribute_specifications: Option<String>,
    tag_name: Option<String>,
    content_replacements: Vec<RuleId>,
    concluding_replacements: Vec<RuleId>,
}

impl Partitioning {
    pub(super) fn compile(settings: Settings) -> Result<Self, CompileError> {
        let starting_pattern = required(settings.starting_pattern.as_deref(), "starting_pattern")?;
        let specifications = settings.attribute_specifications.as_deref();
        let anchoring = idioms::block_anchoring(true, false);

        let specifications_or_whitespace = match specifications {
            Some(_) => format!(
                r"(?: {} | [\s]+? )",
                idioms::attribute_specifications(specifications, false, true, false)
            ),
            None => r"[\s]+?".to_owned(),
        };
        let ending_lookahead = match settings.ending_pattern.as_deref() {
            Some(ending_pattern) => {
                let specifications_or_whitespace = match specifications {
                    Some(_) => format!(
                        r"(?: {} | [\s]+ )",
                        idioms::attribute_specifications(specifications, false, false, false)
                    ),
                    None => r"[\s]+".to_owned(),
                };
                format!(r"(?= {anchoring}(?: {ending_pattern} ){specifications_or_whitespace} | \Z )")
            }
            None => r"(?= \Z )".to_owned(),
        };

        let source = format!(
            "{anchoring}(?: {starting_pattern} ){specifications_or_whitespace}{}{ending_lookahead}",
            idioms::content(None, idioms::ANY_CHARACTER, true, "content"),
        );

        Ok(Self {
            regex: pattern::compile(&source, true)?,
            attribute_specifications: settings.attribute_specifications,
            tag_name: settings.tag_name,
            content_replacements: settings.content_replacements,
            concluding_replacements: settings.concluding_replacements,
        })
    }

    pub(super) fn apply(&self, context: &Context<'_>, rule: &Rule, text: &str) -> Result<String, ApplyError> {
        pattern::replace_all(&self.regex, text, rule.id(), |captures| {
            let attributes_sequence = attributes_sequence(self.attribute_specifications.as_deref(), captures);
            let content = context.apply_each(&self.content_replacements, group(captures, "content").to_owned(), None)?;
            let substitute = match &self.tag_name {
                Some(tag_name) => format!("<{tag_name}{attributes_sequence}>{content}</{tag_name}>\n"),
                None => content,
            };
            context.apply_each(&self.concluding_replacements, substitute, None)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::RuleClass;
    use super::super::tests::{apply_first, single};
    use crate::placeholder;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_items_run_to_next_start() {
        let rules = single(RuleClass::Partitioning, |settings| {
            settings.starting_pattern = Some("[-]".to_owned());
            settings.ending_pattern = Some("[-]".to_owned());
            settings.tag_name = Some("li".to_owned());
        });
        assert_eq!(
            apply_first(&rules, "- one\n- two\n  more\n"),
            "<li>one\n</li>\n<li>two\n  more\n</li>\n"
        );
    }

    #[test]
    fn test_items_with_attribute_specifications() {
        let rules = single(RuleClass::Partitioning, |settings| {
            settings.starting_pattern = Some("[*]".to_owned());
            settings.attribute_specifications = Some(String::new());
            settings.tag_name = Some("li".to_owned());
        });
        let output = apply_first(&rules, "*{.first} only");
        assert_eq!(placeholder::unprotect(&output), "<li class=\"first\"> only</li>\n");
    }

    #[test]
    fn test_start_requires_following_whitespace() {
        let rules = single(RuleClass::Partitioning, |settings| {
            settings.starting_pattern = Some("[-]".to_owned());
            settings.tag_name = Some("li".to_owned());
        });
        assert_eq!(apply_first(&rules, "-no-space"), "-no-space");
    }

    #[test]
    fn test_without_tag_keeps_content() {
        let rules = single(RuleClass::Partitioning, |settings| {
            settings.starting_pattern = Some("[|]".to_owned());
            settings.ending_pattern = Some("[|]".to_owned());
        });
        assert_eq!(apply_first(&rules, "| a\n| b"), "a\nb");
    }
}
