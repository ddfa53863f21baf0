//! Links: explicit `<scheme:uri>`, specified `[text](href "title")` and
//! referenced `[text][label]`.

use fancy_regex::Regex;
use indexmap::IndexMap;

use super::{
    CompileError, Context, Rule, RuleId, Settings, enabled_flags, extend_specifications, group, matched_title,
    matched_uri, optional_group, prohibited_fragment, protected_specification, whole_match,
};
use crate::attributes::build_attributes_sequence;
use crate::error::ApplyError;
use crate::idioms;
use crate::pattern;

fn bracketed(prohibited: Option<&str>, capture_group_name: &str) -> String {
    format!(
        r"\[ [\s]* {} [\s]* \]",
        idioms::content(prohibited, r"[^\]]", true, capture_group_name)
    )
}

#[derive(Debug)]
pub(super) struct ExplicitLink {
    regex: Regex,
    flag_name_from_letter: IndexMap<char, String>,
    has_attribute_specifications: bool,
    content_replacements: Vec<RuleId>,
    concluding_replacements: Vec<RuleId>,
}

impl ExplicitLink {
    pub(super) fn compile(settings: Settings) -> Result<Self, CompileError> {
        let source = format!(
            r"{}[<]{}(?P<uri> [a-zA-Z.+-]+ [:] [^\s>]*? )[>]",
            idioms::flags(&settings.flag_name_from_letter),
            idioms::attribute_specifications(settings.attribute_specifications.as_deref(), false, true, true),
        );
        Ok(Self {
            regex: pattern::compile(&source, false)?,
            flag_name_from_letter: settings.flag_name_from_letter,
            has_attribute_specifications: settings.attribute_specifications.is_some(),
            content_replacements: settings.content_replacements,
            concluding_replacements: settings.concluding_replacements,
        })
    }

    pub(super) fn apply(&self, context: &Context<'_>, rule: &Rule, text: &str) -> Result<String, ApplyError> {
        pattern::replace_all(&self.regex, text, rule.id(), |captures| {
            let enabled_flags = enabled_flags(captures, &self.flag_name_from_letter);
            let uri = group(captures, "uri");

            // Only the matched specifications apply; the rule's own are not merged in.
            let mut specifications = protected_specification("href", Some(uri));
            if self.has_attribute_specifications {
                specifications.push(' ');
                specifications.push_str(group(captures, "attribute_specifications"));
            }
            let attributes_sequence = build_attributes_sequence(&specifications, true);

            let content = context.apply_each(&self.content_replacements, uri.to_owned(), Some(&enabled_flags))?;
            let substitute = format!("<a{attributes_sequence}>{content}</a>");
            context.apply_each(&self.concluding_replacements, substitute, Some(&enabled_flags))
        })
    }
}

#[derive(Debug)]
pub(super) struct SpecifiedLink {
    regex: Regex,
    attribute_specifications: Option<String>,
}

impl SpecifiedLink {
    pub(super) fn compile(settings: Settings) -> Result<Self, CompileError> {
        let prohibited = prohibited_fragment(settings.prohibited_content);
        let source = format!(
            r"{}{}\((?: [\s]* {} )?(?: [\s]* {} )?[\s]* \)",
            bracketed(prohibited.as_deref(), "link_text"),
            idioms::attribute_specifications(settings.attribute_specifications.as_deref(), false, true, true),
            idioms::uri(false),
            idioms::TITLE,
        );
        Ok(Self {
            regex: pattern::compile(&source, false)?,
            attribute_specifications: settings.attribute_specifications,
        })
    }

    pub(super) fn apply(&self, rule: &Rule, text: &str) -> Result<String, ApplyError> {
        pattern::replace_all(&self.regex, text, rule.id(), |captures| {
            let specifications = [
                protected_specification("href", matched_uri(captures)),
                protected_specification("title", matched_title(captures)),
            ]
            .join(" ");
            let specifications =
                extend_specifications(specifications, self.attribute_specifications.as_deref(), captures);
            let attributes_sequence = build_attributes_sequence(&specifications, true);
            Ok(format!("<a{attributes_sequence}>{}</a>", group(captures, "link_text")))
        })
    }
}

#[derive(Debug)]
pub(super) struct ReferencedLink {
    regex: Regex,
    attribute_specifications: Option<String>,
}

impl ReferencedLink {
    pub(super) fn compile(settings: Settings) -> Result<Self, CompileError> {
        let prohibited = prohibited_fragment(settings.prohibited_content);
        let source = format!(
            "{}{}(?: {} )?",
            bracketed(prohibited.as_deref(), "link_text"),
            idioms::attribute_specifications(settings.attribute_specifications.as_deref(), false, true, true),
            bracketed(prohibited.as_deref(), "label"),
        );
        Ok(Self {
            regex: pattern::compile(&source, false)?,
            attribute_specifications: settings.attribute_specifications,
        })
    }

    pub(super) fn apply(&self, context: &Context<'_>, rule: &Rule, text: &str) -> Result<String, ApplyError> {
        pattern::replace_all(&self.regex, text, rule.id(), |captures| {
            let link_text = group(captures, "link_text");
            let label = optional_group(captures, "label")
                .filter(|label| !label.is_empty())
                .unwrap_or(link_text);

            let references = context.references.borrow();
            let Ok(reference) = references.load(label) else {
                return Ok(whole_match(captures).to_owned());
            };

            let specifications = [
                protected_specification("href", Some(reference.uri.as_str())),
                protected_specification("title", reference.title.as_deref()),
                reference.attribute_specifications.clone(),
            ]
            .join(" ");
            let specifications =
                extend_specifications(specifications, self.attribute_specifications.as_deref(), captures);
            let attributes_sequence = build_attributes_sequence(&specifications, true);
            Ok(format!("<a{attributes_sequence}>{link_text}</a>"))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::super::tests::{apply_first, single};
    use super::super::{Context, RuleClass, RuleId};
    use crate::placeholder;
    use crate::reference::{Reference, ReferenceTable};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_explicit_link() {
        let rules = single(RuleClass::ExplicitLink, |_| {});
        let output = apply_first(&rules, "See <https://example.com>, not <b>.");
        assert_eq!(
            placeholder::unprotect(&output),
            r#"See <a href="https://example.com">https://example.com</a>, not <b>."#
        );
    }

    #[test]
    fn test_explicit_link_flags_and_specifications() {
        let rules = single(RuleClass::ExplicitLink, |settings| {
            settings.flag_name_from_letter.insert('b', "BARE".to_owned());
            settings.attribute_specifications = Some("ignored".to_owned());
        });
        let output = apply_first(&rules, "b<{.ext}mailto:me@example.com>");
        assert_eq!(
            placeholder::unprotect(&output),
            r#"<a href="mailto:me@example.com" class="ext">mailto:me@example.com</a>"#
        );
    }

    #[test]
    fn test_specified_link() {
        let rules = single(RuleClass::SpecifiedLink, |_| {});
        let output = apply_first(&rules, "[Text](/to 'Tip') and [bare]()");
        assert_eq!(
            placeholder::unprotect(&output),
            r#"<a href="/to" title="Tip">Text</a> and <a>bare</a>"#
        );
    }

    #[test]
    fn test_referenced_link() {
        let rules = single(RuleClass::ReferencedLink, |settings| {
            settings.attribute_specifications = Some(String::new());
        });
        let mut table = ReferenceTable::default();
        table.store(
            "docs",
            Reference {
                attribute_specifications: String::new(),
                uri: "/docs".to_owned(),
                title: Some("Docs".to_owned()),
            },
        );
        let references = RefCell::new(table);
        let context = Context {
            rules: &rules,
            references: &references,
            observer: None,
        };

        let output = context
            .apply(RuleId(0), "[Docs] [Read]{#r}[docs] [Untouched][Nonexistent label]", None)
            .unwrap();
        assert_eq!(
            placeholder::unprotect(&output),
            r#"<a href="/docs" title="Docs">Docs</a> <a href="/docs" title="Docs" id="r">Read</a> [Untouched][Nonexistent label]"#
        );
    }
}
