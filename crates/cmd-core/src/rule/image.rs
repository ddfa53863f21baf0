//! Images, either specified inline as `![alt](src "title")` or referenced as
//! `![alt][label]` against a reference definition.

use fancy_regex::Regex;

use super::{
    CompileError, Context, Rule, Settings, extend_specifications, group, matched_title, matched_uri,
    optional_group, prohibited_fragment, protected_specification, whole_match,
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
pub(super) struct SpecifiedImage {
    regex: Regex,
    attribute_specifications: Option<String>,
}

impl SpecifiedImage {
    pub(super) fn compile(settings: Settings) -> Result<Self, CompileError> {
        let prohibited = prohibited_fragment(settings.prohibited_content);
        let source = format!(
            r"[!]{}{}\((?: [\s]* {} )?(?: [\s]* {} )?[\s]* \)",
            bracketed(prohibited.as_deref(), "alt_text"),
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
                protected_specification("alt", Some(group(captures, "alt_text"))),
                protected_specification("src", Some(matched_uri(captures).unwrap_or_default())),
                protected_specification("title", matched_title(captures)),
            ]
            .join(" ");
            let specifications =
                extend_specifications(specifications, self.attribute_specifications.as_deref(), captures);
            Ok(format!("<img{}>", build_attributes_sequence(&specifications, true)))
        })
    }
}

#[derive(Debug)]
pub(super) struct ReferencedImage {
    regex: Regex,
    attribute_specifications: Option<String>,
}

impl ReferencedImage {
    pub(super) fn compile(settings: Settings) -> Result<Self, CompileError> {
        let prohibited = prohibited_fragment(settings.prohibited_content);
        let source = format!(
            r"[!]{}{}(?: {} )?",
            bracketed(prohibited.as_deref(), "alt_text"),
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
            let alt = group(captures, "alt_text");
            let label = optional_group(captures, "label")
                .filter(|label| !label.is_empty())
                .unwrap_or(alt);

            let references = context.references.borrow();
            let Ok(reference) = references.load(label) else {
                return Ok(whole_match(captures).to_owned());
            };

            let specifications = [
                protected_specification("alt", Some(alt)),
                protected_specification("src", Some(reference.uri.as_str())),
                protected_specification("title", reference.title.as_deref()),
                reference.attribute_specifications.clone(),
            ]
            .join(" ");
            let specifications =
                extend_specifications(specifications, self.attribute_specifications.as_deref(), captures);
            Ok(format!("<img{}>", build_attributes_sequence(&specifications, true)))
        })
    }
}
