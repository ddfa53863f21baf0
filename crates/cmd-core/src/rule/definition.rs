//! Reference definitions, `[label]: uri "title"`, consumed into the
//! reference table for referenced images and links.

use fancy_regex::Regex;

use super::{CompileError, Context, Rule, Settings, group, matched_title, matched_uri};
use crate::error::ApplyError;
use crate::idioms;
use crate::pattern;
use crate::reference::Reference;

#[derive(Debug)]
pub(super) struct ReferenceDefinition {
    regex: Regex,
    attribute_specifications: Option<String>,
}

impl ReferenceDefinition {
    pub(super) fn compile(settings: Settings) -> Result<Self, CompileError> {
        let hanging = idioms::MAYBE_HANGING_WHITESPACE;
        let source = format!(
            r"{}\[ [\s]* (?P<label> [^\]]*? ) [\s]* \]{}[:]{hanging}{}(?: {hanging}{} )?[^\S\n]* $",
            idioms::block_anchoring(true, true),
            idioms::attribute_specifications(settings.attribute_specifications.as_deref(), false, true, true),
            idioms::uri(true),
            idioms::TITLE,
        );
        Ok(Self {
            regex: pattern::compile(&source, true)?,
            attribute_specifications: settings.attribute_specifications,
        })
    }

    pub(super) fn apply(&self, context: &Context<'_>, rule: &Rule, text: &str) -> Result<String, ApplyError> {
        pattern::replace_all(&self.regex, text, rule.id(), |captures| {
            let attribute_specifications = self
                .attribute_specifications
                .as_ref()
                .map_or_else(String::new, |own| {
                    format!("{own} {}", group(captures, "attribute_specifications"))
                });
            let reference = Reference {
                attribute_specifications,
                uri: matched_uri(captures).unwrap_or_default().to_owned(),
                title: matched_title(captures).map(str::to_owned),
            };
            context
                .references
                .borrow_mut()
                .store(group(captures, "label"), reference);
            Ok(String::new())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::super::tests::single;
    use super::super::{Context, RuleClass, RuleId};
    use crate::reference::ReferenceTable;
    use pretty_assertions::assert_eq;

    fn define(text: &str, attribute_specifications: Option<&str>) -> (String, ReferenceTable) {
        let rules = single(RuleClass::ReferenceDefinition, |settings| {
            settings.attribute_specifications = attribute_specifications.map(str::to_owned);
        });
        let references = RefCell::new(ReferenceTable::default());
        let context = Context {
            rules: &rules,
            references: &references,
            observer: None,
        };
        let output = context.apply(RuleId(0), text, None).unwrap();
        (output, references.into_inner())
    }

    #[test]
    fn test_definition_is_consumed() {
        let (output, references) = define("[Home]: https://example.com \"Front page\"\nafter", None);
        assert_eq!(output, "\nafter");
        let reference = references.load("home").unwrap();
        assert_eq!(reference.uri, "https://example.com");
        assert_eq!(reference.title.as_deref(), Some("Front page"));
        assert_eq!(reference.attribute_specifications, "");
    }

    #[test]
    fn test_angle_bracketed_uri_and_hanging_title() {
        let (output, references) = define("  [a]: <with space>\n    'Title'", None);
        assert_eq!(output, "");
        let reference = references.load("A").unwrap();
        assert_eq!(reference.uri, "with space");
        assert_eq!(reference.title.as_deref(), Some("Title"));
    }

    #[test]
    fn test_definition_attribute_specifications() {
        let (_, references) = define("[x]{.wide}: /x", Some("data-a=1"));
        assert_eq!(references.load("x").unwrap().attribute_specifications, "data-a=1 .wide");
    }

    #[test]
    fn test_mid_line_text_is_not_a_definition() {
        let (output, _) = define("see [x]: /x", None);
        assert_eq!(output, "see [x]: /x");
    }
}
