//! ATX-style headings, `#` to `######`, with hanging continuation lines.

use fancy_regex::Regex;

use super::{CompileError, Rule, Settings, attributes_sequence, group};
use crate::error::ApplyError;
use crate::idioms;
use crate::pattern;

#[derive(Debug)]
pub(super) struct Heading {
    regex: Regex,
    attribute_specifications: Option<String>,
}

impl Heading {
    pub(super) fn compile(settings: Settings) -> Result<Self, CompileError> {
        let source = format!(
            r"{}(?P<opening_hashes> [#]{{1,6}} ){}
                (?: [^\S\n]+ (?P<content_starter> [^\n]*? ) )? [^\S\n]*
                (?P<content_continuation> (?: \n (?P=anchoring_whitespace) [^\S\n]+ [^\n]* )* )
                [#]* [^\S\n]* $",
            idioms::block_anchoring(true, true),
            idioms::attribute_specifications(settings.attribute_specifications.as_deref(), false, true, true),
        );
        Ok(Self {
            regex: pattern::compile(&source, true)?,
            attribute_specifications: settings.attribute_specifications,
        })
    }

    pub(super) fn apply(&self, rule: &Rule, text: &str) -> Result<String, ApplyError> {
        pattern::replace_all(&self.regex, text, rule.id(), |captures| {
            let level = group(captures, "opening_hashes").len();
            let attributes_sequence = attributes_sequence(self.attribute_specifications.as_deref(), captures);
            let content_starter = group(captures, "content_starter");
            let content_continuation = group(captures, "content_continuation");
            Ok(format!(
                "<h{level}{attributes_sequence}>{content_starter}{content_continuation}</h{level}>"
            ))
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
    fn test_heading_levels() {
        let rules = single(RuleClass::Heading, |_| {});
        assert_eq!(apply_first(&rules, "# One\n###### Six"), "<h1>One</h1>\n<h6>Six</h6>");
        assert_eq!(apply_first(&rules, "####### Seven"), "####### Seven");
    }

    #[test]
    fn test_closing_hashes_and_empty_heading() {
        let rules = single(RuleClass::Heading, |_| {});
        assert_eq!(apply_first(&rules, "## Title ##  "), "<h2>Title</h2>");
        assert_eq!(apply_first(&rules, "#"), "<h1></h1>");
    }

    #[test]
    fn test_hanging_continuation() {
        let rules = single(RuleClass::Heading, |_| {});
        assert_eq!(
            apply_first(&rules, "  # Long\n    heading\nafter"),
            "<h1>Long\n    heading</h1>\nafter"
        );
    }

    #[test]
    fn test_heading_attribute_specifications() {
        let rules = single(RuleClass::Heading, |settings| {
            settings.attribute_specifications = Some(String::new());
        });
        let output = apply_first(&rules, "##{#top} Top");
        assert_eq!(placeholder::unprotect(&output), "<h2 id=\"top\">Top</h2>");
    }
}
