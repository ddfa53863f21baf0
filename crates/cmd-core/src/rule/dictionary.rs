use fancy_regex::Regex;
use indexmap::IndexMap;

use super::{ApplyMode, CompileError, Context, Rule, RuleId, Settings, whole_match};
use crate::error::ApplyError;
use crate::pattern::{self, Template};

/// Literal pattern to substitute replacements.
#[derive(Debug)]
pub(super) struct OrdinaryDictionary {
    substitutions: IndexMap<String, String>,
    /// Alternation of every pattern, absent when there are none.
    regex: Option<Regex>,
    apply_mode: ApplyMode,
    concluding_replacements: Vec<RuleId>,
}

impl OrdinaryDictionary {
    pub(super) fn compile(settings: Settings) -> Result<Self, CompileError> {
        let regex = if settings.apply_mode == ApplyMode::Simultaneous && !settings.substitutions.is_empty() {
            let alternation = settings
                .substitutions
                .keys()
                .map(|pattern| pattern::escape(pattern))
                .collect::<Vec<_>>()
                .join("|");
            Some(pattern::compile(&alternation, false)?)
        } else {
            None
        };
        Ok(Self {
            substitutions: settings.substitutions,
            regex,
            apply_mode: settings.apply_mode,
            concluding_replacements: settings.concluding_replacements,
        })
    }

    pub(super) fn apply(&self, context: &Context<'_>, rule: &Rule, text: &str) -> Result<String, ApplyError> {
        match self.apply_mode {
            ApplyMode::Simultaneous => {
                let Some(regex) = &self.regex else {
                    return Ok(text.to_owned());
                };
                pattern::replace_all(regex, text, rule.id(), |captures| {
                    let matched = whole_match(captures);
                    let substitute = self.substitutions.get(matched).map_or(matched, String::as_str);
                    context.apply_each(&self.concluding_replacements, substitute.to_owned(), None)
                })
            }
            ApplyMode::Sequential => {
                let replaced = self
                    .substitutions
                    .iter()
                    .fold(text.to_owned(), |text, (pattern, substitute)| {
                        text.replace(pattern.as_str(), substitute)
                    });
                context.apply_each(&self.concluding_replacements, replaced, None)
            }
        }
    }
}

/// Regex pattern to substitute template replacements, applied in order.
#[derive(Debug)]
pub(super) struct RegexDictionary {
    substitutions: Vec<(Regex, Template)>,
    concluding_replacements: Vec<RuleId>,
}

impl RegexDictionary {
    pub(super) fn compile(settings: Settings) -> Result<Self, CompileError> {
        let substitutions = settings
            .substitutions
            .iter()
            .map(|(pattern, substitute)| -> Result<_, CompileError> {
                let regex = pattern::compile(pattern, true)?;
                let template = Template::parse(substitute, &regex)?;
                Ok((regex, template))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            substitutions,
            concluding_replacements: settings.concluding_replacements,
        })
    }

    pub(super) fn apply(&self, context: &Context<'_>, rule: &Rule, text: &str) -> Result<String, ApplyError> {
        self.substitutions
            .iter()
            .try_fold(text.to_owned(), |text, (regex, template)| {
                pattern::replace_all(regex, &text, rule.id(), |captures| {
                    context.apply_each(&self.concluding_replacements, template.expand(captures), None)
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::super::RuleClass;
    use super::super::tests::{apply_first, single};
    use super::*;
    use pretty_assertions::assert_eq;

    fn substitutions(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(pattern, substitute)| ((*pattern).to_owned(), (*substitute).to_owned()))
            .collect()
    }

    #[test]
    fn test_simultaneous_does_not_chain() {
        let rules = single(RuleClass::OrdinaryDictionary, |settings| {
            settings.substitutions = substitutions(&[("a", "b"), ("b", "c")]);
        });
        assert_eq!(apply_first(&rules, "ab"), "bc");
    }

    #[test]
    fn test_sequential_chains() {
        let rules = single(RuleClass::OrdinaryDictionary, |settings| {
            settings.apply_mode = ApplyMode::Sequential;
            settings.substitutions = substitutions(&[("a", "b"), ("b", "c")]);
        });
        assert_eq!(apply_first(&rules, "ab"), "cc");
    }

    #[test]
    fn test_patterns_are_literal() {
        let rules = single(RuleClass::OrdinaryDictionary, |settings| {
            settings.substitutions = substitutions(&[("&", "&amp;"), ("<", "&lt;"), (".*", "dot")]);
        });
        assert_eq!(apply_first(&rules, "<a & .*>"), "&lt;a &amp; dot>");
    }

    #[test]
    fn test_empty_dictionary_is_identity() {
        let rules = single(RuleClass::OrdinaryDictionary, |_| {});
        assert_eq!(apply_first(&rules, "unchanged"), "unchanged");
    }

    #[test]
    fn test_regex_dictionary_groups() {
        let rules = single(RuleClass::RegexDictionary, |settings| {
            settings.substitutions = substitutions(&[(r"^ (?P<word> [a-z]+ ) $", r"[\g<word>]"), (r"\[", "<")]);
        });
        assert_eq!(apply_first(&rules, "one\ntwo 2"), "<one]\ntwo 2");
    }

    #[test]
    fn test_regex_dictionary_rejects_unknown_group() {
        let mut rule = Rule::new(RuleId(0), "bad", RuleClass::RegexDictionary);
        rule.settings_mut().substitutions = substitutions(&[("a", r"\g<missing>")]);
        assert!(rule.commit().is_err());
    }
}
