//! Staging of attribute values and substitutions onto the active rule.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;

use super::RuleEngine;
use super::substitution::{self, SubstituteKind};
use crate::error::LegislateErrorKind;
use crate::pattern::{self, Template};
use crate::rule::{ApplyMode, ProhibitedContent, QueuePosition, Rule, RuleClass, RuleId, SyntaxType};
use crate::utilities::{is_whitespace, trim};

static FLAG_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\A[A-Z_]+\z").unwrap());

static TAG_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\A[a-z0-9]+\z").unwrap());

static ALLOWED_FLAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A(?P<letter>[a-z])=(?P<name>[A-Z_]+)\z").unwrap());

static REPLACEMENT_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\A#(?P<id>[a-z0-9.-]+)\z").unwrap());

static QUEUE_REFERENCE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A(?P<position>BEFORE|AFTER) #(?P<id>[a-z.-]+)\z").unwrap());

fn invalid_value(value: &str, attribute: &'static str) -> LegislateErrorKind {
    LegislateErrorKind::InvalidValue {
        value: value.to_owned(),
        attribute,
    }
}

fn invalid_specification(specification: &str, attribute: &'static str) -> LegislateErrorKind {
    LegislateErrorKind::InvalidSpecification {
        specification: specification.to_owned(),
        attribute,
    }
}

/// Trimmed value, which must not be empty.
fn non_empty<'v>(value: &'v str, attribute: &'static str) -> Result<&'v str, LegislateErrorKind> {
    let trimmed = trim(value);
    if trimmed.is_empty() {
        return Err(invalid_value("", attribute));
    }
    Ok(trimmed)
}

/// Tokens of a whitespace-separated list, `None` for the `NONE` keyword.
fn tokens<'v>(
    value: &'v str,
    attribute: &'static str,
    allow_none: bool,
) -> Result<Option<Vec<&'v str>>, LegislateErrorKind> {
    let trimmed = trim(value);
    if trimmed.is_empty() {
        return Err(invalid_specification("", attribute));
    }
    if allow_none && trimmed == "NONE" {
        return Ok(None);
    }
    Ok(Some(trimmed.split(is_whitespace).filter(|token| !token.is_empty()).collect()))
}

/// Flag letter and name from a `letter=NAME` token.
fn allowed_flag(token: &str) -> Option<(char, String)> {
    let captures = ALLOWED_FLAG_REGEX.captures(token)?;
    let letter = captures.name("letter")?.as_str().chars().next()?;
    Some((letter, captures.name("name")?.as_str().to_owned()))
}

/// Delimiter character, delimiter length and tag name from a `c=tag` or
/// `cc=tag` token.
fn delimiter_conversion(token: &str) -> Option<(char, usize, String)> {
    let characters: Vec<char> = token.chars().collect();
    let first = *characters.first()?;
    let (length, tag_start) = if characters.len() > 2 && characters[1] == first && characters[2] == '=' {
        (2, 3)
    } else if characters.get(1) == Some(&'=') {
        (1, 2)
    } else {
        return None;
    };
    let tag_name: String = characters[tag_start..].iter().collect();
    TAG_NAME_REGEX
        .is_match(&tag_name)
        .then_some((first, length, tag_name))
}

fn compile_checked(pattern: &str, attribute: &'static str) -> Result<(), LegislateErrorKind> {
    let regex = pattern::compile(pattern, true).map_err(|source| LegislateErrorKind::BadPattern {
        pattern: pattern.to_owned(),
        source,
    })?;
    if regex.capture_names().flatten().next().is_some() {
        return Err(LegislateErrorKind::NamedCaptureGroups(attribute));
    }
    Ok(())
}

impl RuleEngine {
    /// Stage `value` as attribute `name` of the active rule.
    pub(super) fn stage_attribute(&mut self, active: RuleId, name: &'static str, value: &str) -> Result<(), LegislateErrorKind> {
        match name {
            "queue_position" => self.stage_queue_position(active, value),
            "positive_flag" | "negative_flag" => {
                if trim(value) == "NONE" {
                    return Ok(());
                }
                let flag = non_empty(value, name)?;
                if !FLAG_NAME_REGEX.is_match(flag) {
                    return Err(invalid_value(flag, name));
                }
                let rule = &mut self.rules[active.0];
                if name == "positive_flag" {
                    rule.set_positive_flag(flag.to_owned());
                } else {
                    rule.set_negative_flag(flag.to_owned());
                }
                Ok(())
            }
            "replacements" | "content_replacements" | "concluding_replacements" => {
                let Some(ids) = self.stage_replacement_ids(active, value, name)? else {
                    return Ok(());
                };
                let settings = self.rules[active.0].settings_mut();
                match name {
                    "replacements" => settings.replacements = ids,
                    "content_replacements" => settings.content_replacements = ids,
                    _ => settings.concluding_replacements = ids,
                }
                Ok(())
            }
            _ => stage_setting(&mut self.rules[active.0], name, value),
        }
    }

    fn stage_queue_position(&mut self, active: RuleId, value: &str) -> Result<(), LegislateErrorKind> {
        let trimmed = trim(value);
        if trimmed == "NONE" {
            return Ok(());
        }
        if trimmed == "ROOT" {
            if let Some(root_id) = &self.root_id {
                return Err(LegislateErrorKind::DuplicateRoot(root_id.clone()));
            }
            self.rules[active.0].set_queue_position(QueuePosition::Root);
            return Ok(());
        }

        let Some(captures) = QUEUE_REFERENCE_REGEX.captures(trimmed) else {
            return Err(invalid_value(trimmed, "queue_position"));
        };
        let reference_id = captures.name("id").map_or("", |m| m.as_str());
        if reference_id == self.rules[active.0].id() {
            return Err(LegislateErrorKind::SelfReferentialQueuePosition);
        }
        let reference = *self
            .rule_from_id
            .get(reference_id)
            .ok_or_else(|| LegislateErrorKind::UndefinedReplacement(reference_id.to_owned()))?;
        if !self.queue.contains(&reference) {
            return Err(LegislateErrorKind::NotInQueue(reference_id.to_owned()));
        }

        let position = if captures.name("position").is_some_and(|m| m.as_str() == "BEFORE") {
            QueuePosition::Before(reference)
        } else {
            QueuePosition::After(reference)
        };
        self.rules[active.0].set_queue_position(position);
        Ok(())
    }

    /// Rules named by a `#id` list; a rule may name itself.
    fn stage_replacement_ids(
        &self,
        active: RuleId,
        value: &str,
        attribute: &'static str,
    ) -> Result<Option<Vec<RuleId>>, LegislateErrorKind> {
        let Some(tokens) = tokens(value, attribute, true)? else {
            return Ok(None);
        };
        let active_id = self.rules[active.0].id();
        tokens
            .into_iter()
            .map(|token| {
                let id = REPLACEMENT_ID_REGEX
                    .captures(token)
                    .and_then(|captures| captures.name("id"))
                    .ok_or_else(|| invalid_specification(token, attribute))?
                    .as_str();
                if id == active_id {
                    return Ok(active);
                }
                self.rule_from_id
                    .get(id)
                    .copied()
                    .ok_or_else(|| LegislateErrorKind::UndefinedReplacement(id.to_owned()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    /// Stage a `pattern --> substitute` declaration onto the active dictionary.
    pub(super) fn stage_substitution(
        &mut self,
        active: RuleId,
        substitution: &str,
        cmd_name: &str,
    ) -> Result<(), LegislateErrorKind> {
        let rule = &mut self.rules[active.0];
        let class = rule.class();
        if !class.allows_substitutions() {
            return Err(LegislateErrorKind::SubstitutionsNotAllowed(class.name()));
        }

        let settings = rule.settings_mut();
        if class == RuleClass::RegexDictionary {
            let parsed = substitution::parse(substitution, cmd_name, SubstituteKind::RegexTemplate)?;
            let regex = pattern::compile(&parsed.pattern, true).map_err(|source| LegislateErrorKind::BadPattern {
                pattern: parsed.pattern.clone(),
                source,
            })?;
            Template::parse(&parsed.substitute, &regex).map_err(|source| LegislateErrorKind::BadSubstitute {
                substitute: parsed.substitute.clone(),
                pattern: parsed.pattern.clone(),
                source,
            })?;
            settings.substitutions.insert(parsed.pattern, parsed.substitute);
        } else {
            let parsed = substitution::parse(substitution, cmd_name, SubstituteKind::Literal)?;
            settings.substitutions.insert(parsed.pattern, parsed.substitute);
        }
        Ok(())
    }
}

/// Stage an attribute that only touches the rule's own settings.
fn stage_setting(rule: &mut Rule, name: &'static str, value: &str) -> Result<(), LegislateErrorKind> {
    let trimmed = trim(value);
    let class = rule.class().name();
    let settings = rule.settings_mut();
    match name {
        "apply_mode" => {
            settings.apply_mode = match trimmed {
                "SIMULTANEOUS" => ApplyMode::Simultaneous,
                "SEQUENTIAL" => ApplyMode::Sequential,
                _ => return Err(invalid_value(trimmed, name)),
            };
        }
        "attribute_specifications" => match trimmed {
            "" => return Err(invalid_value("", name)),
            "NONE" => {}
            "EMPTY" => settings.attribute_specifications = Some(String::new()),
            _ => settings.attribute_specifications = Some(trimmed.to_owned()),
        },
        "opening_delimiter" => settings.opening_delimiter = Some(non_empty(value, name)?.to_owned()),
        "closing_delimiter" => settings.closing_delimiter = Some(non_empty(value, name)?.to_owned()),
        "prologue_delimiter" | "epilogue_delimiter" => {
            if trimmed == "NONE" {
                return Ok(());
            }
            let delimiter = Some(non_empty(value, name)?.to_owned());
            if name == "prologue_delimiter" {
                settings.prologue_delimiter = delimiter;
            } else {
                settings.epilogue_delimiter = delimiter;
            }
        }
        "starting_pattern" => {
            let pattern = non_empty(value, name)?;
            compile_checked(pattern, name)?;
            settings.starting_pattern = Some(pattern.to_owned());
        }
        "ending_pattern" => {
            if trimmed == "NONE" {
                return Ok(());
            }
            let pattern = non_empty(value, name)?;
            compile_checked(pattern, name)?;
            settings.ending_pattern = Some(pattern.to_owned());
        }
        "extensible_delimiter" => {
            let mut characters = trimmed.chars();
            let repeated = characters
                .next()
                .filter(|&first| characters.all(|character| character == first));
            let Some(character) = repeated else {
                return Err(LegislateErrorKind::InvalidExtensibleDelimiter(trimmed.to_owned()));
            };
            settings.extensible_delimiter = Some((character, trimmed.chars().count()));
        }
        "prohibited_content" => {
            settings.prohibited_content = match trimmed {
                "NONE" => return Ok(()),
                "BLOCKS" => Some(ProhibitedContent::Blocks),
                "ANCHORED_BLOCKS" => Some(ProhibitedContent::AnchoredBlocks),
                _ => return Err(invalid_value(trimmed, name)),
            };
        }
        "syntax_type" => {
            settings.syntax_type = match trimmed {
                "BLOCK" => Some(SyntaxType::Block),
                "INLINE" => Some(SyntaxType::Inline),
                _ => return Err(invalid_value(trimmed, name)),
            };
        }
        "tag_name" => {
            if trimmed == "NONE" {
                return Ok(());
            }
            if !TAG_NAME_REGEX.is_match(trimmed) {
                return Err(invalid_value(trimmed, name));
            }
            settings.tag_name = Some(trimmed.to_owned());
        }
        "allowed_flags" => {
            let Some(tokens) = tokens(value, name, true)? else {
                return Ok(());
            };
            let mut flag_name_from_letter = IndexMap::new();
            for token in tokens {
                let (letter, flag) = allowed_flag(token).ok_or_else(|| invalid_specification(token, name))?;
                flag_name_from_letter.insert(letter, flag);
            }
            settings.flag_name_from_letter = flag_name_from_letter;
        }
        "delimiter_conversion" => {
            let Some(tokens) = tokens(value, name, false)? else {
                return Ok(());
            };
            let mut tag_name_from_delimiter: BTreeMap<char, BTreeMap<usize, String>> = BTreeMap::new();
            for token in tokens {
                let (character, length, tag_name) =
                    delimiter_conversion(token).ok_or_else(|| invalid_specification(token, name))?;
                tag_name_from_delimiter
                    .entry(character)
                    .or_default()
                    .insert(length, tag_name);
            }
            settings.tag_name_from_delimiter = tag_name_from_delimiter;
        }
        _ => {
            return Err(LegislateErrorKind::UnrecognisedAttribute {
                attribute: name.to_owned(),
                class,
            });
        }
    }
    Ok(())
}
