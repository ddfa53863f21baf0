//! Replacement rules.
//!
//! Rules live in an arena owned by [`crate::RuleEngine`] and refer to each
//! other by [`RuleId`]. A rule is created staged when its class declaration is
//! read, mutated while its attributes are staged, then committed once, which
//! compiles its pattern. Only committed rules can be applied.

mod definition;
mod dictionary;
mod fence;
mod heading;
mod image;
mod inline;
mod link;
mod partitioning;

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};

use fancy_regex::Captures;
use indexmap::IndexMap;
use tracing::info;

use crate::attributes::build_attributes_sequence;
use crate::error::{ApplyError, LegislateErrorKind};
use crate::idioms;
use crate::pattern::PatternError;
use crate::placeholder;
use crate::reference::ReferenceTable;
use crate::utilities::de_indent;

use self::definition::ReferenceDefinition;
use self::dictionary::{OrdinaryDictionary, RegexDictionary};
use self::fence::Fence;
use self::heading::Heading;
use self::image::{ReferencedImage, SpecifiedImage};
use self::inline::InlineAssortedDelimiters;
use self::link::{ExplicitLink, ReferencedLink, SpecifiedLink};
use self::partitioning::Partitioning;

/// Index of a rule in its engine's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleId(pub(crate) usize);

/// Replacement rule classes available in the rule language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleClass {
    ReplacementSequence,
    PlaceholderMarker,
    PlaceholderProtection,
    PlaceholderUnprotection,
    DeIndentation,
    OrdinaryDictionary,
    RegexDictionary,
    FixedDelimiters,
    ExtensibleFence,
    Partitioning,
    InlineAssortedDelimiters,
    Heading,
    ReferenceDefinition,
    SpecifiedImage,
    ReferencedImage,
    ExplicitLink,
    SpecifiedLink,
    ReferencedLink,
}

impl RuleClass {
    const ALL: [Self; 18] = [
        Self::ReplacementSequence,
        Self::PlaceholderMarker,
        Self::PlaceholderProtection,
        Self::PlaceholderUnprotection,
        Self::DeIndentation,
        Self::OrdinaryDictionary,
        Self::RegexDictionary,
        Self::FixedDelimiters,
        Self::ExtensibleFence,
        Self::Partitioning,
        Self::InlineAssortedDelimiters,
        Self::Heading,
        Self::ReferenceDefinition,
        Self::SpecifiedImage,
        Self::ReferencedImage,
        Self::ExplicitLink,
        Self::SpecifiedLink,
        Self::ReferencedLink,
    ];

    /// Look up a class by the name used in class declarations.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|class| class.name() == name)
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::ReplacementSequence => "ReplacementSequence",
            Self::PlaceholderMarker => "PlaceholderMarkerReplacement",
            Self::PlaceholderProtection => "PlaceholderProtectionReplacement",
            Self::PlaceholderUnprotection => "PlaceholderUnprotectionReplacement",
            Self::DeIndentation => "DeIndentationReplacement",
            Self::OrdinaryDictionary => "OrdinaryDictionaryReplacement",
            Self::RegexDictionary => "RegexDictionaryReplacement",
            Self::FixedDelimiters => "FixedDelimitersReplacement",
            Self::ExtensibleFence => "ExtensibleFenceReplacement",
            Self::Partitioning => "PartitioningReplacement",
            Self::InlineAssortedDelimiters => "InlineAssortedDelimitersReplacement",
            Self::Heading => "HeadingReplacement",
            Self::ReferenceDefinition => "ReferenceDefinitionReplacement",
            Self::SpecifiedImage => "SpecifiedImageReplacement",
            Self::ReferencedImage => "ReferencedImageReplacement",
            Self::ExplicitLink => "ExplicitLinkReplacement",
            Self::SpecifiedLink => "SpecifiedLinkReplacement",
            Self::ReferencedLink => "ReferencedLinkReplacement",
        }
    }

    /// Attributes a declaration of this class may set.
    #[must_use]
    pub fn attribute_names(self) -> &'static [&'static str] {
        match self {
            Self::ReplacementSequence => &["queue_position", "replacements"],
            Self::PlaceholderMarker | Self::PlaceholderProtection | Self::PlaceholderUnprotection => {
                &["queue_position"]
            }
            Self::DeIndentation => &["queue_position", "positive_flag", "negative_flag"],
            Self::OrdinaryDictionary => &[
                "queue_position",
                "positive_flag",
                "negative_flag",
                "apply_mode",
                "concluding_replacements",
            ],
            Self::RegexDictionary => &[
                "queue_position",
                "positive_flag",
                "negative_flag",
                "concluding_replacements",
            ],
            Self::FixedDelimiters => &[
                "queue_position",
                "syntax_type",
                "allowed_flags",
                "opening_delimiter",
                "attribute_specifications",
                "prohibited_content",
                "content_replacements",
                "closing_delimiter",
                "tag_name",
                "concluding_replacements",
            ],
            Self::ExtensibleFence => &[
                "queue_position",
                "syntax_type",
                "allowed_flags",
                "prologue_delimiter",
                "extensible_delimiter",
                "attribute_specifications",
                "prohibited_content",
                "content_replacements",
                "epilogue_delimiter",
                "tag_name",
                "concluding_replacements",
            ],
            Self::Partitioning => &[
                "queue_position",
                "starting_pattern",
                "attribute_specifications",
                "content_replacements",
                "ending_pattern",
                "tag_name",
                "concluding_replacements",
            ],
            Self::InlineAssortedDelimiters => &[
                "queue_position",
                "delimiter_conversion",
                "attribute_specifications",
                "prohibited_content",
            ],
            Self::Heading | Self::ReferenceDefinition => &["queue_position", "attribute_specifications"],
            Self::SpecifiedImage | Self::ReferencedImage | Self::SpecifiedLink | Self::ReferencedLink => {
                &["queue_position", "attribute_specifications", "prohibited_content"]
            }
            Self::ExplicitLink => &[
                "queue_position",
                "allowed_flags",
                "attribute_specifications",
                "content_replacements",
                "concluding_replacements",
            ],
        }
    }

    /// Whether `* pattern --> substitute` declarations are accepted.
    #[must_use]
    pub fn allows_substitutions(self) -> bool {
        matches!(self, Self::OrdinaryDictionary | Self::RegexDictionary)
    }
}

/// Where a committed rule is inserted into the execution queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuePosition {
    Root,
    Before(RuleId),
    After(RuleId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxType {
    Block,
    Inline,
}

impl SyntaxType {
    pub(crate) fn is_block(self) -> bool {
        self == Self::Block
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ApplyMode {
    #[default]
    Simultaneous,
    Sequential,
}

/// Content a match may not run into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProhibitedContent {
    /// Any HTML block tag.
    Blocks,
    /// HTML block tags at the start of a line.
    AnchoredBlocks,
}

impl ProhibitedContent {
    pub(crate) fn fragment(self) -> String {
        idioms::block_tag(self == Self::AnchoredBlocks)
    }
}

fn prohibited_fragment(prohibited_content: Option<ProhibitedContent>) -> Option<String> {
    prohibited_content.map(ProhibitedContent::fragment)
}

/// Attribute values of a rule that has not been committed yet.
#[derive(Debug, Default)]
pub(crate) struct Settings {
    pub(crate) syntax_type: Option<SyntaxType>,
    pub(crate) flag_name_from_letter: IndexMap<char, String>,
    pub(crate) attribute_specifications: Option<String>,
    pub(crate) prohibited_content: Option<ProhibitedContent>,
    pub(crate) content_replacements: Vec<RuleId>,
    pub(crate) concluding_replacements: Vec<RuleId>,
    pub(crate) replacements: Vec<RuleId>,
    pub(crate) tag_name: Option<String>,
    pub(crate) opening_delimiter: Option<String>,
    pub(crate) closing_delimiter: Option<String>,
    pub(crate) prologue_delimiter: Option<String>,
    pub(crate) epilogue_delimiter: Option<String>,
    pub(crate) extensible_delimiter: Option<(char, usize)>,
    pub(crate) starting_pattern: Option<String>,
    pub(crate) ending_pattern: Option<String>,
    pub(crate) tag_name_from_delimiter: BTreeMap<char, BTreeMap<usize, String>>,
    pub(crate) apply_mode: ApplyMode,
    pub(crate) substitutions: IndexMap<String, String>,
}

/// Failure to commit a rule.
#[derive(Debug)]
pub(crate) enum CompileError {
    MissingAttribute(&'static str),
    Pattern(PatternError),
}

impl From<PatternError> for CompileError {
    fn from(err: PatternError) -> Self {
        Self::Pattern(err)
    }
}

pub(crate) fn required<T>(value: Option<T>, attribute: &'static str) -> Result<T, CompileError> {
    value.ok_or(CompileError::MissingAttribute(attribute))
}

#[derive(Debug)]
enum CompiledRule {
    Sequence(Vec<RuleId>),
    PlaceholderMarker,
    PlaceholderProtection,
    PlaceholderUnprotection,
    DeIndentation,
    OrdinaryDictionary(OrdinaryDictionary),
    RegexDictionary(RegexDictionary),
    Fence(Fence),
    Partitioning(Partitioning),
    InlineAssortedDelimiters(InlineAssortedDelimiters),
    Heading(Heading),
    ReferenceDefinition(ReferenceDefinition),
    SpecifiedImage(SpecifiedImage),
    ReferencedImage(ReferencedImage),
    ExplicitLink(ExplicitLink),
    SpecifiedLink(SpecifiedLink),
    ReferencedLink(ReferencedLink),
}

impl CompiledRule {
    fn compile(class: RuleClass, settings: Settings) -> Result<Self, CompileError> {
        Ok(match class {
            RuleClass::ReplacementSequence => Self::Sequence(settings.replacements),
            RuleClass::PlaceholderMarker => Self::PlaceholderMarker,
            RuleClass::PlaceholderProtection => Self::PlaceholderProtection,
            RuleClass::PlaceholderUnprotection => Self::PlaceholderUnprotection,
            RuleClass::DeIndentation => Self::DeIndentation,
            RuleClass::OrdinaryDictionary => Self::OrdinaryDictionary(OrdinaryDictionary::compile(settings)?),
            RuleClass::RegexDictionary => Self::RegexDictionary(RegexDictionary::compile(settings)?),
            RuleClass::FixedDelimiters => Self::Fence(Fence::compile_fixed(settings)?),
            RuleClass::ExtensibleFence => Self::Fence(Fence::compile_extensible(settings)?),
            RuleClass::Partitioning => Self::Partitioning(Partitioning::compile(settings)?),
            RuleClass::InlineAssortedDelimiters => {
                Self::InlineAssortedDelimiters(InlineAssortedDelimiters::compile(settings)?)
            }
            RuleClass::Heading => Self::Heading(Heading::compile(settings)?),
            RuleClass::ReferenceDefinition => Self::ReferenceDefinition(ReferenceDefinition::compile(settings)?),
            RuleClass::SpecifiedImage => Self::SpecifiedImage(SpecifiedImage::compile(settings)?),
            RuleClass::ReferencedImage => Self::ReferencedImage(ReferencedImage::compile(settings)?),
            RuleClass::ExplicitLink => Self::ExplicitLink(ExplicitLink::compile(settings)?),
            RuleClass::SpecifiedLink => Self::SpecifiedLink(SpecifiedLink::compile(settings)?),
            RuleClass::ReferencedLink => Self::ReferencedLink(ReferencedLink::compile(settings)?),
        })
    }

    fn apply(&self, context: &Context<'_>, rule: &Rule, text: &str) -> Result<String, ApplyError> {
        match self {
            Self::Sequence(replacements) => context.apply_each(replacements, text.to_owned(), None),
            Self::PlaceholderMarker => Ok(placeholder::replace_marker_occurrences(text)),
            Self::PlaceholderProtection => Ok(placeholder::protect(text)),
            Self::PlaceholderUnprotection => Ok(placeholder::unprotect(text)),
            Self::DeIndentation => Ok(de_indent(text)),
            Self::OrdinaryDictionary(compiled) => compiled.apply(context, rule, text),
            Self::RegexDictionary(compiled) => compiled.apply(context, rule, text),
            Self::Fence(compiled) => compiled.apply(context, rule, text),
            Self::Partitioning(compiled) => compiled.apply(context, rule, text),
            Self::InlineAssortedDelimiters(compiled) => compiled.apply(context, rule, text),
            Self::Heading(compiled) => compiled.apply(rule, text),
            Self::ReferenceDefinition(compiled) => compiled.apply(context, rule, text),
            Self::SpecifiedImage(compiled) => compiled.apply(rule, text),
            Self::ReferencedImage(compiled) => compiled.apply(context, rule, text),
            Self::ExplicitLink(compiled) => compiled.apply(context, rule, text),
            Self::SpecifiedLink(compiled) => compiled.apply(rule, text),
            Self::ReferencedLink(compiled) => compiled.apply(context, rule, text),
        }
    }
}

#[derive(Debug)]
enum RuleState {
    Staged(Box<Settings>),
    Committed(Box<CompiledRule>),
}

/// A replacement rule: its identity and queue metadata plus its staged or
/// committed body.
#[derive(Debug)]
pub struct Rule {
    index: RuleId,
    id: String,
    class: RuleClass,
    queue_position: Option<QueuePosition>,
    positive_flag: Option<String>,
    negative_flag: Option<String>,
    state: RuleState,
}

impl Rule {
    pub(crate) fn new(index: RuleId, id: &str, class: RuleClass) -> Self {
        Self {
            index,
            id: id.to_owned(),
            class,
            queue_position: None,
            positive_flag: None,
            negative_flag: None,
            state: RuleState::Staged(Box::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn class(&self) -> RuleClass {
        self.class
    }

    pub fn queue_position(&self) -> Option<QueuePosition> {
        self.queue_position
    }

    pub fn is_committed(&self) -> bool {
        matches!(self.state, RuleState::Committed(_))
    }

    pub(crate) fn index(&self) -> RuleId {
        self.index
    }

    fn assert_staged(&self, what: &str) {
        assert!(
            !self.is_committed(),
            "cannot set `{what}` of `#{}` after commit",
            self.id
        );
    }

    pub(crate) fn set_queue_position(&mut self, queue_position: QueuePosition) {
        self.assert_staged("queue_position");
        self.queue_position = Some(queue_position);
    }

    pub(crate) fn set_positive_flag(&mut self, flag: String) {
        self.assert_staged("positive_flag");
        self.positive_flag = Some(flag);
    }

    pub(crate) fn set_negative_flag(&mut self, flag: String) {
        self.assert_staged("negative_flag");
        self.negative_flag = Some(flag);
    }

    /// Staged attribute values.
    ///
    /// # Panics
    ///
    /// Panics if the rule has been committed.
    pub(crate) fn settings_mut(&mut self) -> &mut Settings {
        match &mut self.state {
            RuleState::Staged(settings) => settings,
            RuleState::Committed(_) => panic!("cannot mutate `#{}` after commit", self.id),
        }
    }

    /// Validate mandatory attributes and compile the rule.
    pub(crate) fn commit(&mut self) -> Result<(), LegislateErrorKind> {
        let settings = std::mem::take(self.settings_mut());
        let compiled = CompiledRule::compile(self.class, settings).map_err(|err| match err {
            CompileError::MissingAttribute(attribute) => LegislateErrorKind::MissingAttribute {
                attribute,
                class: self.class.name(),
            },
            CompileError::Pattern(source) => LegislateErrorKind::UncompilableRule {
                id: self.id.clone(),
                source,
            },
        })?;
        self.state = RuleState::Committed(Box::new(compiled));
        Ok(())
    }

    /// Apply the rule to `text`.
    ///
    /// When `enabled_flags` is given, a positive flag missing from it or a
    /// negative flag present in it turns the rule into a no-op.
    ///
    /// # Panics
    ///
    /// Panics if the rule has not been committed.
    pub(crate) fn apply(
        &self,
        context: &Context<'_>,
        text: &str,
        enabled_flags: Option<&HashSet<String>>,
    ) -> Result<String, ApplyError> {
        let RuleState::Committed(compiled) = &self.state else {
            panic!("cannot apply `#{}` before commit", self.id);
        };

        if let Some(enabled_flags) = enabled_flags {
            let positive_missing = self
                .positive_flag
                .as_ref()
                .is_some_and(|flag| !enabled_flags.contains(flag));
            let negative_present = self
                .negative_flag
                .as_ref()
                .is_some_and(|flag| enabled_flags.contains(flag));
            if positive_missing || negative_present {
                return Ok(text.to_owned());
            }
        }

        let after = compiled.apply(context, self, text)?;
        if let Some(observer) = context.observer {
            observer.observe(&self.id, text, &after);
        }
        Ok(after)
    }
}

/// Receives every rule application, in order.
pub trait ApplyObserver {
    fn observe(&self, rule_id: &str, before: &str, after: &str);
}

/// Logs each application as a before/after block at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

const DIVIDER_LENGTH: usize = 48;

impl ApplyObserver for TracingObserver {
    fn observe(&self, rule_id: &str, before: &str, after: &str) {
        let no_change = if before == after { " (no change)" } else { "" };
        info!(
            "{} BEFORE #{rule_id}\n{before}\n{}{no_change}\n{after}\n{} AFTER #{rule_id}\n",
            "<".repeat(DIVIDER_LENGTH),
            "=".repeat(DIVIDER_LENGTH),
            ">".repeat(DIVIDER_LENGTH),
        );
    }
}

/// What an applying rule can reach: the other rules, the reference table and
/// the observer.
pub(crate) struct Context<'a> {
    pub(crate) rules: &'a [Rule],
    pub(crate) references: &'a RefCell<ReferenceTable>,
    pub(crate) observer: Option<&'a dyn ApplyObserver>,
}

impl Context<'_> {
    pub(crate) fn apply(
        &self,
        id: RuleId,
        text: &str,
        enabled_flags: Option<&HashSet<String>>,
    ) -> Result<String, ApplyError> {
        self.rules[id.0].apply(self, text, enabled_flags)
    }

    pub(crate) fn apply_each(
        &self,
        ids: &[RuleId],
        text: String,
        enabled_flags: Option<&HashSet<String>>,
    ) -> Result<String, ApplyError> {
        ids.iter()
            .try_fold(text, |text, &id| self.apply(id, &text, enabled_flags))
    }
}

/// Text of a named group, empty when it did not participate.
pub(crate) fn group<'t>(captures: &Captures<'t>, name: &str) -> &'t str {
    captures.name(name).map_or("", |m| m.as_str())
}

pub(crate) fn optional_group<'t>(captures: &Captures<'t>, name: &str) -> Option<&'t str> {
    captures.name(name).map(|m| m.as_str())
}

pub(crate) fn whole_match<'t>(captures: &Captures<'t>) -> &'t str {
    captures.get(0).map_or("", |m| m.as_str())
}

/// Flag names whose letters appear in the `flags` group.
pub(crate) fn enabled_flags(captures: &Captures<'_>, flag_name_from_letter: &IndexMap<char, String>) -> HashSet<String> {
    let letters = group(captures, "flags");
    flag_name_from_letter
        .iter()
        .filter(|(letter, _)| letters.contains(**letter))
        .map(|(_, name)| name.clone())
        .collect()
}

/// Attribute sequence from a rule's own specifications and the matched ones.
pub(crate) fn attributes_sequence(attribute_specifications: Option<&str>, captures: &Captures<'_>) -> String {
    attribute_specifications.map_or_else(String::new, |specifications| {
        let matched = group(captures, "attribute_specifications");
        build_attributes_sequence(&format!("{specifications} {matched}"), true)
    })
}

/// Append the rule's and the matched attribute specifications, if the rule has any.
pub(crate) fn extend_specifications(
    specifications: String,
    attribute_specifications: Option<&str>,
    captures: &Captures<'_>,
) -> String {
    match attribute_specifications {
        Some(own) => format!(
            "{specifications} {own} {}",
            group(captures, "attribute_specifications")
        ),
        None => specifications,
    }
}

/// Matched URI of an angle-bracketed or bare URI fragment.
pub(crate) fn matched_uri<'t>(captures: &Captures<'t>) -> Option<&'t str> {
    optional_group(captures, "angle_bracketed_uri").or_else(|| optional_group(captures, "bare_uri"))
}

pub(crate) fn matched_title<'t>(captures: &Captures<'t>) -> Option<&'t str> {
    optional_group(captures, "double_quoted_title").or_else(|| optional_group(captures, "single_quoted_title"))
}

/// `name=«protected value»` specification, or nothing without a value.
pub(crate) fn protected_specification(name: &str, value: Option<&str>) -> String {
    value.map_or_else(String::new, |value| format!("{name}={}", placeholder::protect(value)))
}
