//! Compiler for the replacement rule language and owner of the rule queue.
//!
//! Rules files are read line by line. A class declaration opens a rule,
//! attribute and substitution declarations (with their continuation lines)
//! stage values onto it, and a blank line, inclusion, new class declaration
//! or end of file commits it into the queue.

mod substitution;
mod syntax;
mod values;

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, info};

use self::syntax::{InclusionBase, Line};
use crate::error::{ApplyError, LegislateError, LegislateErrorKind, LineRange};
use crate::reference::ReferenceTable;
use crate::rule::{ApplyObserver, Context, QueuePosition, Rule, RuleClass, RuleId, TracingObserver};
use crate::utilities::{normalise_path, split_lines};

/// Summary of the line types accepted in rules files.
pub const SYNTAX_HELP: &str = "\
In CMD replacement rule syntax, a line must be one of the following:
(1) whitespace-only;
(2) a comment (beginning with `#`);
(3) a rules inclusion (`< «included_file_name»`);
(4) a class declaration (`«ClassName»: #«id»`);
(5) the start of an attribute declaration (`- «name»: «value»`);
(6) the start of a substitution declaration (`* «pattern» --> «substitute»`);
(7) a continuation (beginning with whitespace).
- Note for (3): if «included_file_name» begins with a slash,
  it is parsed relative to the working directory;
  otherwise it is parsed relative to the current file.
- Note for (6): the number of hyphens in the delimiter `-->`
  may be arbitrarily increased should «pattern» contain
  a run of hyphens followed by a closing angle-bracket.
- Note for (7): continuations are only allowed for attribute declarations
  and for substitution declarations.
";

/// A declaration still accumulating continuation lines.
#[derive(Debug)]
enum Pending {
    Attribute { name: &'static str, value: String },
    Substitution(String),
}

/// Position of the compiler within one rules file.
struct Cursor<'f> {
    file: &'f str,
    cmd_name: &'f str,
    active: Option<RuleId>,
    pending: Option<Pending>,
    range_start: usize,
}

/// Compiles rules into a queue and runs documents through it.
pub struct RuleEngine {
    opened_file_names: Vec<String>,
    rules: Vec<Rule>,
    rule_from_id: HashMap<String, RuleId>,
    root_id: Option<String>,
    queue: Vec<RuleId>,
    references: RefCell<ReferenceTable>,
    observer: Option<Box<dyn ApplyObserver>>,
    verbose: bool,
}

impl RuleEngine {
    /// Create an engine for the document `cmd_file_name`.
    ///
    /// In verbose mode every rule application is logged.
    #[must_use]
    pub fn new(cmd_file_name: &str, verbose: bool) -> Self {
        Self {
            opened_file_names: vec![cmd_file_name.to_owned()],
            rules: Vec::new(),
            rule_from_id: HashMap::new(),
            root_id: None,
            queue: Vec::new(),
            references: RefCell::new(ReferenceTable::default()),
            observer: verbose.then(|| Box::new(TracingObserver) as Box<dyn ApplyObserver>),
            verbose,
        }
    }

    /// Replace the observer notified of every rule application.
    #[must_use]
    pub fn with_observer(mut self, observer: Box<dyn ApplyObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Ids of the queued rules, in execution order.
    #[must_use]
    pub fn queue_ids(&self) -> Vec<&str> {
        self.queue.iter().map(|id| self.rules[id.0].id()).collect()
    }

    /// Look up a committed rule by id.
    #[must_use]
    pub fn rule(&self, id: &str) -> Option<&Rule> {
        self.rule_from_id.get(id).map(|index| &self.rules[index.0])
    }

    /// Compile `rules` read from `rules_file_name` and add them to the queue.
    ///
    /// `cmd_name` is the document name used by the `CMD_NAME` family of
    /// substitute keywords.
    ///
    /// # Errors
    ///
    /// Returns [`LegislateError`] for the first malformed line, bad value or
    /// unreadable inclusion.
    pub fn legislate(&mut self, rules: &str, rules_file_name: &str, cmd_name: &str) -> Result<(), LegislateError> {
        debug!(file = rules_file_name, "Compiling rules");
        let mut cursor = Cursor {
            file: rules_file_name,
            cmd_name,
            active: None,
            pending: None,
            range_start: 0,
        };

        let lines = split_lines(rules);
        for (index, line) in lines.iter().enumerate() {
            self.process_line(&mut cursor, line, index + 1)?;
        }

        let end = lines.len() + 1;
        self.stage_pending(&mut cursor, end)?;
        self.commit_active(&mut cursor, end)
    }

    fn process_line(&mut self, cursor: &mut Cursor<'_>, line: &str, line_number: usize) -> Result<(), LegislateError> {
        let file = cursor.file;
        let error = |kind| LegislateError::new(file, LineRange::line(line_number), kind);

        match Line::classify(line) {
            Line::WhitespaceOnly => {
                self.stage_pending(cursor, line_number)?;
                self.commit_active(cursor, line_number)?;
            }
            Line::Comment => {}
            Line::Inclusion { name, base } => {
                self.stage_pending(cursor, line_number)?;
                self.commit_active(cursor, line_number)?;
                self.include(name, base, cursor, line_number)?;
            }
            Line::ClassDeclaration { class_name, id } => {
                self.stage_pending(cursor, line_number)?;
                self.commit_active(cursor, line_number)?;
                let class = RuleClass::from_name(class_name)
                    .ok_or_else(|| error(LegislateErrorKind::UnrecognisedClass(class_name.to_owned())))?;
                if self.rule_from_id.contains_key(id) {
                    return Err(error(LegislateErrorKind::DuplicateId(id.to_owned())));
                }
                let index = RuleId(self.rules.len());
                self.rules.push(Rule::new(index, id, class));
                cursor.active = Some(index);
                cursor.range_start = line_number;
            }
            Line::AttributeDeclaration { name, partial_value } => {
                self.stage_pending(cursor, line_number)?;
                let active = cursor
                    .active
                    .ok_or_else(|| error(LegislateErrorKind::AttributeWithoutClass))?;
                let class = self.rules[active.0].class();
                let name = class
                    .attribute_names()
                    .iter()
                    .copied()
                    .find(|candidate| *candidate == name)
                    .ok_or_else(|| {
                        error(LegislateErrorKind::UnrecognisedAttribute {
                            attribute: name.to_owned(),
                            class: class.name(),
                        })
                    })?;
                cursor.pending = Some(Pending::Attribute {
                    name,
                    value: partial_value.to_owned(),
                });
                cursor.range_start = line_number;
            }
            Line::SubstitutionDeclaration(partial_substitution) => {
                self.stage_pending(cursor, line_number)?;
                if cursor.active.is_none() {
                    return Err(error(LegislateErrorKind::SubstitutionWithoutClass));
                }
                cursor.pending = Some(Pending::Substitution(partial_substitution.to_owned()));
                cursor.range_start = line_number;
            }
            Line::Continuation(continuation) => match &mut cursor.pending {
                Some(Pending::Attribute { value, .. } | Pending::Substitution(value)) => {
                    value.push('\n');
                    value.push_str(continuation);
                }
                None => return Err(error(LegislateErrorKind::OrphanContinuation)),
            },
            Line::Invalid => return Err(error(LegislateErrorKind::InvalidSyntax)),
        }
        Ok(())
    }

    /// Stage the pending declaration, if any, onto the active rule.
    ///
    /// Errors span from the declaration's first line to `line_number`.
    fn stage_pending(&mut self, cursor: &mut Cursor<'_>, line_number: usize) -> Result<(), LegislateError> {
        let (Some(pending), Some(active)) = (cursor.pending.take(), cursor.active) else {
            return Ok(());
        };
        let staged = match pending {
            Pending::Attribute { name, value } => self.stage_attribute(active, name, &value),
            Pending::Substitution(substitution) => self.stage_substitution(active, &substitution, cursor.cmd_name),
        };
        staged.map_err(|kind| LegislateError::new(cursor.file, LineRange::span(cursor.range_start, line_number), kind))
    }

    /// Commit the active rule, if any, and insert it into the queue.
    fn commit_active(&mut self, cursor: &mut Cursor<'_>, line_number: usize) -> Result<(), LegislateError> {
        let Some(active) = cursor.active.take() else {
            return Ok(());
        };
        self.commit(active)
            .map_err(|kind| LegislateError::new(cursor.file, LineRange::line(line_number), kind))
    }

    fn commit(&mut self, index: RuleId) -> Result<(), LegislateErrorKind> {
        let rule = &mut self.rules[index.0];
        rule.commit()?;
        let id = rule.id().to_owned();
        let queue_position = rule.queue_position();
        debug!(id = %id, "Committed replacement");

        self.rule_from_id.insert(id.clone(), index);
        let (insertion_index, reference) = match queue_position {
            None => return Ok(()),
            Some(QueuePosition::Root) => {
                self.root_id = Some(id);
                self.queue.push(index);
                return Ok(());
            }
            Some(QueuePosition::Before(reference)) => (0, reference),
            Some(QueuePosition::After(reference)) => (1, reference),
        };
        let reference_index = self
            .queue
            .iter()
            .position(|queued| *queued == reference)
            .ok_or_else(|| LegislateErrorKind::NotInQueue(self.rules[reference.0].id().to_owned()))?;
        self.queue.insert(reference_index + insertion_index, index);
        Ok(())
    }

    fn include(
        &mut self,
        name: &str,
        base: InclusionBase,
        cursor: &Cursor<'_>,
        line_number: usize,
    ) -> Result<(), LegislateError> {
        let error = |kind| LegislateError::new(cursor.file, LineRange::line(line_number), kind);

        let included_file_name = match base {
            InclusionBase::WorkingDirectory => name.to_owned(),
            InclusionBase::IncludingFile => join_to_parent(cursor.file, name),
        };
        let included_file_name = normalise_path(&included_file_name);

        let rules = fs::read_to_string(&included_file_name).map_err(|err| {
            error(if err.kind() == io::ErrorKind::NotFound {
                LegislateErrorKind::IncludedFileNotFound(included_file_name.clone())
            } else {
                LegislateErrorKind::UnreadableFile {
                    file: included_file_name.clone(),
                    source: err,
                }
            })
        })?;

        let is_open = self
            .opened_file_names
            .iter()
            .any(|opened| is_same_file(opened, &included_file_name));
        self.opened_file_names.push(included_file_name.clone());
        if is_open {
            let chain = self
                .opened_file_names
                .iter()
                .map(|opened| format!("`{opened}`"))
                .collect::<Vec<_>>()
                .join(" includes ");
            return Err(error(LegislateErrorKind::RecursiveInclusion(chain)));
        }

        debug!(file = %included_file_name, "Including rules");
        self.legislate(&rules, &included_file_name, cursor.cmd_name)
    }

    /// Run `text` through every queued rule in order.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError`] if a rule's regex engine gives up on the text.
    pub fn execute(&self, text: &str) -> Result<String, ApplyError> {
        if self.verbose {
            let queue = self
                .queue
                .iter()
                .map(|id| format!("#{}", self.rules[id.0].id()))
                .collect::<Vec<_>>()
                .join(", ");
            info!("Replacement queue: [{queue}]");
        }

        let context = Context {
            rules: &self.rules,
            references: &self.references,
            observer: self.observer.as_deref(),
        };
        context.apply_each(&self.queue, text.to_owned(), None)
    }
}

/// `name` resolved against the directory of `file`.
fn join_to_parent(file: &str, name: &str) -> String {
    if name.starts_with('/') {
        return name.to_owned();
    }
    match file.rfind('/') {
        Some(0) => format!("/{name}"),
        Some(index) => format!("{}/{name}", &file[..index]),
        None => name.to_owned(),
    }
}

/// Whether both names resolve to the same existing file.
fn is_same_file(first: &str, second: &str) -> bool {
    match (Path::new(first).canonicalize(), Path::new(second).canonicalize()) {
        (Ok(first), Ok(second)) => first == second,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn legislate(rules: &str) -> Result<RuleEngine, LegislateError> {
        let mut engine = RuleEngine::new("test.cmd", false);
        engine.legislate(rules, "rules.cmdr", "test")?;
        Ok(engine)
    }

    fn legislate_err(rules: &str) -> LegislateError {
        match legislate(rules) {
            Ok(_) => panic!("expected rules to be rejected:\n{rules}"),
            Err(err) => err,
        }
    }

    #[test]
    fn test_queue_order() {
        let engine = legislate(
            "PlaceholderMarkerReplacement: #r\n- queue_position: ROOT\n\n\
             PlaceholderMarkerReplacement: #s\n- queue_position: AFTER #r\n\n\
             PlaceholderMarkerReplacement: #t\n- queue_position: BEFORE #s\n",
        )
        .unwrap();
        assert_eq!(engine.queue_ids(), vec!["r", "t", "s"]);
    }

    #[test]
    fn test_rules_without_position_are_not_queued() {
        let engine = legislate(
            "DeIndentationReplacement: #helper\n\
             ReplacementSequence: #root\n- queue_position: ROOT\n- replacements: #helper",
        )
        .unwrap();
        assert_eq!(engine.queue_ids(), vec!["root"]);
        assert!(engine.rule("helper").is_some_and(Rule::is_committed));
        assert_eq!(engine.execute("  a\n  b").unwrap(), "a\nb");
    }

    #[test]
    fn test_continuations_and_substitutions() {
        let engine = legislate(
            "OrdinaryDictionaryReplacement: #dictionary\n\
             - queue_position:\n    ROOT\n\
             * a --> b\n\
             * \"c\"\n  --> 'd'\n",
        )
        .unwrap();
        assert_eq!(engine.execute("a c").unwrap(), "b d");
    }

    #[test]
    fn test_regex_dictionary_keyword_substitute() {
        let mut engine = RuleEngine::new("docs\\index.cmd", false);
        engine
            .legislate(
                "RegexDictionaryReplacement: #keywords\n\
                 - queue_position: ROOT\n\
                 * %url --> CLEAN_URL\n\
                 * %name --> CMD_NAME\n",
                "rules.cmdr",
                "docs/index",
            )
            .unwrap();
        assert_eq!(engine.execute("%url %name").unwrap(), "docs/ docs/index");
    }

    #[test]
    fn test_regex_dictionary_uses_ascii_word_boundaries() {
        let engine = legislate(
            "RegexDictionaryReplacement: #words\n\
             - queue_position: ROOT\n\
             * \\b (?P<w> \\w+ ) \\b --> <\\g<w>>\n",
        )
        .unwrap();
        assert_eq!(engine.execute("café naïve abc").unwrap(), "<caf>é <na>ï<ve> <abc>");
    }

    #[test]
    fn test_invalid_lines() {
        let err = legislate_err("What is this?");
        assert!(matches!(err.kind, LegislateErrorKind::InvalidSyntax), "Expected InvalidSyntax, got {err:?}");
        assert!(err.to_string().starts_with("`rules.cmdr`, line 1: invalid syntax\n\n"));

        let err = legislate_err("# comment\n  continued");
        assert_eq!(err.to_string(), "`rules.cmdr`, line 2: continuation only allowed for attribute or substitution declarations");

        let err = legislate_err("- queue_position: ROOT");
        assert!(matches!(err.kind, LegislateErrorKind::AttributeWithoutClass));

        let err = legislate_err("* a --> b");
        assert!(matches!(err.kind, LegislateErrorKind::SubstitutionWithoutClass));
    }

    #[test]
    fn test_declaration_errors() {
        let err = legislate_err("NotAReplacement: #x");
        assert_eq!(err.to_string(), "`rules.cmdr`, line 1: unrecognised replacement class `NotAReplacement`");

        let err = legislate_err("DeIndentationReplacement: #x\n\nDeIndentationReplacement: #x");
        assert_eq!(err.to_string(), "`rules.cmdr`, line 3: replacement already declared with id `x`");

        let err = legislate_err("DeIndentationReplacement: #x\n- tag_name: p");
        assert_eq!(
            err.to_string(),
            "`rules.cmdr`, line 2: unrecognised attribute `tag_name` for `DeIndentationReplacement`"
        );

        let err = legislate_err("DeIndentationReplacement: #x\n* a --> b");
        assert!(matches!(err.kind, LegislateErrorKind::SubstitutionsNotAllowed("DeIndentationReplacement")));
    }

    #[test]
    fn test_value_error_spans_continuations() {
        let err = legislate_err("FixedDelimitersReplacement: #x\n- syntax_type:\n  SIDEWAYS\n  TOO\n");
        assert_eq!(err.lines, LineRange::span(2, 5));
        assert_eq!(
            err.to_string(),
            "`rules.cmdr`, lines 2 to 4: invalid value `SIDEWAYS\n  TOO` for attribute `syntax_type`"
        );
    }

    #[test]
    fn test_missing_attribute_reported_at_commit() {
        let err = legislate_err("FixedDelimitersReplacement: #x\n- syntax_type: INLINE\n\n# after");
        assert_eq!(
            err.to_string(),
            "`rules.cmdr`, line 3: missing attribute `opening_delimiter` for FixedDelimitersReplacement"
        );

        let err = legislate_err("FixedDelimitersReplacement: #x\n- syntax_type: INLINE");
        assert_eq!(err.lines, LineRange::line(3));
    }

    #[test]
    fn test_queue_position_errors() {
        let err = legislate_err("DeIndentationReplacement: #a\n- queue_position: ROOT\n\nDeIndentationReplacement: #b\n- queue_position: ROOT");
        assert!(matches!(err.kind, LegislateErrorKind::DuplicateRoot(ref id) if id == "a"));

        let err = legislate_err("DeIndentationReplacement: #a\n- queue_position: AFTER #a");
        assert!(matches!(err.kind, LegislateErrorKind::SelfReferentialQueuePosition));

        let err = legislate_err("DeIndentationReplacement: #a\n- queue_position: BEFORE #nowhere");
        assert!(matches!(err.kind, LegislateErrorKind::UndefinedReplacement(ref id) if id == "nowhere"));

        let err = legislate_err("DeIndentationReplacement: #a\n\nDeIndentationReplacement: #b\n- queue_position: AFTER #a");
        assert!(matches!(err.kind, LegislateErrorKind::NotInQueue(ref id) if id == "a"));

        let err = legislate_err("DeIndentationReplacement: #a\n- queue_position: AFTER  #b");
        assert!(matches!(err.kind, LegislateErrorKind::InvalidValue { attribute: "queue_position", .. }));
    }

    #[test]
    fn test_replacement_list_errors() {
        let err = legislate_err("ReplacementSequence: #a\n- replacements: #b");
        assert!(matches!(err.kind, LegislateErrorKind::UndefinedReplacement(ref id) if id == "b"));

        let err = legislate_err("ReplacementSequence: #a\n- replacements: b");
        assert_eq!(
            err.to_string(),
            "`rules.cmdr`, line 2: invalid specification `b` for attribute `replacements`"
        );
    }

    #[test]
    fn test_missing_substitution_delimiter() {
        let err = legislate_err("OrdinaryDictionaryReplacement: #d\n* a -> b");
        assert_eq!(err.to_string(), "`rules.cmdr`, line 2: missing delimiter `-->` in substitution `a -> b`");
    }

    #[test]
    fn test_bad_regex_substitute() {
        let err = legislate_err(r"RegexDictionaryReplacement: #d
* (a) --> \2");
        assert!(matches!(err.kind, LegislateErrorKind::BadSubstitute { .. }), "Expected BadSubstitute, got {err:?}");
    }

    #[test]
    fn test_inclusion_relative_to_file() {
        let dir = TempDir::new().unwrap();
        let rules_dir = dir.path().join("rules");
        fs::create_dir(&rules_dir).unwrap();
        fs::write(
            rules_dir.join("shared.cmdr"),
            "PlaceholderMarkerReplacement: #shared\n- queue_position: ROOT\n",
        )
        .unwrap();
        let main = rules_dir.join("main.cmdr");
        let main = main.to_str().unwrap();

        let mut engine = RuleEngine::new("doc.cmd", false);
        engine
            .legislate(
                "< shared.cmdr\nDeIndentationReplacement: #after\n- queue_position: AFTER #shared\n",
                main,
                "doc",
            )
            .unwrap();
        assert_eq!(engine.queue_ids(), vec!["shared", "after"]);
    }

    #[test]
    fn test_inclusion_not_found() {
        let err = legislate_err("< missing.cmdr");
        assert_eq!(
            err.to_string(),
            "`rules.cmdr`, line 1: file `missing.cmdr` (relative to terminal) not found"
        );
    }

    #[test]
    fn test_recursive_inclusion() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("first.cmdr");
        let second = dir.path().join("second.cmdr");
        fs::write(&first, "< second.cmdr\n").unwrap();
        fs::write(&second, "< first.cmdr\n").unwrap();
        let first = first.to_str().unwrap();
        let second = second.to_str().unwrap();

        let mut engine = RuleEngine::new(first, false);
        let err = engine.legislate("< second.cmdr\n", first, "first").unwrap_err();
        assert_eq!(
            err.kind.to_string(),
            format!("recursive inclusion: `{first}` includes `{second}` includes `{first}`")
        );
        assert_eq!(err.file, second);
    }

    #[test]
    fn test_join_to_parent() {
        assert_eq!(join_to_parent("rules.cmdr", "a.cmdr"), "a.cmdr");
        assert_eq!(join_to_parent("dir/rules.cmdr", "a.cmdr"), "dir/a.cmdr");
        assert_eq!(join_to_parent("/rules.cmdr", "a.cmdr"), "/a.cmdr");
        assert_eq!(join_to_parent("dir/rules.cmdr", "/abs.cmdr"), "/abs.cmdr");
    }

    struct Recorder(Rc<RefCell<Vec<String>>>);

    impl ApplyObserver for Recorder {
        fn observe(&self, rule_id: &str, _before: &str, _after: &str) {
            self.0.borrow_mut().push(rule_id.to_owned());
        }
    }

    #[test]
    fn test_observer_sees_nested_applications() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut engine = RuleEngine::new("test.cmd", false).with_observer(Box::new(Recorder(Rc::clone(&seen))));
        engine
            .legislate(
                "DeIndentationReplacement: #inner\n\n\
                 ReplacementSequence: #outer\n- queue_position: ROOT\n- replacements: #inner\n",
                "rules.cmdr",
                "test",
            )
            .unwrap();
        engine.execute("text").unwrap();
        assert_eq!(*seen.borrow(), vec!["inner".to_owned(), "outer".to_owned()]);
    }
}
