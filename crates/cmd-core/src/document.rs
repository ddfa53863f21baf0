//! Document-level conversion: splitting a CMD file and running it through the
//! standard rules plus its own.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ConvertError;
use crate::master::RuleEngine;

/// Rules every document is compiled against before its own rules.
pub const STANDARD_RULES: &str = include_str!("../assets/standard_rules.cmdr");

static DELIMITER_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^%{3,}\n").unwrap());

static CLEAN_URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?P<last_separator>\A|/)index\z").unwrap());

/// Split a document into its replacement rules and main content.
///
/// The first line of three or more percent signs separates the two. Without
/// such a line the whole document is content.
#[must_use]
pub fn extract_rules_and_content(cmd: &str) -> (Option<&str>, &str) {
    match DELIMITER_REGEX.find(cmd) {
        Some(delimiter) => (Some(&cmd[..delimiter.start()]), &cmd[delimiter.end()..]),
        None => (None, cmd),
    }
}

/// Everything after the last slash.
#[must_use]
pub fn extract_basename(name: &str) -> &str {
    name.rfind('/').map_or(name, |index| &name[index + 1..])
}

/// Drop a trailing `index` path component, keeping its separator.
#[must_use]
pub fn make_clean_url(cmd_name: &str) -> String {
    CLEAN_URL_REGEX.replace(cmd_name, "${last_separator}").into_owned()
}

/// Document name without `.cmd`, with backslashes turned into slashes.
#[must_use]
pub fn extract_separator_normalised_cmd_name(cmd_file_name: &str) -> String {
    cmd_file_name
        .strip_suffix(".cmd")
        .unwrap_or(cmd_file_name)
        .replace('\\', "/")
}

/// Convert a CMD document to HTML.
///
/// # Errors
///
/// Returns [`ConvertError`] if the standard or document rules fail to compile,
/// or if a rule cannot be applied.
pub fn cmd_to_html(cmd: &str, cmd_file_name: &str, verbose: bool) -> Result<String, ConvertError> {
    let (rules, content) = extract_rules_and_content(cmd);
    let cmd_name = extract_separator_normalised_cmd_name(cmd_file_name);

    let mut engine = RuleEngine::new(cmd_file_name, verbose);
    engine.legislate(STANDARD_RULES, "STANDARD_RULES", &cmd_name)?;
    if let Some(rules) = rules {
        engine.legislate(rules, cmd_file_name, &cmd_name)?;
    }
    Ok(engine.execute(content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const HEAD: &str = "<!DOCTYPE html>\n\
        <html lang=\"en\">\n\
        <head>\n\
        <meta charset=\"utf-8\">\n\
        <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
        <title>Title</title>\n\
        </head>\n\
        <body>\n";

    const TAIL: &str = "</body>\n</html>\n";

    fn body(content: &str) -> String {
        let html = cmd_to_html(content, "test.cmd", false).unwrap();
        let inner = html
            .strip_prefix(HEAD)
            .and_then(|rest| rest.strip_suffix(TAIL))
            .unwrap_or_else(|| panic!("unexpected boilerplate:\n{html}"));
        inner.trim_end_matches('\n').to_owned()
    }

    #[test]
    fn test_extract_rules_and_content() {
        assert_eq!(extract_rules_and_content(""), (None, ""));
        assert_eq!(extract_rules_and_content("%%%\nabc"), (Some(""), "abc"));
        assert_eq!(extract_rules_and_content("X%%\nY"), (None, "X%%\nY"));
        assert_eq!(extract_rules_and_content("%%%"), (None, "%%%"));
        assert_eq!(
            extract_rules_and_content("ABC\n%%%\n123\n%%%%%%%\nXYZ"),
            (Some("ABC\n"), "123\n%%%%%%%\nXYZ")
        );
    }

    #[test]
    fn test_extract_basename() {
        assert_eq!(extract_basename("path/to/page"), "page");
        assert_eq!(extract_basename("page"), "page");
        assert_eq!(extract_basename("dir/"), "");
    }

    #[test]
    fn test_make_clean_url() {
        assert_eq!(make_clean_url("index"), "");
        assert_eq!(make_clean_url("/index"), "/");
        assert_eq!(make_clean_url("path/to/index"), "path/to/");
        assert_eq!(make_clean_url("/not-truly-index"), "/not-truly-index");
        assert_eq!(make_clean_url("index/page"), "index/page");
    }

    #[test]
    fn test_extract_separator_normalised_cmd_name() {
        assert_eq!(extract_separator_normalised_cmd_name("path/to/cmd_name.cmd"), "path/to/cmd_name");
        assert_eq!(extract_separator_normalised_cmd_name(r"path\to\cmd_name.cmd"), "path/to/cmd_name");
        assert_eq!(extract_separator_normalised_cmd_name("name.cmd.cmd"), "name.cmd");
    }

    #[test]
    fn test_empty_document() {
        let html = cmd_to_html("", "test.cmd", false).unwrap();
        assert_eq!(html, format!("{HEAD}{TAIL}"));
    }

    #[test]
    fn test_delete_everything() {
        let cmd = "RegexDictionaryReplacement: #.delete-everything\n\
                   - queue_position: AFTER #placeholder-unprotect\n\
                   * [\\s\\S]* -->\n\
                   \n\
                   %%%\n\
                   \n\
                   Everything here goes.\n";
        assert_eq!(cmd_to_html(cmd, "test.cmd", false).unwrap(), "");
    }

    #[test]
    fn test_headings_and_inline_semantics() {
        assert_eq!(body("# Title"), "<h1>Title</h1>");
        assert_eq!(body("### Level 3"), "<h3>Level 3</h3>");
        assert_eq!(body("*em* **strong**"), "<em>em</em> <strong>strong</strong>");
        assert_eq!(body("__b__ _i_"), "<b>b</b> <i>i</i>");
    }

    #[test]
    fn test_links() {
        assert_eq!(
            body("<https://example.com>"),
            r#"<a href="https://example.com">https://example.com</a>"#
        );
        assert_eq!(
            body("s<https://example.com>"),
            r#"<a href="https://example.com">example.com</a>"#
        );
        assert_eq!(body("[Untouched][Nonexistent label]"), "[Untouched][Nonexistent label]");
    }

    #[test]
    fn test_reference_definitions_resolve_links() {
        assert_eq!(
            body("[Home]\n\n[home]: /index.html"),
            r#"<a href="/index.html">Home</a>"#
        );
    }

    #[test]
    fn test_code_and_escaping() {
        assert_eq!(body("`a < b`"), "<code>a &lt; b</code>");
        assert_eq!(body("1 < 2 & 3"), "1 &lt; 2 &amp; 3");
        assert_eq!(body("&amp; stays"), "&amp; stays");
        assert_eq!(body(r"\*not em\*"), "*not em*");
    }

    #[test]
    fn test_display_code_is_protected_from_later_rules() {
        assert_eq!(
            body("````\n*not em* <b>\n````"),
            "<pre><code>*not em* &lt;b&gt;\n</code></pre>"
        );
    }

    #[test]
    fn test_paragraphs_and_lists() {
        assert_eq!(body("--\nText\n--"), "<p>\nText\n</p>");
        assert_eq!(body("==\n- a\n- b\n=="), "<ul>\n<li>\na\n</li>\n<li>\nb\n</li>\n</ul>");
    }

    #[test]
    fn test_document_rules_can_use_keywords() {
        let cmd = "OrdinaryDictionaryReplacement: #page\n\
                   - queue_position: BEFORE #placeholder-unprotect\n\
                   * %page --> CMD_BASENAME\n\
                   %%%\n\
                   %page";
        let html = cmd_to_html(cmd, "site/about.cmd", false).unwrap();
        assert!(html.contains("<body>\nabout</body>"), "unexpected output:\n{html}");
    }

    #[test]
    fn test_document_rule_errors_name_the_file() {
        let err = cmd_to_html("Bogus\n%%%\n", "page.cmd", false).unwrap_err();
        assert!(
            err.to_string().starts_with("`page.cmd`, line 1: invalid syntax"),
            "unexpected error: {err}"
        );
    }
}
