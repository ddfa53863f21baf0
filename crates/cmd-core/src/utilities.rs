//! Text helpers shared by the rule engine and the command line.

/// Horizontal whitespace: ASCII whitespace other than the line feed.
fn is_horizontal_whitespace(character: char) -> bool {
    matches!(character, ' ' | '\t' | '\r' | '\x0B' | '\x0C')
}

/// ASCII whitespace, vertical tab included.
pub(crate) fn is_whitespace(character: char) -> bool {
    character == '\n' || is_horizontal_whitespace(character)
}

/// Trim ASCII whitespace, vertical tab included.
pub(crate) fn trim(text: &str) -> &str {
    text.trim_matches(is_whitespace)
}

pub(crate) fn is_whitespace_only(text: &str) -> bool {
    text.chars().all(is_whitespace)
}

/// Longest prefix shared by all `strings`, empty when there are none.
#[must_use]
pub fn compute_longest_common_prefix(strings: &[&str]) -> String {
    let Some(shortest) = strings.iter().min_by_key(|string| string.len()) else {
        return String::new();
    };
    let mut prefix: &str = shortest;
    while !prefix.is_empty() {
        if strings.iter().all(|string| string.starts_with(prefix)) {
            break;
        }
        let mut characters = prefix.chars();
        characters.next_back();
        prefix = characters.as_str();
    }
    prefix.to_owned()
}

/// Remove the longest common indentation from every line.
///
/// Empty lines do not count towards the common indentation. Whitespace-only
/// lines do, except for a whitespace-only last line, whose whitespace is
/// erased.
#[must_use]
pub fn de_indent(text: &str) -> String {
    let last_line_start = text.rfind('\n').map_or(0, |index| index + 1);
    let last_line = &text[last_line_start..];
    let text = if !last_line.is_empty() && last_line.chars().all(is_horizontal_whitespace) {
        &text[..last_line_start]
    } else {
        text
    };

    let indentations: Vec<&str> = text
        .split('\n')
        .filter(|line| !line.is_empty())
        .map(|line| {
            let indentation_length = line.len() - line.trim_start_matches(is_horizontal_whitespace).len();
            &line[..indentation_length]
        })
        .collect();
    let indentation = compute_longest_common_prefix(&indentations);
    if indentation.is_empty() {
        return text.to_owned();
    }

    text.split('\n')
        .map(|line| line.strip_prefix(indentation.as_str()).unwrap_or(line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Escape backslashes so a literal survives as a regex substitute.
#[must_use]
pub fn escape_regex_substitute(substitute: &str) -> String {
    substitute.replace('\\', r"\\")
}

/// Split at universal line boundaries, dropping the terminators.
///
/// `\r\n` counts as one boundary; a trailing boundary does not start a new line.
#[must_use]
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut line_start = 0;
    let mut characters = text.char_indices().peekable();
    while let Some((index, character)) = characters.next() {
        let is_boundary = matches!(
            character,
            '\n' | '\r' | '\x0B' | '\x0C' | '\x1C' | '\x1D' | '\x1E' | '\u{85}' | '\u{2028}' | '\u{2029}'
        );
        if !is_boundary {
            continue;
        }
        lines.push(&text[line_start..index]);
        let mut next_start = index + character.len_utf8();
        if character == '\r' {
            if let Some(&(lf_index, '\n')) = characters.peek() {
                characters.next();
                next_start = lf_index + 1;
            }
        }
        line_start = next_start;
    }
    if line_start < text.len() {
        lines.push(&text[line_start..]);
    }
    lines
}

/// Lexically normalise a path: collapse separators, `.` and `..` components.
#[must_use]
pub fn normalise_path(path: &str) -> String {
    if path.is_empty() {
        return ".".to_owned();
    }
    let is_absolute = path.starts_with('/');
    let mut components: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                if components.last().is_some_and(|last| *last != "..") {
                    components.pop();
                } else if !is_absolute {
                    components.push("..");
                }
            }
            _ => components.push(component),
        }
    }
    let joined = components.join("/");
    match (is_absolute, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_owned(),
        (false, false) => joined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_compute_longest_common_prefix() {
        assert_eq!(compute_longest_common_prefix(&[]), "");
        assert_eq!(compute_longest_common_prefix(&["", "abc"]), "");
        assert_eq!(compute_longest_common_prefix(&["abc", "ab", "abd"]), "ab");
        assert_eq!(compute_longest_common_prefix(&["  ", "\t"]), "");
    }

    #[test]
    fn test_de_indent() {
        assert_eq!(de_indent(""), "");
        assert_eq!(de_indent("    a\n  b\n"), "  a\nb\n");
        assert_eq!(de_indent("  a\n\n  b"), "a\n\nb");
        assert_eq!(de_indent("  a\n  b\n    "), "a\nb\n");
        assert_eq!(de_indent("  a\nb"), "  a\nb");
    }

    #[test]
    fn test_de_indent_counts_whitespace_only_lines() {
        assert_eq!(de_indent("    a\n  \n    b"), "  a\n\n  b");
    }

    #[test]
    fn test_escape_regex_substitute() {
        assert_eq!(escape_regex_substitute(r"a\b"), r"a\\b");
    }

    #[test]
    fn test_split_lines() {
        assert_eq!(split_lines(""), Vec::<&str>::new());
        assert_eq!(split_lines("a\nb"), vec!["a", "b"]);
        assert_eq!(split_lines("a\r\nb\n"), vec!["a", "b"]);
        assert_eq!(split_lines("a\n\nb\rc"), vec!["a", "", "b", "c"]);
        assert_eq!(split_lines("\n"), vec![""]);
    }

    #[test]
    fn test_trim_includes_vertical_tab() {
        assert_eq!(trim("\x0B value \x0C"), "value");
    }

    #[test]
    fn test_normalise_path() {
        assert_eq!(normalise_path("./dir/../file.cmd"), "file.cmd");
        assert_eq!(normalise_path("a//b/./c"), "a/b/c");
        assert_eq!(normalise_path("../a"), "../a");
        assert_eq!(normalise_path("/../a"), "/a");
        assert_eq!(normalise_path(""), ".");
        assert_eq!(normalise_path("a/.."), ".");
    }
}
