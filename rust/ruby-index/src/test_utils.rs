mod context;

pub use context::{Context, with_context};
pub use index_test::IndexTest;
pub use local_index_test::LocalIndexTest;

/// Strips the indentation shared by every line of an indented inline source, so tests can write Ruby nested inside
/// Rust code.
///
/// If the input starts with a newline followed by indentation, that first newline is dropped so the first line of
/// content starts at line 1. Blank lines are kept, emptied of whitespace.
#[must_use]
pub fn normalize_indentation(input: &str) -> String {
    let input = if let Some(rest) = input.strip_prefix('\n') {
        match rest.chars().next() {
            Some(' ' | '\t') => rest,
            _ => input,
        }
    } else {
        input
    };

    let lines: Vec<&str> = input.lines().collect();

    if lines.is_empty() {
        return String::new();
    }

    let Some(first_non_empty_line) = lines.iter().find(|line| !line.trim().is_empty()) else {
        return input.to_string();
    };

    let base_indent = first_non_empty_line.len() - first_non_empty_line.trim_start().len();

    lines
        .iter()
        .map(|line| {
            if line.trim().is_empty() {
                ""
            } else if line.len() >= base_indent && line.chars().take(base_indent).all(char::is_whitespace) {
                &line[base_indent..]
            } else {
                line
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizing_indented_sources() {
        let source = normalize_indentation({
            "
            class Foo
              def bar; end

            end
            "
        });

        assert_eq!(source, "class Foo\n  def bar; end\n\nend");
    }

    #[test]
    fn normalizing_single_lines() {
        assert_eq!(normalize_indentation("class Foo; end"), "class Foo; end");
        assert_eq!(normalize_indentation(""), "");
    }
}
