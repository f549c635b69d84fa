//! Post-processing: deterministic cleanup of model-generated Markdown.
//!
//! Models follow the "no fences, no front matter" rules most of the time, not
//! all of the time. Each fragment goes through these passes before assembly:
//!
//! 1. Strip outer ```` ```markdown ```` fences
//! 2. Normalise line endings (CRLF → LF)
//! 3. Drop a YAML front-matter block at the top of the fragment
//! 4. Trim trailing whitespace per line
//! 5. Collapse 3+ consecutive blank lines down to 2
//! 6. Ensure heading lines have a blank line before them
//! 7. Insert a missing GFM table separator row
//! 8. Remove spurious mid-table separator rows
//! 9. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
//! 10. End with exactly one newline
//!
//! Fences are stripped before line endings are normalised and before heading
//! detection, so both see clean input.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply every cleanup pass, in order.
pub fn clean_markdown(input: &str) -> String {
    let s = strip_markdown_fences(input);
    let s = normalise_line_endings(&s);
    let s = strip_front_matter(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = normalise_heading_spacing(&s);
    let s = fix_broken_tables(&s);
    let s = remove_mid_table_separators(&s);
    let s = remove_invisible_chars(&s);
    ensure_final_newline(&s)
}

// ── Fences ───────────────────────────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)?\r?\n(.*)\r?\n```\s*$").unwrap());

fn strip_markdown_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Line endings ─────────────────────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Front matter ─────────────────────────────────────────────────────────────

// Front matter belongs to the assembled document only.
static RE_FRONT_MATTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\A\s*---\n(?:[^\n]*:[^\n]*\n)*?---\n").unwrap());

fn strip_front_matter(input: &str) -> String {
    RE_FRONT_MATTER.replace(input, "").into_owned()
}

// ── Whitespace ───────────────────────────────────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").into_owned()
}

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{}\n", trimmed)
    }
}

// ── Headings ─────────────────────────────────────────────────────────────────

static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6} ").unwrap());

fn normalise_heading_spacing(input: &str) -> String {
    let mut result = String::with_capacity(input.len() + 64);
    let mut in_code = false;
    for (i, line) in input.lines().enumerate() {
        if line.trim_start().starts_with("```") {
            in_code = !in_code;
        }
        if !in_code && i > 0 && RE_HEADING.is_match(line) {
            let trimmed = result.trim_end_matches('\n').len();
            result.truncate(trimmed);
            result.push_str("\n\n");
        }
        result.push_str(line);
        result.push('\n');
    }
    result
}

// ── Tables ───────────────────────────────────────────────────────────────────

fn is_table_row(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('|') && trimmed.ends_with('|') && trimmed.len() > 2
}

fn is_separator_row(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('|')
        && trimmed.contains('-')
        && trimmed
            .chars()
            .all(|c| matches!(c, '|' | '-' | ':' | ' '))
}

/// Insert a separator row after a table header that lacks one.
fn fix_broken_tables(input: &str) -> String {
    let lines: Vec<&str> = input.lines().collect();
    let mut result: Vec<String> = Vec::with_capacity(lines.len() + 4);

    for (i, line) in lines.iter().enumerate() {
        result.push(line.to_string());

        let starts_table = is_table_row(line)
            && !is_separator_row(line)
            && !lines.get(i.wrapping_sub(1)).is_some_and(|p| is_table_row(p));
        if !starts_table {
            continue;
        }
        let next = lines.get(i + 1).copied().unwrap_or("");
        if is_table_row(next) && !is_separator_row(next) {
            let cols = line.trim().matches('|').count().saturating_sub(1).max(1);
            let sep: String = std::iter::once("|")
                .chain(std::iter::repeat_n(" --- |", cols))
                .collect();
            result.push(sep);
        }
    }

    result.join("\n")
}

/// Keep only the separator in position 2 of each table block.
fn remove_mid_table_separators(input: &str) -> String {
    let mut result: Vec<&str> = Vec::new();
    let mut table_line = 0usize;

    for line in input.lines() {
        if is_table_row(line) {
            table_line += 1;
            if is_separator_row(line) && table_line != 2 {
                continue;
            }
        } else {
            table_line = 0;
        }
        result.push(line);
    }

    result.join("\n")
}

// ── Invisible characters ─────────────────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_markdown_fences("```markdown\n# Hello\nWorld\n```"), "# Hello\nWorld");
        assert_eq!(strip_markdown_fences("```\n# Hello\nWorld\n```"), "# Hello\nWorld");
        assert_eq!(strip_markdown_fences("# Hello\nWorld"), "# Hello\nWorld");
    }

    #[test]
    fn test_inner_code_fence_survives() {
        let input = "Text\n\n```rust\nfn main() {}\n```";
        assert_eq!(strip_markdown_fences(input), input);
    }

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_strip_front_matter() {
        let input = "---\ntitle: \"T\"\nx: y\n---\n# Body";
        assert_eq!(strip_front_matter(input), "# Body");
    }

    #[test]
    fn test_horizontal_rule_is_not_front_matter() {
        let input = "Intro\n\n---\n\nMore";
        assert_eq!(strip_front_matter(input), input);
    }

    #[test]
    fn test_trim_trailing_whitespace() {
        assert_eq!(trim_trailing_whitespace("  hello   \nworld  "), "  hello\nworld");
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\n\nb"), "a\n\n\nb");
    }

    #[test]
    fn test_heading_spacing() {
        let result = normalise_heading_spacing("some text\n# Heading\nmore text");
        assert!(result.contains("text\n\n# Heading\n"));
    }

    #[test]
    fn test_heading_spacing_skips_code() {
        let input = "```sh\necho\n# comment\n```\n";
        assert_eq!(normalise_heading_spacing(input), input);
    }

    #[test]
    fn test_hashtag_is_not_heading() {
        let input = "a\n#hashtag\n";
        assert_eq!(normalise_heading_spacing(input), input);
    }

    #[test]
    fn test_fix_broken_table() {
        let result = fix_broken_tables("| A | B |\n| 1 | 2 |\n| 3 | 4 |");
        let lines: Vec<&str> = result.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(is_separator_row(lines[1]));
        assert_eq!(lines[1], "| --- | --- |");
    }

    #[test]
    fn test_table_with_separator_unchanged() {
        let input = "| A | B |\n| --- | --- |\n| 1 | 2 |";
        assert_eq!(fix_broken_tables(input), input);
    }

    #[test]
    fn test_remove_mid_table_separator() {
        let input = "| A | B |\n| --- | --- |\n| 1 | 2 |\n| --- | --- |\n| 3 | 4 |";
        let result = remove_mid_table_separators(input);
        assert_eq!(result.lines().filter(|l| is_separator_row(l)).count(), 1);
        assert!(result.contains("| 3 | 4 |"));
    }

    #[test]
    fn test_remove_invisible() {
        assert_eq!(
            remove_invisible_chars("hello\u{200B}world\u{FEFF}foo\u{00AD}bar"),
            "helloworldfoobar"
        );
    }

    #[test]
    fn test_ensure_final_newline() {
        assert_eq!(ensure_final_newline("hello"), "hello\n");
        assert_eq!(ensure_final_newline("hello\n\n\n"), "hello\n");
        assert_eq!(ensure_final_newline(""), "\n");
    }

    #[test]
    fn test_clean_markdown_full_pipeline() {
        let input = "```markdown\n---\ntitle: \"x\"\n---\n# Title\r\n\r\nSome text   \n\n\n\n\n\n## Section\n\n| A | B |\n| 1 | 2 |\n```";
        let result = clean_markdown(input);
        assert!(result.starts_with("# Title"), "got {result:?}");
        assert!(result.ends_with('\n'));
        assert!(!result.contains("\n\n\n\n"));
        assert!(result.contains("| --- | --- |"));
    }
}
