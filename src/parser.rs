//! Tokenizer for expectation lines.
//!
//! Converts one textual line into an unvalidated [`ExpectationLine`]. The
//! tokenizer never fails: malformed input becomes a warning plus a best-effort
//! partial parse, and the original text is always kept for round-trip
//! serialization.
//!
//! The grammar is a single order-sensitive pass over whitespace-normalized
//! tokens:
//!
//! ```text
//! line        := bugToken* ("[" specifier+ "]")? testName ("[" expectation+ "]")? comment?
//! bugToken    := "webkit.org/b/" DIGITS | "Bug(" WORD ")"
//! comment     := "#" ANYTHING-TO-EOL
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

use crate::expectation::{
    ExpectationLine, ExpectationSyntax, Modifier, Outcome, SKIP_WITH_EXPECTATIONS_WARNING,
};

const WEBKIT_BUG_PREFIX: &str = "webkit.org/b/";

static NAMED_BUG_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Bug\((\w+)\)$").expect("bug token pattern is valid"));

/// Scan state for the token pass. Transitions are driven by `[` and `]`; any
/// out-of-order bracket is a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Start,
    Configuration,
    Name,
    NameFound,
    Expectations,
    Done,
}

/// Tokenizes expectation lines against a fixed syntax table.
#[derive(Debug)]
pub struct ExpectationParser<'s> {
    syntax: &'s ExpectationSyntax,
}

impl<'s> ExpectationParser<'s> {
    pub fn new(syntax: &'s ExpectationSyntax) -> Self {
        Self { syntax }
    }

    /// Tokenizes a whole file, one [`ExpectationLine`] per input line
    /// (blank and comment lines included), with 1-based line numbers.
    pub fn tokenize_file(&self, filename: &str, contents: &str) -> Vec<ExpectationLine> {
        contents
            .split('\n')
            .enumerate()
            .map(|(index, raw)| self.tokenize_line(filename, raw, index as u32 + 1))
            .collect()
    }

    /// Tokenizes a single line. Never fails; all diagnostics land in the
    /// returned line's `warnings`.
    pub fn tokenize_line(&self, filename: &str, raw: &str, line_number: u32) -> ExpectationLine {
        let mut line = ExpectationLine::new(filename, line_number);
        line.original_string = Some(raw.to_string());

        // A comment truncates the line before tokenization; its text (sans
        // the '#') is kept verbatim.
        let before_comment = match raw.find('#') {
            Some(index) => {
                line.comment = Some(raw[index + 1..].to_string());
                &raw[..index]
            }
            None => raw,
        };

        let tokens: Vec<&str> = before_comment.split_whitespace().collect();
        if tokens.is_empty() {
            return line;
        }

        if tokens[0].starts_with("//") {
            line.warnings.push("use \"#\" instead of \"//\" for comments".to_string());
            return line;
        }

        let mut bugs: Vec<String> = Vec::new();
        let mut modifiers: Vec<String> = Vec::new();
        let mut expectations: Vec<String> = Vec::new();
        let mut name: Option<String> = None;
        let mut warnings: Vec<String> = Vec::new();
        let mut state = ScanState::Start;

        for token in tokens {
            if token.starts_with(WEBKIT_BUG_PREFIX) || token.starts_with("Bug(") {
                if state != ScanState::Start {
                    warnings.push(format!("\"{token}\" is not at the start of the line."));
                    break;
                }
                if let Some(numeric) = token.strip_prefix(WEBKIT_BUG_PREFIX) {
                    bugs.push(format!("BUGWK{numeric}"));
                } else if let Some(captures) = NAMED_BUG_TOKEN.captures(token) {
                    bugs.push(format!("BUG{}", captures[1].to_uppercase()));
                } else {
                    warnings.push(format!("unrecognized bug identifier \"{token}\""));
                    break;
                }
            } else if token.starts_with("BUG") {
                warnings.push(format!("unrecognized old-style bug identifier \"{token}\""));
                break;
            } else if token == "[" {
                match state {
                    ScanState::Start => state = ScanState::Configuration,
                    ScanState::NameFound => state = ScanState::Expectations,
                    _ => {
                        warnings.push("unexpected \"[\"".to_string());
                        break;
                    }
                }
            } else if token == "]" {
                match state {
                    ScanState::Configuration => state = ScanState::Name,
                    ScanState::Expectations => state = ScanState::Done,
                    _ => {
                        warnings.push("unexpected \"]\"".to_string());
                        break;
                    }
                }
            } else if token == "//" || token == ":" || token == "=" {
                warnings.push(format!(
                    "\"{token}\" is not legal in the new TestExpectations syntax."
                ));
                break;
            } else if state == ScanState::Configuration {
                modifiers.push(self.syntax.canonical_configuration_token(token));
            } else if state == ScanState::Expectations {
                if Modifier::is_expectation_block_keyword(token) {
                    modifiers.push(token.to_uppercase());
                } else {
                    match Outcome::canonical_token_for_keyword(token) {
                        Some(canonical) => expectations.push(canonical.to_string()),
                        None => warnings.push(format!("Unrecognized expectation \"{token}\"")),
                    }
                }
            } else if state == ScanState::NameFound {
                warnings.push(format!(
                    "expecting \"[\", \"#\", or end of line instead of \"{token}\""
                ));
                break;
            } else {
                name = Some(token.to_string());
                state = ScanState::NameFound;
            }
        }

        if warnings.is_empty() {
            if name.is_none() {
                warnings.push("Did not find a test name.".to_string());
            }
            if state != ScanState::NameFound && state != ScanState::Done {
                warnings.push("Missing a \"]\"".to_string());
            }
        }

        // An explicit Skip alongside explicit outcomes is a semantic
        // contradiction; the line still lands in the skip bucket.
        if modifiers.iter().any(|m| m == "SKIP") && !expectations.is_empty() {
            warnings.push(SKIP_WITH_EXPECTATIONS_WARNING.to_string());
        }

        line.bug_modifiers = bugs;
        line.raw_modifiers = modifiers;
        line.name = name;
        line.raw_expectations = expectations;
        line.warnings = warnings;
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expectation::ExpectationSyntax;

    fn tokenize(raw: &str) -> ExpectationLine {
        let syntax = ExpectationSyntax::default();
        ExpectationParser::new(&syntax).tokenize_line("TestExpectations", raw, 1)
    }

    #[test]
    fn blank_line_has_no_name_and_no_warnings() {
        let line = tokenize("");
        assert!(line.name.is_none());
        assert!(line.warnings.is_empty());

        let line = tokenize("   \t  ");
        assert!(line.name.is_none());
        assert!(line.warnings.is_empty());
    }

    #[test]
    fn comment_only_line_keeps_comment_verbatim() {
        let line = tokenize("# this is a comment");
        assert!(line.name.is_none());
        assert!(line.warnings.is_empty());
        assert_eq!(line.comment.as_deref(), Some(" this is a comment"));
    }

    #[test]
    fn comment_truncates_tokenization() {
        let line = tokenize("Bug(x) failures/expected/text.html [ Failure ] # flaky on bots");
        assert_eq!(line.comment.as_deref(), Some(" flaky on bots"));
        assert_eq!(line.name.as_deref(), Some("failures/expected/text.html"));
        assert!(line.warnings.is_empty());
    }

    #[test]
    fn full_line_tokenizes_all_fields() {
        let line =
            tokenize("webkit.org/b/12345 [ Mac Debug ] fast/html/keygen.html [ Crash Timeout ]");
        assert_eq!(line.bug_modifiers, vec!["BUGWK12345"]);
        assert_eq!(line.raw_modifiers, vec!["MAC", "DEBUG"]);
        assert_eq!(line.name.as_deref(), Some("fast/html/keygen.html"));
        assert_eq!(line.raw_expectations, vec!["CRASH", "TIMEOUT"]);
        assert!(line.warnings.is_empty());
    }

    #[test]
    fn named_bug_token_uppercases_its_argument() {
        let line = tokenize("Bug(dpranke) fast/html/keygen.html [ Failure ]");
        assert_eq!(line.bug_modifiers, vec!["BUGDPRANKE"]);
        assert!(line.warnings.is_empty());
    }

    #[test]
    fn double_slash_comment_is_rejected_immediately() {
        let line = tokenize("// this is a comment");
        assert_eq!(line.warnings, vec!["use \"#\" instead of \"//\" for comments"]);
        assert!(line.name.is_none());
    }

    #[test]
    fn bug_token_after_start_is_rejected() {
        let line = tokenize("fast/html/keygen.html Bug(x) [ Failure ]");
        assert_eq!(line.warnings, vec!["\"Bug(x)\" is not at the start of the line."]);
    }

    #[test]
    fn malformed_named_bug_token_is_rejected() {
        let line = tokenize("Bug(not a word) fast/html/keygen.html");
        assert_eq!(line.warnings[0], "unrecognized bug identifier \"Bug(not\"");
    }

    #[test]
    fn old_style_bug_identifier_is_rejected() {
        let line = tokenize("BUGWK12345 fast/html/keygen.html [ Failure ]");
        assert_eq!(
            line.warnings,
            vec!["unrecognized old-style bug identifier \"BUGWK12345\""]
        );
    }

    #[test]
    fn stray_brackets_warn() {
        assert_eq!(tokenize("fast/html [ Failure ] [").warnings, vec!["unexpected \"[\""]);
        assert_eq!(tokenize("] fast/html").warnings[0], "unexpected \"]\"");
    }

    #[test]
    fn legacy_separators_are_illegal() {
        let line = tokenize("fast/html = FAIL");
        assert_eq!(
            line.warnings,
            vec!["\"=\" is not legal in the new TestExpectations syntax."]
        );
        let line = tokenize("fast/html : FAIL");
        assert_eq!(
            line.warnings,
            vec!["\":\" is not legal in the new TestExpectations syntax."]
        );
    }

    #[test]
    fn configuration_tokens_canonicalize_only_known_ones() {
        let line = tokenize("[ Mac Quartz ] fast/html/keygen.html [ Failure ]");
        assert_eq!(line.raw_modifiers, vec!["MAC", "Quartz"]);
        assert!(line.warnings.is_empty());
    }

    #[test]
    fn modifier_keywords_in_expectation_block_become_modifiers() {
        let line = tokenize("fast/html/keygen.html [ WontFix ]");
        assert_eq!(line.raw_modifiers, vec!["WONTFIX"]);
        assert!(line.raw_expectations.is_empty());
        assert!(line.warnings.is_empty());
    }

    #[test]
    fn unrecognized_expectation_warns_without_aborting() {
        let line = tokenize("fast/html/keygen.html [ Failure Explode ]");
        assert_eq!(line.warnings, vec!["Unrecognized expectation \"Explode\""]);
        assert_eq!(line.raw_expectations, vec!["FAIL"]);
        assert_eq!(line.name.as_deref(), Some("fast/html/keygen.html"));
    }

    #[test]
    fn second_bare_token_warns() {
        let line = tokenize("fast/html/keygen.html other.html");
        assert_eq!(
            line.warnings,
            vec!["expecting \"[\", \"#\", or end of line instead of \"other.html\""]
        );
    }

    #[test]
    fn missing_name_is_reported() {
        let line = tokenize("[ Mac ]");
        assert_eq!(line.warnings, vec!["Did not find a test name."]);
    }

    #[test]
    fn unclosed_bracket_is_reported() {
        let line = tokenize("fast/html/keygen.html [ Failure");
        assert_eq!(line.warnings, vec!["Missing a \"]\""]);
    }

    #[test]
    fn prose_line_fails_to_parse_but_keeps_original() {
        let raw = "2009-08-19  Eric Seidel  <eric@webkit.org>";
        let line = tokenize(raw);
        assert!(line.is_invalid());
        assert_eq!(line.original_string.as_deref(), Some(raw));
    }

    #[test]
    fn skip_with_explicit_outcomes_is_a_semantic_warning() {
        let line = tokenize("fast/html/keygen.html [ Skip Failure ]");
        assert_eq!(line.warnings, vec![SKIP_WITH_EXPECTATIONS_WARNING]);
        assert!(!line.is_invalid());
        assert_eq!(line.raw_modifiers, vec!["SKIP"]);
        assert_eq!(line.raw_expectations, vec!["FAIL"]);
    }

    #[test]
    fn file_tokenization_numbers_lines_from_one() {
        let syntax = ExpectationSyntax::default();
        let parser = ExpectationParser::new(&syntax);
        let lines = parser.tokenize_file("TestExpectations", "# header\nfast/a.html [ Failure ]\n");
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].line_number, 1);
        assert_eq!(lines[1].line_number, 2);
        assert_eq!(lines[1].name.as_deref(), Some("fast/a.html"));
        assert!(lines[2].name.is_none());
    }
}
