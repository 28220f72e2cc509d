//! User-facing output for the expectations CLI.
//!
//! Centralizes colorization and formatting so every subcommand reports the
//! same way.

use std::io::Write;

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::errors::{LintWarning, ParseError};

fn stdout() -> StandardStream {
    let choice =
        if atty::is(atty::Stream::Stdout) { ColorChoice::Auto } else { ColorChoice::Never };
    StandardStream::stdout(choice)
}

fn stderr() -> StandardStream {
    let choice =
        if atty::is(atty::Stream::Stderr) { ColorChoice::Auto } else { ColorChoice::Never };
    StandardStream::stderr(choice)
}

/// Prints non-fatal warnings, one per line, in yellow.
pub fn print_warnings(warnings: &[LintWarning]) {
    let mut stream = stderr();
    for warning in warnings {
        let _ = stream.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)));
        let _ = writeln!(stream, "warning: {warning}");
        let _ = stream.reset();
    }
}

/// Prints a lint failure: red header, then each offending line.
pub fn print_lint_failure(error: &ParseError) {
    let mut stream = stderr();
    let _ = stream.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true));
    let _ = writeln!(
        stream,
        "{} error{} found while parsing test expectations:",
        error.warnings.len(),
        if error.warnings.len() == 1 { "" } else { "s" }
    );
    let _ = stream.reset();
    for warning in &error.warnings {
        let _ = writeln!(stream, "  {warning}");
    }
}

/// Prints an operational error (bad arguments, unreadable files).
pub fn print_error(message: &str) {
    let mut stream = stderr();
    let _ = stream.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true));
    let _ = write!(stream, "error: ");
    let _ = stream.reset();
    let _ = writeln!(stream, "{message}");
}

/// Prints a successful lint summary.
pub fn print_ok(message: &str) {
    let mut stream = stdout();
    let _ = stream.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true));
    let _ = writeln!(stream, "{message}");
    let _ = stream.reset();
}

/// Prints the result of a query: what the test is expected to do and where
/// that decision came from.
pub fn print_query_result(
    test: &str,
    expectations: &str,
    modifiers: &[String],
    provenance: Option<&str>,
) {
    let mut stream = stdout();
    let _ = writeln!(stream, "{test}");
    let _ = writeln!(stream, "  expected: {expectations}");
    if !modifiers.is_empty() {
        let _ = writeln!(stream, "  modifiers: {}", modifiers.join(" "));
    }
    if let Some(provenance) = provenance {
        let _ = writeln!(stream, "  from: {provenance}");
    }
}
