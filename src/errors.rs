//! Aggregate error types for the expectations engine.
//!
//! Per-line problems are plain string warnings carried on the lines
//! themselves; they never abort parsing or validation. The only structured
//! failure is [`ParseError`], produced in lint mode when any disqualifying
//! warning exists anywhere: the whole pass fails atomically with the full
//! warning list, and no partial model is handed out.

use std::fmt;

use miette::Diagnostic;

use crate::expectation::ExpectationLine;

/// One reported warning with its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintWarning {
    pub filename: String,
    pub line_number: u32,
    pub message: String,
    /// The test name when one was parsed, otherwise the original text; gives
    /// the reader something to grep for.
    pub context: String,
}

impl LintWarning {
    /// Collects the warnings of one line in reporting form.
    pub fn from_line(line: &ExpectationLine) -> Vec<LintWarning> {
        let context = line
            .name
            .clone()
            .or_else(|| line.original_string.clone())
            .unwrap_or_default();
        line.warnings
            .iter()
            .map(|message| LintWarning {
                filename: line.filename.clone(),
                line_number: line.line_number,
                message: message.clone(),
                context: context.clone(),
            })
            .collect()
    }
}

impl fmt::Display for LintWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} {} {}",
            self.filename, self.line_number, self.message, self.context
        )
    }
}

/// The aggregated lint failure: every warning from every file, in input
/// order.
#[derive(Debug, Diagnostic)]
#[diagnostic(
    code(test_expectations::lint),
    help("fix the listed lines, or remove them if the tests no longer exist")
)]
pub struct ParseError {
    pub warnings: Vec<LintWarning>,
}

impl std::error::Error for ParseError {}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} error{} found while parsing test expectations:",
            self.warnings.len(),
            if self.warnings.len() == 1 { "" } else { "s" }
        )?;
        for warning in &self.warnings {
            writeln!(f, "  {warning}")?;
        }
        Ok(())
    }
}
