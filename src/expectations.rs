//! The top-level expectations engine: folds a cascade of expectation files
//! into a queryable model.
//!
//! Files are applied in the caller's order (generic file first, then the
//! port-specific file, then overrides), with an explicit skip list applied
//! last. In normal use, lines that do not match the current configuration are
//! filtered out and warnings are merely collected; in lint mode everything is
//! folded and any disqualifying warning fails the whole pass atomically.

use std::collections::{BTreeMap, BTreeSet};

use crate::configuration::{ConfigurationConverter, ConfigurationDomain, TestConfiguration};
use crate::corpus::TestCorpus;
use crate::errors::{LintWarning, ParseError};
use crate::expectation::{
    ExpectationLine, ExpectationSyntax, LineOrigin, Modifier, Outcome, MISSING_BUG_WARNING,
};
use crate::model::ExpectationsModel;
use crate::parser::ExpectationParser;
use crate::serialize;
use crate::validator::{SemanticValidator, ValidationPolicy};

/// Construction options for [`TestExpectations`].
#[derive(Debug, Clone, Default)]
pub struct ExpectationsOptions {
    /// The configuration this run executes under. When set, entries that do
    /// not match it contribute nothing to the model (lint mode folds
    /// everything regardless).
    pub current_configuration: Option<TestConfiguration>,
    /// Promote any disqualifying warning into an atomic [`ParseError`].
    pub lint_mode: bool,
    pub policy: ValidationPolicy,
    /// Tests (or test directories) named in Skipped files or `--ignore-tests`
    /// options; folded last, overriding everything.
    pub skipped_tests: BTreeSet<String>,
}

/// An ordered cascade of expectation files: `(name, contents)` pairs.
pub type ExpectationsFiles = Vec<(String, String)>;

/// The constructed engine: all parsed lines plus the resolved model.
#[derive(Debug)]
pub struct TestExpectations {
    syntax: ExpectationSyntax,
    converter: ConfigurationConverter,
    lines: Vec<ExpectationLine>,
    model: ExpectationsModel,
    warnings: Vec<LintWarning>,
}

impl TestExpectations {
    /// Parses, validates, and folds the given file cascade.
    ///
    /// In lint mode, any warning other than the tolerated missing-bug one
    /// fails the pass with the full aggregated warning list; no partial model
    /// escapes.
    pub fn from_files(
        domain: &ConfigurationDomain,
        syntax: ExpectationSyntax,
        corpus: &dyn TestCorpus,
        files: &ExpectationsFiles,
        options: ExpectationsOptions,
    ) -> Result<Self, ParseError> {
        let converter = ConfigurationConverter::new(domain);
        let policy = ValidationPolicy {
            allow_rebaseline_modifier: options.policy.allow_rebaseline_modifier
                && !options.lint_mode,
            ..options.policy
        };

        let parser = ExpectationParser::new(&syntax);
        let validator = SemanticValidator::new(corpus, &converter, policy);
        let mut model = ExpectationsModel::new();
        let mut lines: Vec<ExpectationLine> = Vec::new();

        for (filename, contents) in files {
            let mut file_lines = parser.tokenize_file(filename, contents);
            for line in &mut file_lines {
                validator.validate(line);
                let matches_current = options
                    .current_configuration
                    .as_ref()
                    .map_or(true, |config| line.matching_configurations.contains(config));
                if options.lint_mode || matches_current {
                    model.add_expectation_line(line, false);
                }
            }
            lines.extend(file_lines);
        }

        // The skip list is folded last and wins unconditionally. Lines whose
        // test it shadows are flagged so the duplication gets cleaned up.
        let mut skip_list_warnings: Vec<LintWarning> = Vec::new();
        if !options.skipped_tests.is_empty() {
            for line in &mut lines {
                if let Some(name) = &line.name {
                    if options.skipped_tests.contains(name) {
                        line.warnings.push(format!("{name} is also in a Skipped file."));
                    }
                }
            }
            for test_name in &options.skipped_tests {
                let mut synthetic = ExpectationLine::for_skipped_test(test_name);
                validator.validate(&mut synthetic);
                model.add_expectation_line(&mut synthetic, true);
                skip_list_warnings.extend(LintWarning::from_line(&synthetic));
            }
        }

        let mut warnings: Vec<LintWarning> =
            lines.iter().flat_map(LintWarning::from_line).collect();
        warnings.extend(skip_list_warnings);

        if options.lint_mode
            && warnings.iter().any(|warning| warning.message != MISSING_BUG_WARNING)
        {
            return Err(ParseError { warnings });
        }

        Ok(Self { syntax, converter, lines, model, warnings })
    }

    pub fn model(&self) -> &ExpectationsModel {
        &self.model
    }

    pub fn lines(&self) -> &[ExpectationLine] {
        &self.lines
    }

    pub fn converter(&self) -> &ConfigurationConverter {
        &self.converter
    }

    /// Every warning collected during construction, in input order.
    pub fn warnings(&self) -> &[LintWarning] {
        &self.warnings
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    // ========================================================================
    // RESULT MATCHING
    // ========================================================================

    /// Drops pixel-failure expectations: a test expected to fail only the
    /// image comparison is expected to pass when pixel tests are off.
    pub fn remove_pixel_failures(expected: &BTreeSet<Outcome>) -> BTreeSet<Outcome> {
        let mut result = expected.clone();
        if result.remove(&Outcome::Image) {
            result.insert(Outcome::Pass);
        }
        result
    }

    /// Whether an actual result satisfies an expected outcome set. `Fail`
    /// subsumes the finer-grained text/image+text/audio failures; a missing
    /// result is fine while a test is being rebaselined; a skipped result is
    /// fine iff the test carries the skip modifier.
    pub fn result_was_expected(
        result: Outcome,
        expected: &BTreeSet<Outcome>,
        test_needs_rebaselining: bool,
        test_is_skipped: bool,
    ) -> bool {
        if expected.contains(&result) {
            return true;
        }
        if result.is_failure_kind() && expected.contains(&Outcome::Fail) {
            return true;
        }
        if result == Outcome::Missing && test_needs_rebaselining {
            return true;
        }
        if result == Outcome::Skip && test_is_skipped {
            return true;
        }
        false
    }

    /// The runner-facing query: did `test` behave as expected?
    pub fn matches_an_expected_result(
        &self,
        test: &str,
        mut result: Outcome,
        pixel_tests_enabled: bool,
    ) -> bool {
        let mut expected = self.model.get_expectations(test);
        if !pixel_tests_enabled {
            expected = Self::remove_pixel_failures(&expected);
            // Without pixel tests an image-only failure is moot on the actual
            // side too.
            if result == Outcome::Image {
                result = Outcome::Pass;
            }
        }
        Self::result_was_expected(
            result,
            &expected,
            self.model.has_modifier(test, Modifier::Rebaseline),
            self.model.has_modifier(test, Modifier::Skip),
        )
    }

    /// Tests currently carrying the Rebaseline modifier.
    pub fn get_rebaselining_failures(&self) -> BTreeSet<String> {
        self.model.get_test_set(Modifier::Rebaseline, None, true)
    }

    /// Human-readable summary of what a test is expected to do, e.g.
    /// `Failure Timeout`.
    pub fn readable_expectations_for_test(&self, test: &str) -> String {
        let keywords: Vec<&'static str> = self
            .model
            .get_expectations(test)
            .iter()
            .map(|outcome| outcome.display_keyword())
            .collect();
        keywords.join(" ")
    }

    // ========================================================================
    // SERIALIZATION AND MUTATION
    // ========================================================================

    /// Regenerates the text of every folded file, concatenated in input
    /// order. Valid lines come back canonical; invalid lines verbatim.
    pub fn serialize_all(&self) -> String {
        serialize::list_to_string(&self.lines, &self.converter, &self.syntax, None)
    }

    /// Regenerates one file's text, preserving every line as originally
    /// written.
    pub fn serialize_file(&self, filename: &str) -> String {
        let file_lines: Vec<ExpectationLine> = self
            .lines
            .iter()
            .filter(|line| line.filename == filename)
            .cloned()
            .collect();
        let everything: BTreeSet<usize> = BTreeSet::new();
        serialize::list_to_string(&file_lines, &self.converter, &self.syntax, Some(&everything))
    }

    /// Narrows failing entries for `test` by removing one configuration from
    /// them, and returns the regenerated text of all files. Only
    /// single-outcome Failure/ImageOnlyFailure entries are touched; an entry
    /// whose configuration set empties is dropped from the output entirely.
    pub fn remove_configuration_from_test(
        &mut self,
        test: &str,
        configuration: &TestConfiguration,
    ) -> String {
        let mut modified: BTreeSet<usize> = BTreeSet::new();
        for (index, line) in self.lines.iter_mut().enumerate() {
            if line.name.as_deref() != Some(test)
                || line.is_flaky()
                || line.parsed_expectations.is_empty()
            {
                continue;
            }
            let only = *line.parsed_expectations.iter().next().expect("non-empty set");
            if only != Outcome::Fail && only != Outcome::Image {
                continue;
            }
            if !line.matching_configurations.remove(configuration) {
                continue;
            }
            // From here on the parsed fields are the source of truth.
            line.origin = LineOrigin::Constructed;
            modified.insert(index);
        }
        serialize::list_to_string(&self.lines, &self.converter, &self.syntax, Some(&modified))
    }

    /// Returns `filename` regenerated without the entries that were being
    /// rebaselined for the given tests. The engine itself is not modified;
    /// callers write the returned text back and rebuild.
    pub fn remove_rebaselined_tests(&self, tests: &BTreeSet<String>, filename: &str) -> String {
        let remaining: Vec<ExpectationLine> = self
            .lines
            .iter()
            .filter(|line| {
                !(line.filename == filename
                    && !line.is_invalid()
                    && line.name.as_ref().is_some_and(|name| tests.contains(name))
                    && line.has_modifier(Modifier::Rebaseline))
            })
            .cloned()
            .collect();
        let untouched: BTreeSet<usize> = BTreeSet::new();
        serialize::list_to_string(&remaining, &self.converter, &self.syntax, Some(&untouched))
    }

    /// Groups the folded lines by their source file, preserving input order
    /// within each file.
    pub fn lines_by_file(&self) -> BTreeMap<&str, Vec<&ExpectationLine>> {
        let mut grouped: BTreeMap<&str, Vec<&ExpectationLine>> = BTreeMap::new();
        for line in &self.lines {
            grouped.entry(line.filename.as_str()).or_default().push(line);
        }
        grouped
    }
}
