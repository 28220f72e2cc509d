//! The queryable expectations store.
//!
//! Maps each concrete test to its resolved outcome set, its modifiers, and
//! the line that won it, and keeps reverse indices (by outcome, by modifier,
//! by timeline, by result-type bucket) for O(log n) set-membership queries.
//!
//! Folding is strictly ordered: files are applied one after another, lines in
//! input order. A line from a later file overrides an earlier file's entry
//! unconditionally. Within one file, a longer (more specific) path wins
//! silently; at equal path length the matching configuration sets are
//! compared and conflicts are flagged, but the textually-later line always
//! replaces the earlier one in storage, whichever direction the containment
//! runs. Replacement fully retracts the test from every index first, so no
//! residue of the losing line remains.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::expectation::{ExpectationLine, Modifier, Outcome};

/// Whether an entry is expected to be dealt with now or accepted forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Timeline {
    Now,
    WontFix,
}

/// Coarse classification of an entry for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ResultType {
    Skip,
    Pass,
    Fail,
    Flaky,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Arbitration {
    Install,
    KeepExisting,
}

/// Relational store of resolved expectations.
#[derive(Debug, Default)]
pub struct ExpectationsModel {
    test_to_expectations: BTreeMap<String, BTreeSet<Outcome>>,
    test_to_modifiers: BTreeMap<String, BTreeSet<Modifier>>,
    test_to_line: BTreeMap<String, Arc<ExpectationLine>>,
    expectation_to_tests: BTreeMap<Outcome, BTreeSet<String>>,
    modifier_to_tests: BTreeMap<Modifier, BTreeSet<String>>,
    timeline_to_tests: BTreeMap<Timeline, BTreeSet<String>>,
    result_type_to_tests: BTreeMap<ResultType, BTreeSet<String>>,
}

impl ExpectationsModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one validated line to the store. Conflict warnings are
    /// appended to `line` itself, so callers see them in the normal per-line
    /// reporting. Entries from a Skipped list bypass arbitration entirely.
    pub fn add_expectation_line(&mut self, line: &mut ExpectationLine, from_skip_list: bool) {
        if line.is_invalid() {
            return;
        }

        let mut installing: Vec<String> = Vec::new();
        for test in line.matching_tests.clone() {
            let arbitration = if from_skip_list {
                Arbitration::Install
            } else {
                self.arbitrate(&test, line)
            };
            if arbitration == Arbitration::Install {
                installing.push(test);
            }
        }

        if installing.is_empty() {
            return;
        }

        let snapshot = Arc::new(line.clone());
        for test in installing {
            self.clear_expectations_for_test(&test);
            self.install(test, &snapshot);
        }
    }

    /// Decides whether `line` takes over `test` from the current entry, and
    /// records the conflict warnings of the same-file, same-path cases.
    fn arbitrate(&self, test: &str, line: &mut ExpectationLine) -> Arbitration {
        let Some(previous) = self.test_to_line.get(test) else {
            return Arbitration::Install;
        };

        // A later file overrides earlier ones unconditionally.
        if previous.filename != line.filename {
            return Arbitration::Install;
        }

        let previous_path = previous.path.as_deref().unwrap_or_default();
        let current_path = line.path.as_deref().unwrap_or_default();
        if previous_path.len() > current_path.len() {
            // The earlier entry matches more of the test name; intended
            // layering, not a conflict.
            return Arbitration::KeepExisting;
        }
        if previous_path.len() < current_path.len() {
            return Arbitration::Install;
        }

        let previous_configs = &previous.matching_configurations;
        let current_configs = &line.matching_configurations;

        if previous_configs == current_configs {
            line.warnings.push(format!(
                "Duplicate or ambiguous entry lines {} and {}.",
                previous.location(),
                line.location()
            ));
        } else if current_configs.is_subset(previous_configs) {
            line.warnings.push(more_specific_warning(test, line.location(), previous.location()));
        } else if previous_configs.is_subset(current_configs) {
            line.warnings.push(more_specific_warning(test, previous.location(), line.location()));
        } else if !previous_configs.is_disjoint(current_configs) {
            line.warnings.push(format!(
                "Entries for {} on lines {} and {} match overlapping sets of configurations.",
                test,
                previous.location(),
                line.location()
            ));
        }

        // Last write wins in storage either way, even for disjoint sets; the
        // store keeps one winner per test.
        Arbitration::Install
    }

    fn install(&mut self, test: String, line: &Arc<ExpectationLine>) {
        self.test_to_expectations.insert(test.clone(), line.parsed_expectations.clone());
        for &outcome in &line.parsed_expectations {
            self.expectation_to_tests.entry(outcome).or_default().insert(test.clone());
        }

        let modifiers: BTreeSet<Modifier> = line.parsed_modifiers.iter().copied().collect();
        for &modifier in &modifiers {
            self.modifier_to_tests.entry(modifier).or_default().insert(test.clone());
        }
        self.test_to_modifiers.insert(test.clone(), modifiers);

        let timeline = if line.has_modifier(Modifier::WontFix) {
            Timeline::WontFix
        } else {
            Timeline::Now
        };
        self.timeline_to_tests.entry(timeline).or_default().insert(test.clone());

        let result_type = if line.has_modifier(Modifier::Skip) {
            ResultType::Skip
        } else if line.parsed_expectations.len() == 1
            && line.parsed_expectations.contains(&Outcome::Pass)
        {
            ResultType::Pass
        } else if line.parsed_expectations.len() > 1 {
            ResultType::Flaky
        } else {
            ResultType::Fail
        };
        self.result_type_to_tests.entry(result_type).or_default().insert(test.clone());

        self.test_to_line.insert(test, Arc::clone(line));
    }

    /// Removes every trace of `test` from the store before a replacement is
    /// installed.
    fn clear_expectations_for_test(&mut self, test: &str) {
        if !self.has_test(test) {
            return;
        }
        self.test_to_expectations.remove(test);
        self.test_to_modifiers.remove(test);
        self.test_to_line.remove(test);
        remove_from_sets(test, &mut self.expectation_to_tests);
        remove_from_sets(test, &mut self.modifier_to_tests);
        remove_from_sets(test, &mut self.timeline_to_tests);
        remove_from_sets(test, &mut self.result_type_to_tests);
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn has_test(&self, test: &str) -> bool {
        self.test_to_line.contains_key(test)
    }

    pub fn tests(&self) -> impl Iterator<Item = &str> {
        self.test_to_line.keys().map(String::as_str)
    }

    /// The resolved outcome set for a test; empty if the test has no entry.
    pub fn get_expectations(&self, test: &str) -> BTreeSet<Outcome> {
        self.test_to_expectations.get(test).cloned().unwrap_or_default()
    }

    pub fn get_modifiers(&self, test: &str) -> BTreeSet<Modifier> {
        self.test_to_modifiers.get(test).cloned().unwrap_or_default()
    }

    pub fn has_modifier(&self, test: &str, modifier: Modifier) -> bool {
        self.modifier_to_tests.get(&modifier).is_some_and(|tests| tests.contains(test))
    }

    /// The line that currently owns this test's entry, with its provenance.
    pub fn get_expectation_line(&self, test: &str) -> Option<&ExpectationLine> {
        self.test_to_line.get(test).map(Arc::as_ref)
    }

    /// Tests carrying `modifier`; with `expectation` given, restricted to
    /// tests also expecting that outcome; optionally without skipped tests.
    pub fn get_test_set(
        &self,
        modifier: Modifier,
        expectation: Option<Outcome>,
        include_skips: bool,
    ) -> BTreeSet<String> {
        let by_modifier = self.modifier_to_tests.get(&modifier).cloned().unwrap_or_default();
        let mut tests = match expectation {
            Some(outcome) => {
                let by_outcome =
                    self.expectation_to_tests.get(&outcome).cloned().unwrap_or_default();
                by_modifier.intersection(&by_outcome).cloned().collect()
            }
            None => by_modifier,
        };
        if !include_skips {
            let skipped = self.get_test_set(Modifier::Skip, expectation, true);
            tests = tests.difference(&skipped).cloned().collect();
        }
        tests
    }

    pub fn get_tests_with_result_type(&self, result_type: ResultType) -> BTreeSet<String> {
        self.result_type_to_tests.get(&result_type).cloned().unwrap_or_default()
    }

    pub fn get_tests_with_timeline(&self, timeline: Timeline) -> BTreeSet<String> {
        self.timeline_to_tests.get(&timeline).cloned().unwrap_or_default()
    }
}

fn more_specific_warning(test: &str, more_specific: String, less_specific: String) -> String {
    format!("More specific entry for {test} on line {more_specific} overrides line {less_specific}.")
}

fn remove_from_sets<K: Ord>(test: &str, index: &mut BTreeMap<K, BTreeSet<String>>) {
    for tests in index.values_mut() {
        tests.remove(test);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::{ConfigurationConverter, ConfigurationDomain};
    use crate::corpus::TestIndex;
    use crate::expectation::ExpectationSyntax;
    use crate::parser::ExpectationParser;
    use crate::validator::{SemanticValidator, ValidationPolicy};

    struct Fixture {
        syntax: ExpectationSyntax,
        corpus: TestIndex,
        converter: ConfigurationConverter,
    }

    impl Fixture {
        fn new() -> Self {
            let domain = ConfigurationDomain::default();
            Self {
                syntax: ExpectationSyntax::default(),
                corpus: TestIndex::from_tests([
                    "dir/foo.html",
                    "dir/bar.html",
                    "other/baz.html",
                ]),
                converter: ConfigurationConverter::new(&domain),
            }
        }

        fn line(&self, filename: &str, raw: &str, line_number: u32) -> ExpectationLine {
            let mut line =
                ExpectationParser::new(&self.syntax).tokenize_line(filename, raw, line_number);
            SemanticValidator::new(&self.corpus, &self.converter, ValidationPolicy::default())
                .validate(&mut line);
            line
        }

        fn fold(&self, entries: &[(&str, &str, u32)]) -> (ExpectationsModel, Vec<ExpectationLine>) {
            let mut model = ExpectationsModel::new();
            let mut lines = Vec::new();
            for &(filename, raw, number) in entries {
                let mut line = self.line(filename, raw, number);
                model.add_expectation_line(&mut line, false);
                lines.push(line);
            }
            (model, lines)
        }
    }

    #[test]
    fn single_entry_populates_every_index() {
        let fixture = Fixture::new();
        let (model, _) = fixture.fold(&[("TestExpectations", "Bug(x) dir/foo.html [ Failure ]", 1)]);

        assert!(model.has_test("dir/foo.html"));
        assert_eq!(model.get_expectations("dir/foo.html"), [Outcome::Fail].into_iter().collect());
        assert!(model.get_tests_with_result_type(ResultType::Fail).contains("dir/foo.html"));
        assert!(model.get_tests_with_timeline(Timeline::Now).contains("dir/foo.html"));
        let line = model.get_expectation_line("dir/foo.html").unwrap();
        assert_eq!(line.location(), "TestExpectations:1");
    }

    #[test]
    fn later_file_overrides_earlier_file_silently() {
        let fixture = Fixture::new();
        let (model, lines) = fixture.fold(&[
            ("TestExpectations", "Bug(x) dir/foo.html [ Failure ]", 1),
            ("platform/mac/TestExpectations", "Bug(y) dir/foo.html [ Timeout ]", 1),
        ]);

        assert!(lines.iter().all(|l| l.warnings.is_empty()));
        assert_eq!(
            model.get_expectations("dir/foo.html"),
            [Outcome::Timeout].into_iter().collect()
        );
        assert_eq!(
            model.get_expectation_line("dir/foo.html").unwrap().filename,
            "platform/mac/TestExpectations"
        );
    }

    #[test]
    fn same_file_duplicate_warns_and_later_line_wins() {
        let fixture = Fixture::new();
        let (model, lines) = fixture.fold(&[
            ("TestExpectations", "Bug(x) dir/foo.html [ Failure ]", 1),
            ("TestExpectations", "Bug(y) dir/foo.html [ WontFix ]", 2),
        ]);

        assert_eq!(
            lines[1].warnings,
            vec!["Duplicate or ambiguous entry lines TestExpectations:1 and TestExpectations:2."]
        );
        // The later line wins: the entry is the WontFix one.
        assert!(model.has_modifier("dir/foo.html", Modifier::WontFix));
        assert_eq!(model.get_expectations("dir/foo.html"), [Outcome::Pass].into_iter().collect());
        assert_eq!(model.get_expectation_line("dir/foo.html").unwrap().line_number, 2);
    }

    #[test]
    fn longer_path_wins_over_directory_entry_silently() {
        let fixture = Fixture::new();
        let (model, lines) = fixture.fold(&[
            ("TestExpectations", "Bug(x) dir [ WontFix ]", 1),
            ("TestExpectations", "Bug(y) dir/foo.html [ Failure ]", 2),
        ]);

        assert!(lines.iter().all(|l| l.warnings.is_empty()));
        assert_eq!(model.get_expectations("dir/foo.html"), [Outcome::Fail].into_iter().collect());
        // Other tests in the directory keep the WontFix entry.
        assert!(model.has_modifier("dir/bar.html", Modifier::WontFix));
        assert_eq!(model.get_expectations("dir/bar.html"), [Outcome::Pass].into_iter().collect());
    }

    #[test]
    fn directory_entry_after_file_entry_keeps_the_file_entry() {
        let fixture = Fixture::new();
        let (model, lines) = fixture.fold(&[
            ("TestExpectations", "Bug(x) dir/foo.html [ Failure ]", 1),
            ("TestExpectations", "Bug(y) dir [ WontFix ]", 2),
        ]);

        assert!(lines.iter().all(|l| l.warnings.is_empty()));
        assert_eq!(model.get_expectations("dir/foo.html"), [Outcome::Fail].into_iter().collect());
        assert!(model.has_modifier("dir/bar.html", Modifier::WontFix));
    }

    #[test]
    fn subset_configurations_warn_and_later_line_wins() {
        let fixture = Fixture::new();
        let (model, lines) = fixture.fold(&[
            ("TestExpectations", "Bug(x) dir/foo.html [ Failure ]", 1),
            ("TestExpectations", "Bug(y) [ Mac ] dir/foo.html [ Timeout ]", 2),
        ]);

        assert_eq!(
            lines[1].warnings,
            vec!["More specific entry for dir/foo.html on line TestExpectations:2 overrides \
                  line TestExpectations:1."]
        );
        assert_eq!(
            model.get_expectations("dir/foo.html"),
            [Outcome::Timeout].into_iter().collect()
        );
    }

    #[test]
    fn superset_configurations_warn_and_later_line_still_wins() {
        let fixture = Fixture::new();
        let (model, lines) = fixture.fold(&[
            ("TestExpectations", "Bug(x) [ Mac ] dir/foo.html [ Timeout ]", 1),
            ("TestExpectations", "Bug(y) dir/foo.html [ Failure ]", 2),
        ]);

        // The message names the earlier, narrower entry as the more specific
        // one, but storage is last-write-wins regardless.
        assert_eq!(
            lines[1].warnings,
            vec!["More specific entry for dir/foo.html on line TestExpectations:1 overrides \
                  line TestExpectations:2."]
        );
        assert_eq!(model.get_expectations("dir/foo.html"), [Outcome::Fail].into_iter().collect());
    }

    #[test]
    fn overlapping_configurations_warn() {
        let fixture = Fixture::new();
        let (_, lines) = fixture.fold(&[
            ("TestExpectations", "Bug(x) [ Mac ] dir/foo.html [ Timeout ]", 1),
            ("TestExpectations", "Bug(y) [ Debug ] dir/foo.html [ Crash ]", 2),
        ]);

        assert_eq!(
            lines[1].warnings,
            vec!["Entries for dir/foo.html on lines TestExpectations:1 and TestExpectations:2 \
                  match overlapping sets of configurations."]
        );
    }

    #[test]
    fn disjoint_configurations_coexist_without_warning() {
        let fixture = Fixture::new();
        let (model, lines) = fixture.fold(&[
            ("TestExpectations", "Bug(x) [ Mac ] dir/foo.html [ Timeout ]", 1),
            ("TestExpectations", "Bug(y) [ Win ] dir/foo.html [ Crash ]", 2),
        ]);

        assert!(lines.iter().all(|l| l.warnings.is_empty()));
        // Storage still keeps one winner per test: the later line.
        assert_eq!(model.get_expectations("dir/foo.html"), [Outcome::Crash].into_iter().collect());
    }

    #[test]
    fn replacement_leaves_no_residue_in_any_index() {
        let fixture = Fixture::new();
        let (model, _) = fixture.fold(&[
            ("TestExpectations", "Bug(x) dir/foo.html [ Failure ]", 1),
            ("TestExpectations", "Bug(y) dir/foo.html [ WontFix ]", 2),
        ]);

        // The losing line put the test in the fail bucket and the now
        // timeline; both must be fully retracted.
        assert!(!model.get_tests_with_result_type(ResultType::Fail).contains("dir/foo.html"));
        assert!(!model.get_tests_with_timeline(Timeline::Now).contains("dir/foo.html"));
        assert!(!model
            .expectation_to_tests
            .get(&Outcome::Fail)
            .is_some_and(|tests| tests.contains("dir/foo.html")));
        assert!(model.get_tests_with_result_type(ResultType::Skip).contains("dir/foo.html"));
        assert!(model.get_tests_with_timeline(Timeline::WontFix).contains("dir/foo.html"));
    }

    #[test]
    fn skip_with_outcomes_still_lands_in_the_skip_bucket() {
        let fixture = Fixture::new();
        let (model, lines) =
            fixture.fold(&[("TestExpectations", "Bug(x) dir/foo.html [ Skip Failure ]", 1)]);

        assert!(!lines[0].warnings.is_empty());
        assert!(model.get_tests_with_result_type(ResultType::Skip).contains("dir/foo.html"));
    }

    #[test]
    fn flaky_and_pass_buckets_classify_by_outcome_sets() {
        let fixture = Fixture::new();
        let (model, _) = fixture.fold(&[
            ("TestExpectations", "Bug(x) dir/foo.html [ Failure Timeout ]", 1),
            ("TestExpectations", "Bug(y) dir/bar.html [ Pass ]", 2),
        ]);

        assert!(model.get_tests_with_result_type(ResultType::Flaky).contains("dir/foo.html"));
        assert!(model.get_tests_with_result_type(ResultType::Pass).contains("dir/bar.html"));
    }

    #[test]
    fn invalid_lines_contribute_nothing() {
        let fixture = Fixture::new();
        let (model, _) =
            fixture.fold(&[("TestExpectations", "Bug(x) dir/foo.html [ Slow Timeout ]", 1)]);
        assert!(!model.has_test("dir/foo.html"));
    }

    #[test]
    fn test_set_queries_intersect_modifier_and_outcome() {
        let fixture = Fixture::new();
        let (model, _) = fixture.fold(&[
            ("TestExpectations", "Bug(x) dir/foo.html [ Slow Failure ]", 1),
            ("TestExpectations", "Bug(y) dir/bar.html [ Slow ]", 2),
        ]);

        let slow_failing = model.get_test_set(Modifier::Slow, Some(Outcome::Fail), true);
        assert!(slow_failing.contains("dir/foo.html"));
        assert!(!slow_failing.contains("dir/bar.html"));
        let slow = model.get_test_set(Modifier::Slow, None, true);
        assert_eq!(slow.len(), 2);
    }
}
