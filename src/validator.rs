//! Semantic validation of tokenized expectation lines.
//!
//! Resolves a line against the known test corpus and the configuration
//! domain: checks the test exists, expands directory entries to the matching
//! leaf tests, classifies modifier tokens (modifier / bug id / configuration
//! specifier), converts outcome keywords to the internal enum, and applies
//! the historical default synthesis (an entry with no explicit outcome and no
//! override modifier means "don't run it").
//!
//! Validation mutates the line's derived fields in place and is otherwise
//! pure; it never fails, it only records warnings.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::configuration::ConfigurationConverter;
use crate::corpus::TestCorpus;
use crate::expectation::{ExpectationLine, LineOrigin, Modifier, Outcome, MISSING_BUG_WARNING};

/// Legacy numeric bug ids are banned; anything else bug-prefixed is accepted.
static LEGACY_NUMERIC_BUG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^bug\d+").expect("bug shape pattern is valid"));

const LEGACY_NUMERIC_BUG_WARNING: &str = "BUG\\d+ is not allowed, must be one of BUGCR\\d+, \
                                          BUGWK\\d+, BUGV8_\\d+, or a non-numeric bug identifier.";

const SLOW_AND_TIMEOUT_WARNING: &str = "A test can not be both SLOW and TIMEOUT. If it times out \
                                        indefinitely, then it should be just TIMEOUT.";

const REBASELINE_NOT_ALLOWED_WARNING: &str =
    "REBASELINE should only be used for running rebaseline.py. Cannot be checked in.";

/// Host policy knobs for validation.
#[derive(Debug, Clone, Copy)]
pub struct ValidationPolicy {
    /// When set, a line with no bug id, no WontFix and no bug-shaped token
    /// gets the tolerated missing-bug warning.
    pub warn_if_missing_bug: bool,
    /// When cleared (lint mode), a Rebaseline modifier left in a file is an
    /// error; it only makes sense while a rebaselining tool is running.
    pub allow_rebaseline_modifier: bool,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self { warn_if_missing_bug: false, allow_rebaseline_modifier: true }
    }
}

/// Resolves tokenized lines against a corpus and a configuration domain.
pub struct SemanticValidator<'a> {
    corpus: &'a dyn TestCorpus,
    converter: &'a ConfigurationConverter,
    policy: ValidationPolicy,
}

impl<'a> SemanticValidator<'a> {
    pub fn new(
        corpus: &'a dyn TestCorpus,
        converter: &'a ConfigurationConverter,
        policy: ValidationPolicy,
    ) -> Self {
        Self { corpus, converter, policy }
    }

    /// Populates the line's derived fields. Blank and comment lines pass
    /// through untouched.
    pub fn validate(&self, line: &mut ExpectationLine) {
        let Some(name) = line.name.clone() else {
            return;
        };

        if !self.check_test_exists(line, &name) {
            return;
        }

        line.is_file = !self.corpus.is_directory(&name);
        line.path = Some(if line.is_file {
            name.clone()
        } else {
            normalize_directory_name(&name)
        });

        self.collect_matching_tests(line);

        // Tool-built lines arrive with their parsed fields already populated;
        // only the corpus-derived fields above are filled in for them.
        if line.origin == LineOrigin::Constructed && !line.parsed_expectations.is_empty() {
            return;
        }

        self.parse_modifiers(line);
        self.parse_expectations(line);
        self.synthesize_defaults(line);
    }

    /// The suite soft-disables tests by renaming them with a `-disabled`
    /// suffix, so a name counts as existing if either form does.
    fn check_test_exists(&self, line: &mut ExpectationLine, name: &str) -> bool {
        if self.corpus.test_exists(name)
            || self.corpus.test_exists(&format!("{name}-disabled"))
        {
            return true;
        }
        line.warnings.push("Path does not exist.".to_string());
        false
    }

    fn collect_matching_tests(&self, line: &mut ExpectationLine) {
        let path = line.path.as_deref().unwrap_or_default();
        if line.is_file {
            // The corpus may be reduced (a partial run list), in which case a
            // nominally existing test still matches nothing.
            let known = self.corpus.all_known_tests();
            if known.binary_search_by(|t| t.as_str().cmp(path)).is_ok() {
                line.matching_tests.push(path.to_string());
            }
            return;
        }
        line.matching_tests.extend(
            self.corpus
                .all_known_tests()
                .iter()
                .filter(|test| test.starts_with(path))
                .cloned(),
        );
    }

    /// Classifies every raw token, in precedence order: known modifier, then
    /// bug-shaped token, then configuration specifier.
    fn parse_modifiers(&self, line: &mut ExpectationLine) {
        let mut has_wontfix = false;
        let mut has_bug_shaped_token = false;
        let mut specifiers: Vec<String> = Vec::new();

        let lowered: Vec<String> = line
            .bug_modifiers
            .iter()
            .chain(line.raw_modifiers.iter())
            .map(|m| m.to_lowercase())
            .collect();

        if lowered.iter().any(|m| m == "slow")
            && line.raw_expectations.iter().any(|e| e.eq_ignore_ascii_case("timeout"))
        {
            line.warnings.push(SLOW_AND_TIMEOUT_WARNING.to_string());
        }

        for token in &lowered {
            if let Some(modifier) = Modifier::from_lower(token) {
                line.parsed_modifiers.push(modifier);
                if modifier == Modifier::WontFix {
                    has_wontfix = true;
                }
            } else if token.starts_with("bug") {
                has_bug_shaped_token = true;
                if LEGACY_NUMERIC_BUG.is_match(token) {
                    line.warnings.push(LEGACY_NUMERIC_BUG_WARNING.to_string());
                } else {
                    line.parsed_bug_modifiers.push(token.clone());
                }
            } else {
                specifiers.push(token.clone());
            }
        }

        if line.parsed_modifiers.contains(&Modifier::Rebaseline)
            && !self.policy.allow_rebaseline_modifier
        {
            line.warnings.push(REBASELINE_NOT_ALLOWED_WARNING.to_string());
        }

        if line.parsed_bug_modifiers.is_empty()
            && !has_wontfix
            && !has_bug_shaped_token
            && self.policy.warn_if_missing_bug
        {
            line.warnings.push(MISSING_BUG_WARNING.to_string());
        }

        line.matching_configurations = self.converter.to_config_set(&specifiers);
    }

    fn parse_expectations(&self, line: &mut ExpectationLine) {
        for token in &line.raw_expectations {
            // Unrecognized keywords already warned at tokenization; the
            // canonical tokens here always map.
            if let Some(outcome) = Outcome::from_canonical_token(token) {
                line.parsed_expectations.insert(outcome);
            }
        }
    }

    /// The historical defaults: WontFix alone implies Skip; a line with no
    /// explicit outcome is expected to pass, and unless some override
    /// modifier says otherwise it is not run at all.
    fn synthesize_defaults(&self, line: &mut ExpectationLine) {
        let has_skip = line.has_modifier(Modifier::Skip);
        if line.has_modifier(Modifier::WontFix) && !has_skip && line.raw_expectations.is_empty() {
            line.parsed_modifiers.push(Modifier::Skip);
        }

        if line.parsed_expectations.is_empty() {
            line.parsed_expectations.insert(Outcome::Pass);
            if !line.has_modifier(Modifier::Skip)
                && !line.has_modifier(Modifier::Rebaseline)
                && !line.has_modifier(Modifier::Slow)
            {
                line.parsed_modifiers.push(Modifier::Skip);
            }
        }
    }
}

fn normalize_directory_name(name: &str) -> String {
    format!("{}/", name.trim_end_matches('/'))
}
