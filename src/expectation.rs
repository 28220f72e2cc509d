//! Core vocabulary of the expectations engine.
//!
//! Defines the closed [`Outcome`] and [`Modifier`] enums together with their
//! bidirectional keyword tables, the [`ExpectationSyntax`] token tables that
//! tie the textual format to the canonical token space, and the
//! [`ExpectationLine`] record produced by the tokenizer and enriched by the
//! semantic validator.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::configuration::TestConfiguration;

/// The one warning that does not invalidate a line. Hosts that require bug
/// annotations get this appended, and the line still contributes to the model.
pub const MISSING_BUG_WARNING: &str = "Test lacks BUG modifier.";

/// Semantic warning for `Skip` combined with explicit outcomes. The line is
/// still registered (in the skip bucket), but lint mode treats it as an error.
pub const SKIP_WITH_EXPECTATIONS_WARNING: &str =
    "A test marked Skip must not have other expectations.";

/// Placeholder bug id attached to entries synthesized from a Skipped file.
pub const DUMMY_BUG_MODIFIER: &str = "BUG_DUMMY";

/// Pseudo-filename attributed to entries synthesized from a Skipped file.
pub const SKIPPED_FILE_NAME: &str = "<Skipped file>";

// ============================================================================
// OUTCOMES
// ============================================================================

/// A test result kind, either expected (written in an expectations file) or
/// actual (reported by the runner).
///
/// The declaration order is the canonical serialization order: when a set of
/// outcomes is written back to text, members appear in this sequence.
/// `Text`, `ImagePlusText` and `Audio` are finer-grained failure kinds the
/// runner produces; they cannot be written in an expectations file and render
/// as `Failure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Pass,
    Crash,
    Timeout,
    Missing,
    Text,
    ImagePlusText,
    Audio,
    Fail,
    Image,
    Skip,
}

impl Outcome {
    /// Maps a keyword as written in an expectations block to its canonical
    /// token. Only the six writable outcome keywords are accepted.
    pub fn canonical_token_for_keyword(keyword: &str) -> Option<&'static str> {
        match keyword {
            "Crash" => Some("CRASH"),
            "Failure" => Some("FAIL"),
            "ImageOnlyFailure" => Some("IMAGE"),
            "Missing" => Some("MISSING"),
            "Pass" => Some("PASS"),
            "Timeout" => Some("TIMEOUT"),
            _ => None,
        }
    }

    /// Maps a canonical token (case-insensitive) to an outcome. This covers
    /// the full outcome domain, including the runner-only failure kinds.
    pub fn from_canonical_token(token: &str) -> Option<Outcome> {
        match token.to_ascii_lowercase().as_str() {
            "pass" => Some(Outcome::Pass),
            "fail" => Some(Outcome::Fail),
            "text" => Some(Outcome::Text),
            "image" => Some(Outcome::Image),
            "image+text" => Some(Outcome::ImagePlusText),
            "audio" => Some(Outcome::Audio),
            "timeout" => Some(Outcome::Timeout),
            "crash" => Some(Outcome::Crash),
            "missing" => Some(Outcome::Missing),
            "skip" => Some(Outcome::Skip),
            _ => None,
        }
    }

    /// The keyword used when serializing this outcome back to text.
    pub fn display_keyword(self) -> &'static str {
        match self {
            Outcome::Pass => "Pass",
            Outcome::Crash => "Crash",
            Outcome::Timeout => "Timeout",
            Outcome::Missing => "Missing",
            Outcome::Text | Outcome::ImagePlusText | Outcome::Audio | Outcome::Fail => "Failure",
            Outcome::Image => "ImageOnlyFailure",
            Outcome::Skip => "Skip",
        }
    }

    /// Human-readable description, used when reporting what a test was
    /// expected to do.
    pub fn description(self) -> &'static str {
        match self {
            Outcome::Pass => "passes",
            Outcome::Crash => "crashes",
            Outcome::Timeout => "times out",
            Outcome::Missing => "is missing results",
            Outcome::Text => "fails text diff",
            Outcome::ImagePlusText => "fails image and text",
            Outcome::Audio => "fails audio diff",
            Outcome::Fail => "fails",
            Outcome::Image => "fails image diff",
            Outcome::Skip => "is skipped",
        }
    }

    /// True for the finer-grained failure kinds that `Fail` subsumes.
    pub fn is_failure_kind(self) -> bool {
        matches!(self, Outcome::Text | Outcome::ImagePlusText | Outcome::Audio)
    }
}

// ============================================================================
// MODIFIERS
// ============================================================================

/// A configuration-neutral line annotation: not an outcome, not a bug id, not
/// a platform specifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Modifier {
    Skip,
    Slow,
    WontFix,
    Rebaseline,
    None,
}

impl Modifier {
    /// All modifier values, in declaration order.
    pub const ALL: [Modifier; 5] = [
        Modifier::Skip,
        Modifier::Slow,
        Modifier::WontFix,
        Modifier::Rebaseline,
        Modifier::None,
    ];

    /// Maps a lowercase token to a modifier.
    pub fn from_lower(token: &str) -> Option<Modifier> {
        match token {
            "skip" => Some(Modifier::Skip),
            "slow" => Some(Modifier::Slow),
            "wontfix" => Some(Modifier::WontFix),
            "rebaseline" => Some(Modifier::Rebaseline),
            "none" => Some(Modifier::None),
            _ => None,
        }
    }

    /// Whether a token is one of the modifier keywords recognized inside an
    /// expectations block, exactly as written there.
    pub fn is_expectation_block_keyword(token: &str) -> bool {
        matches!(token, "Rebaseline" | "Skip" | "Slow" | "WontFix")
    }

    /// The keyword used when serializing this modifier back to text.
    pub fn display_keyword(self) -> &'static str {
        match self {
            Modifier::Skip => "Skip",
            Modifier::Slow => "Slow",
            Modifier::WontFix => "WontFix",
            Modifier::Rebaseline => "Rebaseline",
            Modifier::None => "None",
        }
    }
}

// ============================================================================
// SYNTAX TABLES
// ============================================================================

/// Token tables for the textual expectations format.
///
/// The legacy-to-canonical configuration table is an explicit value rather
/// than a module global so that independent ports with different token sets
/// can coexist in one process.
#[derive(Debug, Clone)]
pub struct ExpectationSyntax {
    configuration_tokens: Vec<(String, String)>,
}

impl ExpectationSyntax {
    /// Builds a syntax from a list of legacy configuration tokens. Each token
    /// canonicalizes to its uppercase form.
    pub fn with_configuration_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let configuration_tokens = tokens
            .into_iter()
            .map(|t| {
                let t = t.into();
                let canonical = t.to_uppercase();
                (t, canonical)
            })
            .collect();
        Self { configuration_tokens }
    }

    /// Canonicalizes a configuration-block token. Known tokens map through the
    /// table (case-sensitively); unknown tokens pass through unchanged.
    pub fn canonical_configuration_token(&self, token: &str) -> String {
        self.configuration_tokens
            .iter()
            .find(|(legacy, _)| legacy == token)
            .map(|(_, canonical)| canonical.clone())
            .unwrap_or_else(|| token.to_string())
    }

    /// Inverse of [`canonical_configuration_token`]: recovers the
    /// human-readable form of a canonical or lowercase token for output.
    ///
    /// [`canonical_configuration_token`]: ExpectationSyntax::canonical_configuration_token
    pub fn pretty_configuration_token(&self, token: &str) -> String {
        let upper = token.to_uppercase();
        self.configuration_tokens
            .iter()
            .find(|(_, canonical)| *canonical == upper)
            .map(|(legacy, _)| legacy.clone())
            .unwrap_or_else(|| token.to_string())
    }
}

impl Default for ExpectationSyntax {
    fn default() -> Self {
        Self::with_configuration_tokens([
            "Mac",
            "SnowLeopard",
            "Lion",
            "MountainLion",
            "Win",
            "XP",
            "Vista",
            "Win7",
            "Linux",
            "Lucid",
            "Release",
            "Debug",
        ])
    }
}

// ============================================================================
// EXPECTATION LINE
// ============================================================================

/// How a line came into being. Tokenized lines serialize canonically from
/// their raw token fields; constructed lines (built by tools, never seen by
/// the tokenizer) serialize by expanding their matching configuration set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOrigin {
    Tokenized,
    Constructed,
}

/// One line of an expectations file, blank and comment lines included.
///
/// The raw fields hold the line as written (after token canonicalization);
/// the parsed fields are empty until the semantic validator runs. A line with
/// disqualifying warnings never contributes to the model, but its
/// `original_string` is always preserved for round-trip serialization.
#[derive(Debug, Clone)]
pub struct ExpectationLine {
    pub original_string: Option<String>,
    pub filename: String,
    pub line_number: u32,
    pub origin: LineOrigin,

    pub bug_modifiers: Vec<String>,
    pub raw_modifiers: Vec<String>,
    pub name: Option<String>,
    pub raw_expectations: Vec<String>,
    pub comment: Option<String>,
    pub warnings: Vec<String>,

    pub parsed_modifiers: Vec<Modifier>,
    pub parsed_bug_modifiers: Vec<String>,
    pub matching_configurations: BTreeSet<TestConfiguration>,
    pub parsed_expectations: BTreeSet<Outcome>,
    pub matching_tests: Vec<String>,
    pub is_file: bool,
    pub path: Option<String>,
}

impl ExpectationLine {
    /// Creates an empty tokenized line with provenance only.
    pub fn new(filename: impl Into<String>, line_number: u32) -> Self {
        Self {
            original_string: None,
            filename: filename.into(),
            line_number,
            origin: LineOrigin::Tokenized,
            bug_modifiers: Vec::new(),
            raw_modifiers: Vec::new(),
            name: None,
            raw_expectations: Vec::new(),
            comment: None,
            warnings: Vec::new(),
            parsed_modifiers: Vec::new(),
            parsed_bug_modifiers: Vec::new(),
            matching_configurations: BTreeSet::new(),
            parsed_expectations: BTreeSet::new(),
            matching_tests: Vec::new(),
            is_file: false,
            path: None,
        }
    }

    /// Builds the synthetic entry for a test named in a Skipped file: skipped,
    /// never to be fixed, nominally passing, with a placeholder bug id.
    pub fn for_skipped_test(test_name: impl Into<String>) -> Self {
        let test_name = test_name.into();
        let mut line = Self::new(SKIPPED_FILE_NAME, 0);
        line.origin = LineOrigin::Constructed;
        line.original_string = Some(test_name.clone());
        line.bug_modifiers = vec![DUMMY_BUG_MODIFIER.to_string()];
        line.raw_modifiers = vec!["SKIP".to_string(), "WONTFIX".to_string()];
        line.raw_expectations = vec!["PASS".to_string()];
        line.name = Some(test_name);
        line
    }

    /// Builds a tool-constructed line for `test_name` with the given parsed
    /// content. Serialization expands it into one textual line per covering
    /// specifier combination.
    pub fn constructed(
        test_name: impl Into<String>,
        bug_modifiers: Vec<String>,
        modifiers: Vec<Modifier>,
        expectations: BTreeSet<Outcome>,
        matching_configurations: BTreeSet<TestConfiguration>,
    ) -> Self {
        let test_name = test_name.into();
        let mut line = Self::new(String::new(), 0);
        line.origin = LineOrigin::Constructed;
        line.name = Some(test_name);
        line.parsed_bug_modifiers = bug_modifiers;
        line.parsed_modifiers = modifiers;
        line.parsed_expectations = expectations;
        line.matching_configurations = matching_configurations;
        line
    }

    /// A line is invalid if it carries any warning other than the tolerated
    /// missing-bug warning and the Skip-with-expectations semantic warning.
    /// Invalid lines contribute nothing to the model.
    pub fn is_invalid(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| w != MISSING_BUG_WARNING && w != SKIP_WITH_EXPECTATIONS_WARNING)
    }

    /// True when more than one outcome is expected.
    pub fn is_flaky(&self) -> bool {
        self.parsed_expectations.len() > 1
    }

    pub fn has_modifier(&self, modifier: Modifier) -> bool {
        self.parsed_modifiers.contains(&modifier)
    }

    /// Provenance as `file:line`, the form used in conflict warnings.
    pub fn location(&self) -> String {
        format!("{}:{}", self.filename, self.line_number)
    }
}
