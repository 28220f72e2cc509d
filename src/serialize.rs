//! Reconstruction of expectations text from the structured model.
//!
//! Invalid or unparseable lines always come back as their original text,
//! byte for byte; nothing malformed is ever silently rewritten. Valid
//! tokenized lines are re-emitted in canonical form from their raw tokens.
//! Tool-constructed lines, which never went through the tokenizer, are
//! expanded into one line per covering specifier combination so that
//! re-parsing the output reproduces the same matching configuration set.

use std::collections::BTreeSet;

use crate::configuration::ConfigurationConverter;
use crate::expectation::{ExpectationLine, ExpectationSyntax, LineOrigin, Modifier, Outcome};

/// Serializes one line.
///
/// Returns `None` only for a constructed line whose matching configuration
/// set has become empty: such a line has nothing left to say and is dropped
/// from the regenerated file (this is how pruning tools delete entries).
pub fn line_to_string(
    line: &ExpectationLine,
    converter: &ConfigurationConverter,
    syntax: &ExpectationSyntax,
) -> Option<String> {
    if line.is_invalid() {
        return Some(match &line.original_string {
            Some(original) => original.clone(),
            None => comment_only(line),
        });
    }

    if line.name.is_none() {
        return Some(comment_only(line));
    }

    match line.origin {
        LineOrigin::Tokenized => Some(tokenized_to_string(line, converter, syntax)),
        LineOrigin::Constructed => constructed_to_string(line, converter, syntax),
    }
}

/// Serializes a list of lines, joined by newlines.
///
/// With `reconstitute_only` given, only the listed indices are re-emitted
/// canonically; every other line keeps its original text. That keeps
/// automated edits minimal: untouched lines do not churn.
pub fn list_to_string(
    lines: &[ExpectationLine],
    converter: &ConfigurationConverter,
    syntax: &ExpectationSyntax,
    reconstitute_only: Option<&BTreeSet<usize>>,
) -> String {
    let rendered: Vec<String> = lines
        .iter()
        .enumerate()
        .filter_map(|(index, line)| match reconstitute_only {
            Some(indices) if !indices.contains(&index) => {
                Some(line.original_string.clone().unwrap_or_default())
            }
            _ => line_to_string(line, converter, syntax),
        })
        .collect();
    rendered.join("\n")
}

fn comment_only(line: &ExpectationLine) -> String {
    match &line.comment {
        Some(comment) => format!("#{comment}"),
        None => String::new(),
    }
}

// ============================================================================
// TOKENIZED LINES: canonical re-emission from raw tokens
// ============================================================================

fn tokenized_to_string(
    line: &ExpectationLine,
    converter: &ConfigurationConverter,
    syntax: &ExpectationSyntax,
) -> String {
    let mut bugs: Vec<String> = line.bug_modifiers.clone();
    bugs.sort();

    // The raw modifier list mixes configuration specifiers with modifier
    // keywords; they serialize into different brackets.
    let mut specifiers: Vec<String> = Vec::new();
    let mut modifier_keywords: Vec<Modifier> = Vec::new();
    for token in &line.raw_modifiers {
        match Modifier::from_lower(&token.to_lowercase()) {
            Some(modifier) => modifier_keywords.push(modifier),
            None => specifiers.push(syntax.pretty_configuration_token(token)),
        }
    }
    converter.sorter().sort_specifiers(&mut specifiers);

    let outcomes: BTreeSet<Outcome> = line
        .raw_expectations
        .iter()
        .filter_map(|token| Outcome::from_canonical_token(token))
        .collect();

    format_line(&bugs, &specifiers, line.name.as_deref().unwrap_or_default(),
        &outcomes, &modifier_keywords, line.comment.as_deref())
}

// ============================================================================
// CONSTRUCTED LINES: expansion from parsed fields
// ============================================================================

fn constructed_to_string(
    line: &ExpectationLine,
    converter: &ConfigurationConverter,
    syntax: &ExpectationSyntax,
) -> Option<String> {
    let combinations = converter.to_specifiers_list(&line.matching_configurations);
    if combinations.is_empty() {
        return None;
    }

    let mut bugs: Vec<String> = line
        .parsed_bug_modifiers
        .iter()
        .map(|bug| bug.to_uppercase())
        .chain(line.bug_modifiers.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    bugs.sort();

    let (outcomes, modifier_keywords) = elide_synthesized(line);
    let name = line.name.as_deref().unwrap_or_default();

    let rendered: Vec<String> = combinations
        .iter()
        .map(|combination| {
            let mut specifiers: Vec<String> = combination
                .iter()
                .map(|token| syntax.pretty_configuration_token(token))
                .collect();
            converter.sorter().sort_specifiers(&mut specifiers);
            format_line(&bugs, &specifiers, name, &outcomes, &modifier_keywords,
                line.comment.as_deref())
        })
        .collect();
    Some(rendered.join("\n"))
}

/// Drops the synthesized default tokens so the canonical text re-synthesizes
/// them on parse instead of tripping the Skip-with-expectations check:
/// a lone expected Pass is implicit, and an implied Skip (from WontFix, or
/// from the no-outcome default) is implicit too.
fn elide_synthesized(line: &ExpectationLine) -> (BTreeSet<Outcome>, Vec<Modifier>) {
    let mut outcomes = line.parsed_expectations.clone();
    let mut modifiers: Vec<Modifier> = line
        .parsed_modifiers
        .iter()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .filter(|&m| m != Modifier::None)
        .collect();

    let lone_pass = outcomes.len() == 1 && outcomes.contains(&Outcome::Pass);
    if lone_pass {
        outcomes.clear();
        let skip_reimplied = modifiers.contains(&Modifier::WontFix)
            || !(modifiers.contains(&Modifier::Rebaseline) || modifiers.contains(&Modifier::Slow));
        if skip_reimplied {
            modifiers.retain(|&m| m != Modifier::Skip);
        }
    }
    (outcomes, modifiers)
}

// ============================================================================
// SHARED FORMATTING
// ============================================================================

/// Assembles one canonical line:
/// `bugs [ specifiers ] name [ outcomes modifiers ] #comment`,
/// with empty brackets omitted. Outcomes appear in the fixed priority order,
/// modifier keywords after them in alphabetical order.
fn format_line(
    bugs: &[String],
    specifiers: &[String],
    name: &str,
    outcomes: &BTreeSet<Outcome>,
    modifier_keywords: &[Modifier],
    comment: Option<&str>,
) -> String {
    let mut result = String::new();
    if !bugs.is_empty() {
        result.push_str(&bugs.join(" "));
        result.push(' ');
    }
    if !specifiers.is_empty() {
        result.push_str(&format!("[ {} ] ", specifiers.join(" ")));
    }
    result.push_str(name);

    let mut bracket: Vec<&'static str> =
        outcomes.iter().map(|outcome| outcome.display_keyword()).collect();
    let mut keywords: Vec<&'static str> =
        modifier_keywords.iter().map(|modifier| modifier.display_keyword()).collect();
    keywords.sort_unstable();
    keywords.dedup();
    bracket.extend(keywords);
    if !bracket.is_empty() {
        result.push_str(&format!(" [ {} ]", bracket.join(" ")));
    }

    if let Some(comment) = comment {
        result.push_str(&format!(" #{comment}"));
    }
    result
}
