//! The expectations command-line tool: thin orchestration over the engine.
//!
//! Exit codes: 0 on success, 1 when lint finds problems, 2 on operational
//! errors (unreadable files, bad arguments).

pub mod args;
pub mod output;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use clap::Parser;
use thiserror::Error;

use crate::configuration::{ConfigurationDomain, TestConfiguration};
use crate::corpus::{CorpusError, TestCorpus, TestIndex};
use crate::expectation::ExpectationSyntax;
use crate::expectations::{ExpectationsFiles, ExpectationsOptions, TestExpectations};
use crate::parser::ExpectationParser;
use crate::validator::ValidationPolicy;

use self::args::{Command, ExpectationsArgs};

#[derive(Debug, Error)]
enum CliError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse port description {path}: {source}")]
    Port {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Corpus(#[from] CorpusError),
    #[error("{0}")]
    BadArgument(String),
}

/// Parses arguments from the environment and runs the tool.
pub fn run() -> i32 {
    let args = ExpectationsArgs::parse();
    match execute(args) {
        Ok(code) => code,
        Err(error) => {
            output::print_error(&error.to_string());
            2
        }
    }
}

fn execute(args: ExpectationsArgs) -> Result<i32, CliError> {
    let domain = load_domain(args.port.as_deref())?;
    let syntax = ExpectationSyntax::default();
    let skipped_tests = load_skipped(args.skipped.as_deref())?;

    match args.command {
        Command::Lint { files, require_bugs } => {
            let files = read_files(&files)?;
            let corpus = load_corpus(&args.tests, &args.layout_dir, &syntax, &files)?;
            let options = ExpectationsOptions {
                lint_mode: true,
                policy: ValidationPolicy {
                    warn_if_missing_bug: require_bugs,
                    ..Default::default()
                },
                skipped_tests,
                ..Default::default()
            };
            match TestExpectations::from_files(&domain, syntax, &corpus, &files, options) {
                Ok(expectations) => {
                    output::print_warnings(expectations.warnings());
                    output::print_ok(&format!(
                        "ok: {} entr{} resolved",
                        expectations.model().tests().count(),
                        if expectations.model().tests().count() == 1 { "y" } else { "ies" }
                    ));
                    Ok(0)
                }
                Err(error) => {
                    output::print_lint_failure(&error);
                    Ok(1)
                }
            }
        }
        Command::Query { test, files, config } => {
            let files = read_files(&files)?;
            let corpus = load_corpus(&args.tests, &args.layout_dir, &syntax, &files)?;
            let current_configuration = config
                .map(|raw| raw.parse::<TestConfiguration>().map_err(CliError::BadArgument))
                .transpose()?;
            let options = ExpectationsOptions {
                current_configuration,
                skipped_tests,
                ..Default::default()
            };
            let expectations = TestExpectations::from_files(&domain, syntax, &corpus, &files, options)
                .expect("non-lint construction does not fail");
            output::print_warnings(expectations.warnings());

            if !expectations.model().has_test(&test) {
                output::print_query_result(&test, "Pass (no entry)", &[], None);
                return Ok(0);
            }
            let modifiers: Vec<String> = expectations
                .model()
                .get_modifiers(&test)
                .iter()
                .map(|m| m.display_keyword().to_string())
                .collect();
            let provenance =
                expectations.model().get_expectation_line(&test).map(|line| line.location());
            output::print_query_result(
                &test,
                &expectations.readable_expectations_for_test(&test),
                &modifiers,
                provenance.as_deref(),
            );
            Ok(0)
        }
        Command::Format { file } => {
            let files = read_files(std::slice::from_ref(&file))?;
            let corpus = load_corpus(&args.tests, &args.layout_dir, &syntax, &files)?;
            let options = ExpectationsOptions { skipped_tests, ..Default::default() };
            let expectations = TestExpectations::from_files(&domain, syntax, &corpus, &files, options)
                .expect("non-lint construction does not fail");
            output::print_warnings(expectations.warnings());
            println!("{}", expectations.serialize_all());
            Ok(0)
        }
    }
}

fn read_files(paths: &[PathBuf]) -> Result<ExpectationsFiles, CliError> {
    paths
        .iter()
        .map(|path| {
            std::fs::read_to_string(path)
                .map(|contents| (path.display().to_string(), contents))
                .map_err(|source| CliError::Read { path: path.display().to_string(), source })
        })
        .collect()
}

fn load_domain(port: Option<&Path>) -> Result<ConfigurationDomain, CliError> {
    let Some(path) = port else {
        return Ok(ConfigurationDomain::default());
    };
    let contents = std::fs::read_to_string(path)
        .map_err(|source| CliError::Read { path: path.display().to_string(), source })?;
    serde_json::from_str(&contents)
        .map_err(|source| CliError::Port { path: path.display().to_string(), source })
}

fn load_skipped(skipped: Option<&Path>) -> Result<BTreeSet<String>, CliError> {
    let Some(path) = skipped else {
        return Ok(BTreeSet::new());
    };
    let index = TestIndex::from_list_file(path)?;
    Ok(index.all_known_tests().iter().cloned().collect())
}

/// Builds the known-test corpus. Without `--tests` or `--layout-dir` the tool
/// falls back to assuming every path referenced by the files exists, which
/// keeps pure-syntax linting usable.
fn load_corpus(
    tests: &Option<PathBuf>,
    layout_dir: &Option<PathBuf>,
    syntax: &ExpectationSyntax,
    files: &ExpectationsFiles,
) -> Result<TestIndex, CliError> {
    if let Some(path) = tests {
        return Ok(TestIndex::from_list_file(path)?);
    }
    if let Some(dir) = layout_dir {
        return Ok(TestIndex::from_layout_dir(dir)?);
    }

    let parser = ExpectationParser::new(syntax);
    let mut names = Vec::new();
    for (filename, contents) in files {
        for line in parser.tokenize_file(filename, contents) {
            if let Some(name) = line.name {
                names.push(name.trim_end_matches('/').to_string());
            }
        }
    }
    Ok(TestIndex::from_tests(names))
}
