//! Command-line arguments for the expectations tool.
//!
//! Declarative `clap` derive structures; all behavior lives in the parent
//! module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "test-expectations",
    version,
    about = "Parse, lint, and query layout test expectation files."
)]
pub struct ExpectationsArgs {
    #[command(subcommand)]
    pub command: Command,

    /// JSON port description with the configuration domain and macros.
    /// Defaults to the classic desktop domain.
    #[arg(long, global = true)]
    pub port: Option<PathBuf>,

    /// Test-list file naming every known test, one per line.
    #[arg(long, global = true)]
    pub tests: Option<PathBuf>,

    /// Layout-test directory to scan for known tests instead of a list file.
    #[arg(long, global = true, conflicts_with = "tests")]
    pub layout_dir: Option<PathBuf>,

    /// Skipped file: tests and directories to skip unconditionally.
    #[arg(long, global = true)]
    pub skipped: Option<PathBuf>,
}

/// An enumeration of all available CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Validate expectation files and report every problem.
    Lint {
        /// The expectation files, in cascade order (generic first).
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Require a bug annotation on every entry.
        #[arg(long)]
        require_bugs: bool,
    },
    /// Show the resolved expectation for one test.
    Query {
        /// The test to look up.
        test: String,

        /// The expectation files, in cascade order (generic first).
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// The configuration to resolve under, as version-architecture-buildtype
        /// (e.g. xp-x86-release). Defaults to resolving across all of them.
        #[arg(long)]
        config: Option<String>,
    },
    /// Re-emit an expectation file in canonical form.
    Format {
        /// The expectation file to reformat.
        file: PathBuf,
    },
}
