//! Test corpus providers.
//!
//! The engine only needs three questions answered about the test suite: does
//! a name exist, is it a directory, and what is the full list of known tests.
//! [`TestCorpus`] captures that contract; [`TestIndex`] is the flat sorted
//! in-memory implementation, with constructors for the common sources (an
//! iterator, a test-list file, a directory walk).
//!
//! Directory membership is decided by prefix comparison over the sorted name
//! list; no filesystem tree is consulted after construction.

use std::collections::BTreeSet;
use std::path::Path;

use thiserror::Error;
use walkdir::WalkDir;

/// Answers existence and shape questions about the known test suite.
pub trait TestCorpus {
    /// True if `name` refers to an existing test file or test directory.
    fn test_exists(&self, name: &str) -> bool;

    /// True if `name` refers to a directory of tests.
    fn is_directory(&self, name: &str) -> bool;

    /// Every known test, sorted, with `/`-separated relative paths.
    fn all_known_tests(&self) -> &[String];
}

/// Errors raised while building a corpus from external sources.
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("failed to read test list {path}: {source}")]
    ReadList {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to walk layout directory {path}: {source}")]
    Walk {
        path: String,
        #[source]
        source: walkdir::Error,
    },
}

/// File extensions that count as tests when scanning a layout directory.
const TEST_EXTENSIONS: [&str; 8] = ["html", "htm", "shtml", "xml", "xhtml", "svg", "php", "pl"];

/// A flat, sorted, deduplicated list of test names.
#[derive(Debug, Clone, Default)]
pub struct TestIndex {
    tests: Vec<String>,
}

impl TestIndex {
    /// Builds an index from any iterator of test names. Names are normalized
    /// to `/` separators, sorted, and deduplicated.
    pub fn from_tests<I, S>(tests: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = tests
            .into_iter()
            .map(|t| t.into().replace('\\', "/"))
            .filter(|t| !t.is_empty())
            .collect();
        Self { tests: set.into_iter().collect() }
    }

    /// Reads a test-list file: one test name per line, `#` starts a comment,
    /// blank lines are ignored, trailing slashes are normalized away.
    pub fn from_list_file(path: impl AsRef<Path>) -> Result<Self, CorpusError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| CorpusError::ReadList {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::from_list_contents(&contents))
    }

    /// Parses test-list file contents. Shared with the Skipped-file format,
    /// which uses the same shape.
    pub fn from_list_contents(contents: &str) -> Self {
        Self::from_tests(
            contents
                .lines()
                .map(|line| line.trim())
                .map(|line| line.trim_end_matches('/'))
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_string),
        )
    }

    /// Walks a layout-test directory and indexes every file with a test
    /// extension, as a path relative to the root.
    pub fn from_layout_dir(root: impl AsRef<Path>) -> Result<Self, CorpusError> {
        let root = root.as_ref();
        let mut tests = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|source| CorpusError::Walk {
                path: root.display().to_string(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let is_test = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| TEST_EXTENSIONS.contains(&e));
            if !is_test {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(root) {
                tests.push(relative.to_string_lossy().replace('\\', "/"));
            }
        }
        Ok(Self::from_tests(tests))
    }

    /// All tests whose path starts with `prefix`, in sorted order.
    pub fn tests_under<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        let start = self.tests.partition_point(|t| t.as_str() < prefix);
        self.tests[start..]
            .iter()
            .take_while(move |t| t.starts_with(prefix))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}

impl TestCorpus for TestIndex {
    fn test_exists(&self, name: &str) -> bool {
        self.tests.binary_search_by(|t| t.as_str().cmp(name)).is_ok() || self.is_directory(name)
    }

    fn is_directory(&self, name: &str) -> bool {
        let prefix = format!("{}/", name.trim_end_matches('/'));
        let exists = self.tests_under(&prefix).next().is_some();
        exists
    }

    fn all_known_tests(&self) -> &[String] {
        &self.tests
    }
}
