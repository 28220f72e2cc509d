//! A parser, semantic model, and conflict-resolution engine for layout test
//! expectation files.
//!
//! Raw expectations text flows one direction through the crate: the
//! [`parser`] tokenizes each line, the [`validator`] resolves lines against a
//! test corpus and the configuration domain, the [`model`] folds validated
//! lines into a queryable store with well-defined override precedence, and
//! [`serialize`] reconstructs file text from the structured form for
//! rebaselining and pruning tools. The engine is pure and deterministic:
//! text in, structured decisions out.

pub use crate::errors::{LintWarning, ParseError};
pub use crate::expectations::{ExpectationsOptions, TestExpectations};

pub mod cli;
pub mod configuration;
pub mod corpus;
pub mod errors;
pub mod expectation;
pub mod expectations;
pub mod model;
pub mod parser;
pub mod serialize;
pub mod validator;

/// The types most callers need, in one import.
pub mod prelude {
    pub use crate::configuration::{
        Axis, ConfigurationConverter, ConfigurationDomain, SpecifierSorter, TestConfiguration,
    };
    pub use crate::corpus::{CorpusError, TestCorpus, TestIndex};
    pub use crate::errors::{LintWarning, ParseError};
    pub use crate::expectation::{
        ExpectationLine, ExpectationSyntax, LineOrigin, Modifier, Outcome,
    };
    pub use crate::expectations::{ExpectationsFiles, ExpectationsOptions, TestExpectations};
    pub use crate::model::{ExpectationsModel, ResultType, Timeline};
    pub use crate::parser::ExpectationParser;
    pub use crate::validator::{SemanticValidator, ValidationPolicy};
}
