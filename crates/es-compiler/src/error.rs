use std::borrow::Cow;

use miette::{Diagnostic, SourceOffset, SourceSpan};
use thiserror::Error;

/// A parse or compile failure reported by the host engine.
///
/// `line` and `column` are 1-based, as most JavaScript parsers report them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (line {line}, column {column})")]
pub struct SyntaxError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }
}

/// Failures around source maps. These never escape a compile; the compiler
/// retries without maps instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceMapError {
    #[error("couldn't load source map `{path}`: {reason}")]
    Load { path: String, reason: String },
    #[error("invalid source map: {0}")]
    Decode(String),
    #[error(r#"missing "mappings" in sourcemap"#)]
    InvalidMappings,
    #[error("no source map is available for the transformed code")]
    Unavailable,
}

impl From<serde_json::Error> for SourceMapError {
    fn from(err: serde_json::Error) -> Self {
        SourceMapError::Decode(err.to_string())
    }
}

/// An opaque failure raised inside an embedded engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct EngineError(Cow<'static, str>);

impl EngineError {
    pub fn new(message: impl Into<Cow<'static, str>>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("{filename}: SyntaxError: {error}")]
    #[diagnostic(code(es_compiler::syntax))]
    Syntax {
        filename: String,
        error: SyntaxError,
        #[source_code]
        source_code: String,
        #[label("here")]
        location: SourceSpan,
    },
    #[error("{filename}: transform failed: {error}")]
    #[diagnostic(code(es_compiler::transform))]
    Transform {
        filename: String,
        #[source]
        error: EngineError,
    },
    #[error("couldn't initialize the transform engine: {0}")]
    #[diagnostic(
        code(es_compiler::initialization),
        help("the bundled transform library is corrupted; this is not recoverable")
    )]
    Initialization(#[source] EngineError),
}

impl Error {
    pub(crate) fn syntax(filename: &str, source_code: &str, error: SyntaxError) -> Self {
        let offset = SourceOffset::from_location(source_code, error.line, error.column);
        let len = usize::from(offset.offset() < source_code.len());

        Error::Syntax {
            filename: filename.to_string(),
            error,
            source_code: source_code.to_string(),
            location: SourceSpan::new(offset, len),
        }
    }

    pub(crate) fn transform(filename: &str, error: EngineError) -> Self {
        Error::Transform {
            filename: filename.to_string(),
            error,
        }
    }

    pub fn filename(&self) -> Option<&str> {
        match self {
            Error::Syntax { filename, .. } | Error::Transform { filename, .. } => Some(filename),
            Error::Initialization(_) => None,
        }
    }
}
