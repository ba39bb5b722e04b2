//! Capabilities the compiler is built on.
//!
//! The compiler never parses or rewrites JavaScript itself. It drives a host
//! engine (parse + compile to an executable program) and a transform library
//! (e.g. a bundled Babel running inside an embedded interpreter) through the
//! traits below, so any concrete binding can be plugged in.

use serde_json::{Map, Value};

use crate::error::{EngineError, SourceMapError, SyntaxError};

/// How the host parser should treat `//# sourceMappingURL=` comments.
pub enum SourceMaps<'a> {
    Disabled,
    /// Ask the callback for the bytes of every referenced map.
    Load(&'a mut dyn FnMut(&str) -> Result<Vec<u8>, SourceMapError>),
}

impl std::fmt::Debug for SourceMaps<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceMaps::Disabled => f.write_str("Disabled"),
            SourceMaps::Load(_) => f.write_str("Load(..)"),
        }
    }
}

/// The engine that ultimately runs the compiled script.
pub trait HostEngine: Send + Sync {
    type Ast;
    type Program;

    /// Parses `source`. When the parser needs a source map and the loader
    /// callback fails, the parse is expected to fail as well.
    fn parse(&self, filename: &str, source: &str, source_maps: SourceMaps<'_>) -> Result<Self::Ast, SyntaxError>;

    fn compile(&self, ast: Self::Ast, strict: bool) -> Result<Self::Program, SyntaxError>;
}

/// The bundled transform library.
///
/// Compiling the library source is the expensive step, so it is done once
/// (see [`crate::SharedBytecode`]) and every runtime is instantiated from the
/// same compiled form.
pub trait TransformLibrary: Send + Sync {
    type Bytecode: Send + Sync;
    type Runtime: TransformRuntime + Send;

    fn compile(&self) -> Result<Self::Bytecode, EngineError>;

    fn instantiate(&self, bytecode: &Self::Bytecode) -> Result<Self::Runtime, EngineError>;
}

/// One embedded interpreter with the transform library loaded. Not reentrant.
pub trait TransformRuntime {
    fn transform(&mut self, source: &str, options: &TransformOptions) -> Result<RawTransformOutput, EngineError>;
}

/// What the library's transform entry point hands back.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTransformOutput {
    pub code: String,
    pub map: Option<Value>,
}

/// Options object passed to the library's transform entry point.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransformOptions(Map<String, Value>);

impl TransformOptions {
    pub fn new(options: Map<String, Value>) -> Self {
        Self(options)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<TransformOptions> for Value {
    fn from(options: TransformOptions) -> Self {
        Value::Object(options.0)
    }
}

/// Resolves source maps referenced by user scripts.
pub trait SourceMapLoader: Send + Sync {
    fn load(&self, path: &str) -> Result<Vec<u8>, SourceMapError>;
}

impl<F> SourceMapLoader for F
where
    F: Fn(&str) -> std::io::Result<Vec<u8>> + Send + Sync,
{
    fn load(&self, path: &str) -> Result<Vec<u8>, SourceMapError> {
        self(path).map_err(|e| SourceMapError::Load {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }
}
