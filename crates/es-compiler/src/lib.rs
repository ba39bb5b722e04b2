//! `es-compiler` turns test scripts into programs for an embedded JavaScript
//! engine, rewriting modern syntax with a bundled transform library when the
//! engine cannot parse it.
//!
//! The host engine and the transform library are supplied through the
//! [`HostEngine`] and [`TransformLibrary`] traits.
//!
//! ## Examples
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use es_compiler::{CompatibilityMode, Compiler, CompilerPool, Options, SharedBytecode};
//!
//! let engine = Arc::new(MyHostEngine::default());
//! let bytecode = Arc::new(SharedBytecode::new(BundledBabel::default()));
//! let options = Options::default().with_compatibility_mode(CompatibilityMode::Extended);
//!
//! // One compiler
//! let compiler = Compiler::new(Arc::clone(&engine), Arc::clone(&bytecode), options.clone());
//! let compiled = compiler.compile("class A {}", "script.js", true)?;
//!
//! // Many compilers for parallel work, all sharing the compiled library
//! let pool = CompilerPool::new(4, engine, bytecode, options)?;
//! let compiler = pool.acquire();
//! let module = compiler.compile("exports.a = 2 ** 8;", "lib.js", false)?;
//! pool.release(compiler);
//! ```
mod bytecode;
mod compiler;
mod engine;
mod error;
mod mode;
mod pool;
mod source_map;
mod transformer;

pub use bytecode::SharedBytecode;
pub use compiler::{Compiled, Compiler, MODULE_WRAPPER_PREFIX, MODULE_WRAPPER_SUFFIX, Options};
pub use engine::{
    HostEngine, RawTransformOutput, SourceMapLoader, SourceMaps, TransformLibrary, TransformOptions, TransformRuntime,
};
pub use error::{EngineError, Error, SourceMapError, SyntaxError};
pub use mode::{CompatibilityMode, InvalidCompatibilityMode};
pub use pool::CompilerPool;
pub use source_map::{SOURCE_MAP_SENTINEL, increase_mappings_by_one};
pub use transformer::{DEFAULT_OPTIONS, TransformOutput, Transformer};

pub type CompileResult<P> = Result<Compiled<P>, Error>;
